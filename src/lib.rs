//! Animal presence detection for a single image.
//!
//! The crate decides whether an image shows an animal by consulting three
//! providers in order of increasing cost:
//!
//! 1. a fast box detector, filtered to animal categories and a minimum box area,
//! 2. a precise detector, filtered to animal keywords and a confidence floor,
//! 3. an image classifier whose animal-keyword probability mass must reach a threshold.
//!
//! The first conclusive stage decides. Providers are injected, so the
//! cascade can run against ONNX models (`backend-tract` feature), canned stub
//! outputs, or test doubles.
//!
//! # Module Structure
//!
//! - `cascade`: stage ordering, filtering policy, scoring and the verdict type
//! - `detect`: provider traits, registry and backends
//! - `ingest`: image loading
//! - `config`: file and environment configuration for the CLI

pub mod cascade;
pub mod config;
pub mod detect;
pub mod error;
pub mod ingest;

pub use cascade::{
    classifier_score, AnalysisResult, AnimalCascade, AnimalClassSet, AnimalKeywords,
    CascadeConfig, DetectionFilter, KeywordMatch, Method, Stage,
};
pub use config::{AppConfig, BackendKind};
pub use detect::{
    BackendRegistry, BoundingBox, ClassifierBackend, Detection, DetectionCapability,
    DetectorBackend, LabelScore, StubClassifier, StubDetector,
};
pub use error::AnalysisError;
pub use ingest::{FileImageLoader, ImageLoader, LoadedImage};
