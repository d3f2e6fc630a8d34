pub mod postprocess;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{StubClassifier, StubDetector};

#[cfg(feature = "backend-tract")]
pub use tract::{OutputLayout, TractClassifier, TractClassifierConfig, TractDetector, TractDetectorConfig};
