//! Image ingestion.
//!
//! The cascade never touches the filesystem itself. It asks an `ImageLoader`
//! for a decoded `LoadedImage` and hands that same value to every backend, so
//! an image is decoded once per analysis call.
//!
//! Loaders MUST report a missing or undecodable path as an input error; no
//! backend is consulted for an image that failed to load.

use std::path::{Path, PathBuf};

use image::RgbImage;

use crate::error::AnalysisError;

pub mod file;

pub use file::FileImageLoader;

/// Decoded RGB image together with the path it came from.
#[derive(Clone, Debug)]
pub struct LoadedImage {
    path: PathBuf,
    pixels: RgbImage,
}

impl LoadedImage {
    pub fn new(path: impl Into<PathBuf>, pixels: RgbImage) -> Self {
        Self {
            path: path.into(),
            pixels,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Total pixel area. Zero-sized images count as one pixel so area ratios stay finite.
    pub fn area(&self) -> f64 {
        let area = self.width() as f64 * self.height() as f64;
        if area > 0.0 {
            area
        } else {
            1.0
        }
    }

    pub fn rgb(&self) -> &RgbImage {
        &self.pixels
    }
}

/// Source of decoded images for the cascade.
pub trait ImageLoader: Send + Sync {
    fn load(&self, path: &Path) -> Result<LoadedImage, AnalysisError>;
}
