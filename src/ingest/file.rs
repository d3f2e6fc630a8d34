//! Local file image loader.
//!
//! Decodes JPEG and PNG files from the local filesystem. URL-like paths are
//! refused rather than fetched.

use std::path::Path;

use super::{ImageLoader, LoadedImage};
use crate::error::AnalysisError;

#[derive(Clone, Copy, Debug, Default)]
pub struct FileImageLoader;

impl FileImageLoader {
    pub fn new() -> Self {
        Self
    }
}

impl ImageLoader for FileImageLoader {
    fn load(&self, path: &Path) -> Result<LoadedImage, AnalysisError> {
        if !is_local_file_path(path) || !path.is_file() {
            return Err(AnalysisError::ImageNotFound {
                path: path.to_path_buf(),
            });
        }
        let decoded = image::open(path).map_err(|source| AnalysisError::ImageUnreadable {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!(
            "loaded {} ({}x{})",
            path.display(),
            decoded.width(),
            decoded.height()
        );
        Ok(LoadedImage::new(path, decoded.into_rgb8()))
    }
}

fn is_local_file_path(path: &Path) -> bool {
    let raw = path.to_string_lossy();
    if raw.trim().is_empty() {
        return false;
    }
    !raw.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn missing_file_is_an_input_error() {
        let err = FileImageLoader::new()
            .load(Path::new("/definitely/not/here.jpg"))
            .unwrap_err();
        assert!(err.is_input_error());
        assert!(matches!(err, AnalysisError::ImageNotFound { .. }));
    }

    #[test]
    fn url_paths_are_refused() {
        let err = FileImageLoader::new()
            .load(Path::new("https://example.com/cat.jpg"))
            .unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn garbage_bytes_are_unreadable() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"not an image")?;

        let err = FileImageLoader::new().load(&path).unwrap_err();
        assert!(matches!(err, AnalysisError::ImageUnreadable { .. }));
        Ok(())
    }

    #[test]
    fn decodes_png_dimensions() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("frame.png");
        RgbImage::new(64, 48).save(&path)?;

        let image = FileImageLoader::new().load(&path)?;
        assert_eq!((image.width(), image.height()), (64, 48));
        assert_eq!(image.area(), 64.0 * 48.0);
        assert_eq!(image.path(), path.as_path());
        Ok(())
    }
}
