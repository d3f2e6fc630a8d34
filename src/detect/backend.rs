use anyhow::Result;

use crate::detect::result::{Detection, LabelScore};
use crate::ingest::LoadedImage;

/// Capabilities a backend can provide to the cascade.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    /// Cheap, high-precision box detector consulted first.
    FastDetection,
    /// Slower detector with a different vocabulary and recall profile.
    PreciseDetection,
    Classification,
}

/// Detector backend trait.
///
/// Backends are loaded once and then treated as read-only services: `detect`
/// takes `&self` and must not keep per-call state. Whether concurrent calls
/// are safe is up to the implementation; the cascade only requires
/// `Send + Sync` so it can be shared.
pub trait DetectorBackend: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection on a decoded image.
    ///
    /// Boxes are in pixel coordinates of `image`. No filtering beyond the
    /// backend's own confidence floor is expected here.
    fn detect(&self, image: &LoadedImage) -> Result<Vec<Detection>>;
}

/// Image classifier backend.
pub trait ClassifierBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Full probability distribution over the classifier's vocabulary.
    ///
    /// Entries need not be sorted; the cascade ranks them itself.
    fn classify(&self, image: &LoadedImage) -> Result<Vec<LabelScore>>;
}
