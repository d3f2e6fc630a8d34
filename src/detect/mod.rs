mod backend;
pub mod backends;
mod registry;
mod result;

pub use backend::{ClassifierBackend, DetectionCapability, DetectorBackend};
pub use backends::{StubClassifier, StubDetector};
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection, LabelScore};
