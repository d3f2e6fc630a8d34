use std::path::PathBuf;

use crate::cascade::Method;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure of a single `analyze` call.
///
/// Input errors terminate the call before any stage runs. Inference errors
/// stop the cascade at the failing stage; later stages are never consulted.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("image not found or unreadable: {}", .path.display())]
    ImageNotFound { path: PathBuf },

    #[error("image not found or unreadable: {}", .path.display())]
    ImageUnreadable {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{stage} stage failed in backend {backend}")]
    Inference {
        stage: Method,
        backend: String,
        #[source]
        source: BoxError,
    },
}

impl AnalysisError {
    pub fn inference(stage: Method, backend: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Inference {
            stage,
            backend: backend.into(),
            source: source.into(),
        }
    }

    /// True for failures caused by the input path rather than a backend.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::ImageNotFound { .. } | Self::ImageUnreadable { .. }
        )
    }

    /// Stage that failed, for inference errors.
    pub fn stage(&self) -> Option<Method> {
        match self {
            Self::Inference { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
