use std::path::PathBuf;

use reshape_common::FrameError;

#[derive(Debug, thiserror::Error)]
pub enum IoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A back-end library reported a failure.
    #[error("{backend}: {message}")]
    Backend { backend: String, message: String },

    #[error("unsupported feature '{feature}' ({context})")]
    Unsupported { feature: String, context: String },

    #[error("no handler registered for {path}")]
    NoHandler { path: PathBuf },

    #[error("sheet not found: {sheet}")]
    SheetNotFound { sheet: String },

    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl IoError {
    pub fn from_backend(backend: &str, err: impl std::fmt::Display) -> Self {
        IoError::Backend {
            backend: backend.to_string(),
            message: err.to_string(),
        }
    }

    pub fn unsupported(feature: &str, context: &str) -> Self {
        IoError::Unsupported {
            feature: feature.to_string(),
            context: context.to_string(),
        }
    }
}
