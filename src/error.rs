//! Error taxonomy for harvest runs.
//!
//! Only [`HarvestError::Setup`], [`HarvestError::Write`] and
//! [`HarvestError::Json`] end a run. The others are recovered where they
//! occur: a malformed fragment is skipped by the extractor, a failed source
//! contributes nothing, a failed viewport call counts as an empty cycle.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, HarvestError>;

#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("setup failed: {0}")]
    Setup(String),

    #[error("malformed fragment skipped: {0}")]
    Extraction(String),

    #[error("source {source_id} failed: {message}")]
    SourceFetch { source_id: String, message: String },

    #[error("viewport {operation} failed: {message}")]
    Viewport { operation: String, message: String },

    #[error("write to {target} failed: {message}")]
    Write { target: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl HarvestError {
    pub fn setup(message: impl std::fmt::Display) -> Self {
        HarvestError::Setup(message.to_string())
    }

    pub fn source_fetch(source_id: &str, message: impl std::fmt::Display) -> Self {
        HarvestError::SourceFetch {
            source_id: source_id.to_string(),
            message: message.to_string(),
        }
    }

    pub fn viewport(operation: &str, message: impl std::fmt::Display) -> Self {
        HarvestError::Viewport {
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }

    pub fn write(target: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        HarvestError::Write {
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    /// Whether this error must end the run with a non-zero exit code.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            HarvestError::Extraction(_)
                | HarvestError::SourceFetch { .. }
                | HarvestError::Viewport { .. }
        )
    }
}
