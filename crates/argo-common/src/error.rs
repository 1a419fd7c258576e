//! Error types shared across the Argo workspace

use thiserror::Error;

/// Result type alias for shared Argo operations
pub type Result<T> = std::result::Result<T, ArgoError>;

/// Main error type for the shared vocabulary and configuration helpers
#[derive(Error, Debug)]
pub enum ArgoError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid ocean code: {0:?} (expected a single letter such as A, I or P)")]
    InvalidOcean(String),

    #[error("Invalid file type: {0}")]
    InvalidFileType(String),

    #[error("Invalid modality: {0}")]
    InvalidModality(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
