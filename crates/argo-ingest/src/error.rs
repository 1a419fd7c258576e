//! Error types for the ingest pipeline

use argo_common::ArgoError;

/// Result type for ingest operations
pub type Result<T> = std::result::Result<T, IngestError>;

/// Error types for acquisition and normalization
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid profile path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Dataset error: {0}")]
    Dataset(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Core index has no ocean column (header: {header:?})")]
    MissingOceanColumn { header: Vec<String> },

    #[error("Invalid ocean code: {0}")]
    InvalidOcean(String),

    #[error("Background task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<ArgoError> for IngestError {
    fn from(err: ArgoError) -> Self {
        match err {
            ArgoError::InvalidOcean(code) => IngestError::InvalidOcean(code),
            ArgoError::Io(e) => IngestError::Io(e),
            ArgoError::Config(msg) => IngestError::Config(msg),
            other => IngestError::Parse(other.to_string()),
        }
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::Parse(err.to_string())
    }
}

impl From<regex::Error> for IngestError {
    fn from(err: regex::Error) -> Self {
        IngestError::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for IngestError {
    fn from(err: serde_json::Error) -> Self {
        IngestError::Parse(err.to_string())
    }
}

#[cfg(feature = "netcdf")]
impl From<netcdf::Error> for IngestError {
    fn from(err: netcdf::Error) -> Self {
        IngestError::Dataset(err.to_string())
    }
}

impl IngestError {
    /// Process exit code the command-line surface uses for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            IngestError::InvalidOcean(_) => 2,
            IngestError::MissingOceanColumn { .. } => 3,
            _ => 1,
        }
    }
}
