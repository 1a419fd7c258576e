//! Acquisition from the GDAC mirrors
//!
//! - [`MirrorFetcher`]: ordered mirror fallback with capped exponential backoff
//! - [`Downloader`]: bounded worker pool with skip-if-present and atomic writes
//! - [`IndexCache`]: local cache of the two index files

pub mod cache;
pub mod downloader;
pub mod mirror;

pub use cache::IndexCache;
pub use downloader::{local_path, DownloadOutcome, DownloadReport, Downloader};
pub use mirror::{join_url, Fetched, MirrorFetcher};

use crate::error::{IngestError, Result};
use std::path::Path;

/// Write `bytes` to a sibling temp file, then rename it into place
///
/// An interrupted write leaves only a `.part-*` file behind, never a truncated
/// file at `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| IngestError::InvalidPath {
        path: path.display().to_string(),
        reason: "no parent directory".to_string(),
    })?;
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| IngestError::InvalidPath {
            path: path.display().to_string(),
            reason: "no file name".to_string(),
        })?;

    tokio::fs::create_dir_all(parent).await?;

    let tmp = parent.join(format!(".{name}.part-{}", uuid::Uuid::new_v4()));
    if let Err(e) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    tracing::debug!(path = %path.display(), kb = bytes.len() / 1024, "Saved");
    Ok(())
}
