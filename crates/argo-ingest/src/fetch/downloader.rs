// Concurrent, resumable profile downloads

use super::mirror::MirrorFetcher;
use super::write_atomic;
use crate::error::{IngestError, Result};
use futures::stream::{self, StreamExt};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Result of one file download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub rel_path: String,
    pub success: bool,
    pub message: String,
    /// Mirror that served the file; `None` for skips and failures
    pub mirror: Option<String>,
}

/// Running tally of a download batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DownloadReport {
    pub selected: usize,
    pub ok: usize,
    pub fail: usize,
}

impl DownloadReport {
    fn record(&mut self, outcome: &DownloadOutcome) {
        if outcome.success {
            self.ok += 1;
        } else {
            self.fail += 1;
        }
    }
}

/// Local destination of a relative profile path under the `dac/` root
///
/// Absolute paths and `..` components are rejected so that every download
/// stays inside the tree.
pub fn local_path(dac_root: &Path, rel_path: &str) -> Result<PathBuf> {
    let rel = Path::new(rel_path.trim_start_matches('/'));
    if rel_path.trim().is_empty()
        || rel
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(IngestError::InvalidPath {
            path: rel_path.to_string(),
            reason: "must be a relative path inside the dac tree".to_string(),
        });
    }
    Ok(rel_path
        .split('/')
        .filter(|s| !s.is_empty())
        .fold(dac_root.to_path_buf(), |acc, part| acc.join(part)))
}

/// Worker pool over a [`MirrorFetcher`]
pub struct Downloader<'a> {
    fetcher: &'a MirrorFetcher,
    dac_root: PathBuf,
}

impl<'a> Downloader<'a> {
    pub fn new(fetcher: &'a MirrorFetcher, dac_root: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            dac_root: dac_root.into(),
        }
    }

    /// Download every path with at most `workers` in flight
    ///
    /// `on_result` sees each outcome as it completes, together with the tally
    /// so far. Completion order is not submission order.
    pub async fn download_all<F>(&self, rel_paths: &[String], mut on_result: F) -> DownloadReport
    where
        F: FnMut(&DownloadOutcome, &DownloadReport),
    {
        let workers = self.fetcher.config().workers.max(1);
        let mut report = DownloadReport {
            selected: rel_paths.len(),
            ..DownloadReport::default()
        };

        info!(files = rel_paths.len(), workers, "Starting downloads");

        let mut outcomes = stream::iter(rel_paths.iter())
            .map(|rel| self.download_one(rel))
            .buffer_unordered(workers);

        while let Some(outcome) = outcomes.next().await {
            report.record(&outcome);
            on_result(&outcome, &report);
        }

        info!(ok = report.ok, fail = report.fail, "Downloads complete");
        report
    }

    /// Fetch one file unless it is already on disk
    pub async fn download_one(&self, rel_path: &str) -> DownloadOutcome {
        match self.try_download(rel_path).await {
            Ok((message, mirror)) => DownloadOutcome {
                rel_path: rel_path.to_string(),
                success: true,
                message,
                mirror,
            },
            Err(e) => DownloadOutcome {
                rel_path: rel_path.to_string(),
                success: false,
                message: e.to_string(),
                mirror: None,
            },
        }
    }

    async fn try_download(&self, rel_path: &str) -> Result<(String, Option<String>)> {
        let out_path = local_path(&self.dac_root, rel_path)?;

        if tokio::fs::try_exists(&out_path).await? {
            debug!(path = rel_path, "Already downloaded");
            return Ok(("exists".to_string(), None));
        }

        let remote = format!("dac/{}", rel_path.trim_start_matches('/'));
        let fetched = self
            .fetcher
            .fetch(&remote, self.fetcher.config().file_max_tries)
            .await?;

        write_atomic(&out_path, &fetched.bytes).await?;

        Ok((
            format!("ok ({} KB)", fetched.bytes.len() / 1024),
            Some(fetched.mirror),
        ))
    }
}
