// Local cache for the GDAC index files

use super::mirror::MirrorFetcher;
use super::write_atomic;
use crate::error::Result;
use crate::index::{load_index, ParsedIndex};
use std::path::PathBuf;
use tracing::info;

/// Index files cached by name under one directory
///
/// A cached file is reused as-is; there is no staleness check.
pub struct IndexCache<'a> {
    fetcher: &'a MirrorFetcher,
    dir: PathBuf,
}

impl<'a> IndexCache<'a> {
    pub fn new(fetcher: &'a MirrorFetcher, dir: impl Into<PathBuf>) -> Self {
        Self {
            fetcher,
            dir: dir.into(),
        }
    }

    /// Raw bytes of the index `name`, fetched and cached on first use
    pub async fn bytes(&self, name: &str) -> Result<Vec<u8>> {
        let path = self.dir.join(name);

        if tokio::fs::try_exists(&path).await? {
            let bytes = tokio::fs::read(&path).await?;
            info!(path = %path.display(), kb = bytes.len() / 1024, "Using cached index");
            return Ok(bytes);
        }

        info!(index = name, "Downloading index");
        let fetched = self
            .fetcher
            .fetch(name, self.fetcher.config().index_max_tries)
            .await?;
        write_atomic(&path, &fetched.bytes).await?;
        info!(
            path = %path.display(),
            mirror = %fetched.mirror,
            kb = fetched.bytes.len() / 1024,
            "Cached index"
        );

        Ok(fetched.bytes)
    }

    /// Load and parse the index `name`
    pub async fn load(&self, name: &str) -> Result<ParsedIndex> {
        let bytes = self.bytes(name).await?;
        let name = name.to_string();
        tokio::task::spawn_blocking(move || load_index(&bytes, Some(&name))).await?
    }
}
