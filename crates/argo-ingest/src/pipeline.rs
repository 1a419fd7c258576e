// Acquisition and normalization drivers
//
// Acquisition: indexes -> selection -> parallel downloads.
// Normalization: files under <root>/dac -> parse -> one transaction per file,
// strictly sequential.

use crate::config::{FetchConfig, LoadConfig};
use crate::error::{IngestError, Result};
use crate::fetch::{DownloadOutcome, DownloadReport, Downloader, IndexCache, MirrorFetcher};
use crate::index::{ParsedIndex, BGC_INDEX, CORE_INDEX};
use crate::profile::{extract_profiles, open_dataset, ParsedFile, ProfilePathParser};
use crate::select::{select_paths, SelectionWindow};
use crate::storage::{ArgoStorage, StoreStats};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};
use walkdir::WalkDir;

/// Index download, selection and file download
pub struct AcquisitionPipeline {
    config: FetchConfig,
}

impl AcquisitionPipeline {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    /// Download every file the window selects
    ///
    /// `on_result` is called once per file as downloads complete. Only index
    /// or selection failures are returned as errors; per-file failures are
    /// counted in the report.
    pub async fn run<F>(
        &self,
        window: &SelectionWindow,
        include_bgc: bool,
        on_result: F,
    ) -> Result<DownloadReport>
    where
        F: FnMut(&DownloadOutcome, &DownloadReport),
    {
        let start_time = Instant::now();
        let fetcher = MirrorFetcher::new(&self.config)?;
        let cache = IndexCache::new(&fetcher, &self.config.index_dir);

        let core = cache.load(CORE_INDEX).await?;
        info!(rows = core.len(), columns = ?core.header, "Loaded core index");

        let bgc = if include_bgc {
            self.load_bgc(&cache).await
        } else {
            None
        };

        let selected = select_paths(&core, bgc.as_ref(), window)?;
        info!(
            files = selected.len(),
            start = %window.start,
            end = %window.end,
            ocean = %window.ocean,
            "Selected files"
        );

        if selected.is_empty() {
            warn!("No files matched the selection window");
            return Ok(DownloadReport::default());
        }

        let dac_root = self.config.dac_root();
        tokio::fs::create_dir_all(&dac_root).await?;

        let report = Downloader::new(&fetcher, dac_root)
            .download_all(&selected, on_result)
            .await;

        info!(
            ok = report.ok,
            fail = report.fail,
            elapsed_secs = start_time.elapsed().as_secs_f64(),
            "Acquisition complete"
        );
        Ok(report)
    }

    /// The BGC index is optional; a failure to get it only drops BGC selection
    async fn load_bgc(&self, cache: &IndexCache<'_>) -> Option<ParsedIndex> {
        match cache.load(BGC_INDEX).await {
            Ok(index) => {
                info!(rows = index.len(), columns = ?index.header, "Loaded BGC index");
                Some(index)
            },
            Err(e) => {
                warn!(error = %e, "BGC index unavailable; continuing with core files only");
                None
            },
        }
    }
}

/// Totals of a normalization run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub files_ok: usize,
    pub files_failed: usize,
    pub profiles: usize,
    pub core_levels: usize,
    pub bgc_levels: usize,
}

impl LoadReport {
    fn record(&mut self, stats: &StoreStats) {
        self.files_ok += 1;
        self.profiles += stats.profiles;
        self.core_levels += stats.core_levels;
        self.bgc_levels += stats.bgc_levels;
    }
}

/// Profile files below `dac_root`, sorted by relative path (`/`-separated)
pub fn find_profile_files(dac_root: &Path) -> Result<Vec<(PathBuf, String)>> {
    if !dac_root.is_dir() {
        return Err(IngestError::InvalidPath {
            path: dac_root.display().to_string(),
            reason: "not a directory".to_string(),
        });
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dac_root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            },
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let is_nc = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("nc"));
        if !is_nc {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(dac_root) else {
            continue;
        };
        let rel_path = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((entry.path().to_path_buf(), rel_path));
    }

    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Sequential file-by-file ingestion into the relational store
pub struct LoadPipeline {
    storage: ArgoStorage,
    config: LoadConfig,
    paths: ProfilePathParser,
}

impl LoadPipeline {
    pub fn new(storage: ArgoStorage, config: LoadConfig) -> Result<Self> {
        Ok(Self {
            storage,
            config,
            paths: ProfilePathParser::new()?,
        })
    }

    /// Ingest every profile file under `<root>/dac`
    ///
    /// A failing file is logged and counted; the run moves on to the next one.
    pub async fn run(&self) -> Result<LoadReport> {
        let start_time = Instant::now();
        let dac_root = self.config.dac_root();
        let files = find_profile_files(&dac_root)?;
        info!(files = files.len(), root = %dac_root.display(), "Starting load");

        let mut report = LoadReport::default();
        for (path, rel_path) in files {
            match self.ingest_file(&path, &rel_path).await {
                Ok(stats) => {
                    report.record(&stats);
                    info!(
                        path = %rel_path,
                        profiles = stats.profiles,
                        core_levels = stats.core_levels,
                        bgc_levels = stats.bgc_levels,
                        "Ingested file"
                    );
                },
                Err(e) => {
                    report.files_failed += 1;
                    error!(path = %rel_path, error = %e, "Failed to ingest file");
                },
            }
        }

        info!(
            files_ok = report.files_ok,
            files_failed = report.files_failed,
            profiles = report.profiles,
            core_levels = report.core_levels,
            bgc_levels = report.bgc_levels,
            elapsed_secs = start_time.elapsed().as_secs_f64(),
            "Load complete"
        );
        Ok(report)
    }

    /// Parse and store one file
    pub async fn ingest_file(&self, path: &Path, rel_path: &str) -> Result<StoreStats> {
        let parsed = self.parse_file(path, rel_path).await?;
        self.storage.store_file(&parsed).await
    }

    /// Open and parse one file off the async runtime
    pub async fn parse_file(&self, path: &Path, rel_path: &str) -> Result<ParsedFile> {
        let profile_path = self.paths.parse(rel_path)?;
        let ranges = self.config.ranges;
        let path = path.to_path_buf();

        tokio::task::spawn_blocking(move || {
            let ds = open_dataset(&path)?;
            extract_profiles(&*ds, profile_path, &ranges)
        })
        .await?
    }
}
