//! Run configuration
//!
//! Every component receives its settings through one of these structs, built
//! once at process start and passed by reference.

use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::path::PathBuf;
use std::time::Duration;

/// Public GDAC mirrors, tried in order
pub const DEFAULT_MIRRORS: [&str; 5] = [
    "https://data-argo.ifremer.fr/",
    "https://ftp.ifremer.fr/ifremer/argo/",
    "http://ftp.ifremer.fr/ifremer/argo/",
    "https://nrlgodae1.nrlmry.navy.mil/ftp/outgoing/argo/",
    "http://nrlgodae1.nrlmry.navy.mil/ftp/outgoing/argo/",
];

pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;
pub const DEFAULT_FILE_MAX_TRIES: u32 = 2;
pub const DEFAULT_INDEX_MAX_TRIES: u32 = 3;
pub const DEFAULT_BACKOFF_BASE_SECS: f64 = 1.0;
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_BACKOFF_CAP_SECS: f64 = 8.0;
pub const DEFAULT_DEST_ROOT: &str = "./argo_nc";
pub const DEFAULT_INDEX_DIR: &str = "indexes";

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 5;
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Acquisition settings: mirrors, retry policy, worker pool, local layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Mirror base URLs, in fallback order
    pub mirrors: Vec<String>,

    /// Concurrent download workers
    pub workers: usize,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Skip TLS certificate verification
    pub insecure: bool,

    /// Attempts per mirror for profile files
    pub file_max_tries: u32,

    /// Attempts per mirror for index files
    pub index_max_tries: u32,

    pub backoff_base_secs: f64,
    pub backoff_factor: f64,
    pub backoff_cap_secs: f64,

    /// Root of the local download tree (files land under `<dest_root>/dac`)
    pub dest_root: PathBuf,

    /// Directory where index files are cached
    pub index_dir: PathBuf,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            mirrors: DEFAULT_MIRRORS.iter().map(|m| m.to_string()).collect(),
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            insecure: false,
            file_max_tries: DEFAULT_FILE_MAX_TRIES,
            index_max_tries: DEFAULT_INDEX_MAX_TRIES,
            backoff_base_secs: DEFAULT_BACKOFF_BASE_SECS,
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            backoff_cap_secs: DEFAULT_BACKOFF_CAP_SECS,
            dest_root: PathBuf::from(DEFAULT_DEST_ROOT),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the mirror list with a single forced server
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.mirrors = vec![server.into()];
        self
    }

    pub fn with_mirrors(mut self, mirrors: Vec<String>) -> Self {
        self.mirrors = mirrors;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    pub fn with_max_tries(mut self, files: u32, indexes: u32) -> Self {
        self.file_max_tries = files;
        self.index_max_tries = indexes;
        self
    }

    /// Set the backoff schedule (`base * factor^k`, capped)
    pub fn with_backoff(mut self, base_secs: f64, factor: f64, cap_secs: f64) -> Self {
        self.backoff_base_secs = base_secs;
        self.backoff_factor = factor;
        self.backoff_cap_secs = cap_secs;
        self
    }

    pub fn with_dest_root(mut self, dest: impl Into<PathBuf>) -> Self {
        self.dest_root = dest.into();
        self
    }

    pub fn with_index_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.index_dir = dir.into();
        self
    }

    /// Directory holding the mirrored `dac/` tree
    pub fn dac_root(&self) -> PathBuf {
        self.dest_root.join("dac")
    }

    /// Delay after the zero-based failed attempt `k`
    pub fn backoff_delay(&self, k: u32) -> Duration {
        if self.backoff_base_secs.is_nan() || self.backoff_base_secs <= 0.0 {
            return Duration::ZERO;
        }
        let exp = i32::try_from(k).unwrap_or(i32::MAX);
        let secs = (self.backoff_base_secs * self.backoff_factor.powi(exp))
            .min(self.backoff_cap_secs)
            .max(0.0);
        if secs.is_finite() {
            Duration::from_secs_f64(secs)
        } else {
            Duration::from_secs_f64(self.backoff_cap_secs.max(0.0))
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.mirrors.is_empty() {
            return Err("At least one mirror is required".to_string());
        }
        if self.mirrors.iter().any(|m| m.trim().is_empty()) {
            return Err("Mirror URLs cannot be empty".to_string());
        }
        if self.workers == 0 {
            return Err("Worker count must be greater than 0".to_string());
        }
        if self.timeout_secs == 0 {
            return Err("Timeout must be greater than 0".to_string());
        }
        if self.file_max_tries == 0 || self.index_max_tries == 0 {
            return Err("Max tries must be at least 1".to_string());
        }
        if !(self.backoff_base_secs >= 0.0 && self.backoff_cap_secs >= 0.0) {
            return Err("Backoff delays cannot be negative".to_string());
        }
        if !(self.backoff_factor >= 1.0) {
            return Err("Backoff factor must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Relational store connection settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
            connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Load from `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and
    /// `DATABASE_CONNECT_TIMEOUT`, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let url = std::env::var("DATABASE_URL")
            .map_err(|_| IngestError::Config("DATABASE_URL not set".to_string()))?;

        Ok(Self {
            url,
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DATABASE_MAX_CONNECTIONS),
            connect_timeout_secs: std::env::var("DATABASE_CONNECT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(IngestError::Config("Database URL cannot be empty".to_string()));
        }
        if self.max_connections == 0 {
            return Err(IngestError::Config(
                "Database max connections must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Open a connection pool
    pub async fn connect(&self) -> Result<PgPool> {
        self.validate()?;

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.connect_timeout_secs))
            .connect(&self.url)
            .await?;

        tracing::info!(
            max_connections = self.max_connections,
            "Database connection pool created"
        );

        Ok(pool)
    }
}

/// Closed interval of plausible values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Hard physical plausibility limits per measured quantity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicalRanges {
    /// Sea pressure, dbar
    pub pres: ValueRange,
    /// In-situ temperature, degC
    pub temp: ValueRange,
    /// Practical salinity, PSS-78
    pub psal: ValueRange,
    /// Dissolved oxygen, umol/kg
    pub doxy: ValueRange,
    /// Chlorophyll-a, mg/m3
    pub chla: ValueRange,
    pub latitude: ValueRange,
    pub longitude: ValueRange,
}

impl Default for PhysicalRanges {
    fn default() -> Self {
        Self {
            pres: ValueRange::new(0.0, 12_000.0),
            temp: ValueRange::new(-3.0, 45.0),
            psal: ValueRange::new(0.0, 45.0),
            doxy: ValueRange::new(0.0, 500.0),
            chla: ValueRange::new(0.0, 100.0),
            latitude: ValueRange::new(-90.0, 90.0),
            longitude: ValueRange::new(-180.0, 360.0),
        }
    }
}

impl PhysicalRanges {
    /// Range for a file variable name; `_ADJUSTED` variants share the raw range
    pub fn for_variable(&self, name: &str) -> Option<ValueRange> {
        let upper = name.to_ascii_uppercase();
        let base = upper.strip_suffix("_ADJUSTED").unwrap_or(&upper);
        match base {
            "PRES" => Some(self.pres),
            "TEMP" => Some(self.temp),
            "PSAL" => Some(self.psal),
            "DOXY" => Some(self.doxy),
            "CHLA" => Some(self.chla),
            "LATITUDE" => Some(self.latitude),
            "LONGITUDE" => Some(self.longitude),
            _ => None,
        }
    }
}

/// Normalization settings
#[derive(Debug, Clone)]
pub struct LoadConfig {
    /// Acquisition root; profile files are found under `<root>/dac`
    pub root: PathBuf,
    pub ranges: PhysicalRanges,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_DEST_ROOT),
            ranges: PhysicalRanges::default(),
        }
    }
}

impl LoadConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_ranges(mut self, ranges: PhysicalRanges) -> Self {
        self.ranges = ranges;
        self
    }

    pub fn dac_root(&self) -> PathBuf {
        self.root.join("dac")
    }
}
