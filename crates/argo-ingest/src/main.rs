//! Argo Ingest - GDAC acquisition and relational load tool

use anyhow::{Context, Result};
use argo_common::logging::{init_logging, LogConfig, LogLevel};
use argo_common::types::OceanCode;
use argo_ingest::config::{DatabaseConfig, FetchConfig, LoadConfig};
use argo_ingest::pipeline::{AcquisitionPipeline, LoadPipeline};
use argo_ingest::select::SelectionWindow;
use argo_ingest::storage::{run_migrations, ArgoStorage};
use argo_ingest::IngestError;
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "argo-ingest")]
#[command(author, version, about = "Argo float profile acquisition and load tool")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Parser, Debug)]
enum Command {
    /// Download profile files selected from the GDAC indexes
    Fetch {
        /// First day of the window (inclusive), YYYY-MM-DD
        #[arg(long)]
        start: NaiveDate,

        /// Last day of the window (exclusive), YYYY-MM-DD
        #[arg(long)]
        end: NaiveDate,

        /// Ocean letter from the index `ocean` column (e.g. I, A, P)
        #[arg(long)]
        ocean: String,

        /// Also select files from the synthetic BGC index
        #[arg(long)]
        bgc: bool,

        /// Destination root; files land under <DEST>/dac
        #[arg(long, default_value = argo_ingest::config::DEFAULT_DEST_ROOT)]
        dest: PathBuf,

        /// Use only this mirror instead of the default list
        #[arg(long)]
        server: Option<String>,

        /// Directory for cached index files
        #[arg(long, default_value = argo_ingest::config::DEFAULT_INDEX_DIR)]
        index_dir: PathBuf,

        /// Concurrent downloads
        #[arg(long, default_value_t = argo_ingest::config::DEFAULT_WORKERS)]
        workers: usize,

        /// Per-request timeout in seconds
        #[arg(long, default_value_t = argo_ingest::config::DEFAULT_TIMEOUT_SECS)]
        timeout: u64,

        /// Accept invalid TLS certificates
        #[arg(long)]
        insecure: bool,
    },

    /// Load downloaded profile files into Postgres
    Load {
        /// Acquisition root containing the `dac` directory
        #[arg(long, default_value = argo_ingest::config::DEFAULT_DEST_ROOT)]
        root: PathBuf,

        /// Database URL (defaults to DATABASE_URL)
        #[arg(long)]
        database_url: Option<String>,

        /// Apply schema migrations before loading
        #[arg(long)]
        migrate: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        let code = e
            .downcast_ref::<IngestError>()
            .map_or(1, IngestError::exit_code);
        eprintln!("Error: {e:#}");
        std::process::exit(code);
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Environment settings apply first, --verbose can only raise the level
    let mut log_config = LogConfig::from_env()?;
    if std::env::var_os("LOG_FILE_PREFIX").is_none() {
        log_config.log_file_prefix = "argo-ingest".to_string();
    }
    if cli.verbose {
        log_config.level = LogLevel::Debug;
    }
    init_logging(&log_config)?;

    match cli.command {
        Command::Fetch {
            start,
            end,
            ocean,
            bgc,
            dest,
            server,
            index_dir,
            workers,
            timeout,
            insecure,
        } => {
            let ocean: OceanCode = ocean.parse().map_err(IngestError::from)?;
            if end <= start {
                warn!(%start, %end, "End date is not after start date; nothing can match");
            }
            let window = SelectionWindow::from_dates(start, end, ocean);

            let mut config = FetchConfig::default()
                .with_dest_root(dest)
                .with_index_dir(index_dir)
                .with_workers(workers)
                .with_timeout(timeout)
                .with_insecure(insecure);
            if let Some(server) = server {
                config = config.with_server(server);
            }

            let report = AcquisitionPipeline::new(config)
                .run(&window, bgc, |outcome, tally| {
                    if outcome.success {
                        let mirror = outcome
                            .mirror
                            .as_deref()
                            .map(|m| format!(" [{m}]"))
                            .unwrap_or_default();
                        println!(
                            "[OK {}] {}{}  {}",
                            tally.ok, outcome.rel_path, mirror, outcome.message
                        );
                    } else {
                        println!(
                            "[FAIL {}] {}  {}",
                            tally.fail, outcome.rel_path, outcome.message
                        );
                    }
                })
                .await?;

            println!("OK={} FAIL={}", report.ok, report.fail);
        },
        Command::Load {
            root,
            database_url,
            migrate,
        } => {
            let db_config = match database_url {
                Some(url) => DatabaseConfig::new(url),
                None => DatabaseConfig::from_env()?,
            };
            let pool = db_config
                .connect()
                .await
                .context("Failed to connect to database")?;

            if migrate {
                info!("Running database migrations");
                run_migrations(&pool).await?;
            }

            let pipeline = LoadPipeline::new(ArgoStorage::new(pool), LoadConfig::new(root))?;
            let report = pipeline.run().await?;

            println!(
                "FILES_OK={} FILES_FAILED={} PROFILES={} CORE_LEVELS={} BGC_LEVELS={}",
                report.files_ok,
                report.files_failed,
                report.profiles,
                report.core_levels,
                report.bgc_levels
            );
        },
    }

    Ok(())
}
