//! Argo Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Acquisition and normalization of Argo float profile files.
//!
//! # Stages
//!
//! - **Acquisition**: load the GDAC index files ([`index`]), select files by
//!   date window and ocean ([`select`]), and download them with mirror
//!   fallback and retry ([`fetch`]).
//! - **Normalization**: parse each profile file ([`profile`]), clean values and
//!   compute best values ([`clean`], [`levels`]), and upsert the result into
//!   Postgres one file per transaction ([`storage`]).
//!
//! [`pipeline`] drives both stages.
//!
//! # Example
//!
//! ```no_run
//! use argo_common::types::OceanCode;
//! use argo_ingest::config::FetchConfig;
//! use argo_ingest::pipeline::AcquisitionPipeline;
//! use argo_ingest::select::SelectionWindow;
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let window = SelectionWindow::from_dates(
//!         NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
//!         NaiveDate::from_ymd_opt(2023, 2, 1).unwrap(),
//!         OceanCode::new('I')?,
//!     );
//!     let report = AcquisitionPipeline::new(FetchConfig::default())
//!         .run(&window, false, |_, _| {})
//!         .await?;
//!     println!("OK={} FAIL={}", report.ok, report.fail);
//!     Ok(())
//! }
//! ```

pub mod clean;
pub mod config;
pub mod error;
pub mod fetch;
pub mod index;
pub mod levels;
pub mod pipeline;
pub mod profile;
pub mod select;
pub mod storage;

pub use error::{IngestError, Result};
