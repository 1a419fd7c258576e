//! Argo Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup, and error handling for the Argo ingest workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`ArgoError`] and the crate [`Result`] alias
//! - **Logging**: structured `tracing` setup driven by [`logging::LogConfig`]
//! - **Types**: the vocabulary shared by every reader of the relational schema
//!   (ocean codes, file types, profile modalities, QC flags)
//!
//! # Example
//!
//! ```no_run
//! use argo_common::types::OceanCode;
//! use argo_common::Result;
//!
//! fn parse_ocean(arg: &str) -> Result<OceanCode> {
//!     let ocean: OceanCode = arg.parse()?;
//!     println!("Filtering ocean {}", ocean);
//!     Ok(ocean)
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{ArgoError, Result};
