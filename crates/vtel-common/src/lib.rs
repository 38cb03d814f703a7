//! VTel Common Library
//!
//! Shared types, utilities, and error handling for the VTel workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`VtelError`] and the [`Result`] alias
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Time**: parsing and storage formatting of telemetry timestamps
//!
//! # Example
//!
//! ```no_run
//! use vtel_common::{time, Result};
//!
//! fn parse(raw: &str) -> Result<()> {
//!     let ts = time::parse_timestamp(raw)?;
//!     println!("stored as {}", time::to_storage(&ts));
//!     Ok(())
//! }
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod error;
pub mod logging;
pub mod time;

// Re-export commonly used types
pub use error::{Result, VtelError};
