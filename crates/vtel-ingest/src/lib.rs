//! VTel Ingest Library
//!
//! Ingestion of vehicle telemetry into SQLite.
//!
//! # Overview
//!
//! - **Ingestion**: validate and store status reports and detection events
//!   from JSON payloads ([`ingest::Ingestor`])
//! - **Folder watching**: drain a directory of payload files on an interval
//!   ([`watch::FolderWatcher`])
//! - **Queries**: filtered reads over reports, detections and vehicles
//!   ([`query`])
//! - **Storage**: pool creation and migrations ([`db`])
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod commands;
pub mod config;
pub mod db;
pub mod ingest;
pub mod models;
pub mod query;
pub mod watch;

// Re-export commonly used types
pub use config::Config;
pub use ingest::{Ingestor, StatusReport};
pub use watch::{FolderWatcher, WatchConfig};

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use models::{ObjectTypes, ReportStatus};

/// VTel - vehicle telemetry ingestion
#[derive(Parser, Debug)]
#[command(name = "vtel")]
#[command(author, version, about, long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create or upgrade the database schema
    Migrate,

    /// Ingest payload files once; files are left in place
    Ingest {
        /// Payload files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Accepted detection object types (comma-separated)
        #[arg(long)]
        object_types: Option<ObjectTypes>,
    },

    /// Poll a directory and ingest every payload file dropped into it
    Watch {
        /// Directory to watch
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Milliseconds between polls
        #[arg(short, long)]
        interval_ms: Option<u64>,

        /// Stop after this many seconds
        #[arg(short, long)]
        timeout: Option<f64>,

        /// Milliseconds to wait before the first poll
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Move consumed files here instead of deleting them
        #[arg(long)]
        archive_dir: Option<PathBuf>,

        /// File suffix to pick up
        #[arg(long)]
        extension: Option<String>,

        /// Accepted detection object types (comma-separated)
        #[arg(long)]
        object_types: Option<ObjectTypes>,
    },

    /// List status reports
    Reports {
        /// Only these statuses (repeatable)
        #[arg(short, long = "status")]
        statuses: Vec<ReportStatus>,

        /// Earliest report time, inclusive (ISO 8601)
        #[arg(long, value_parser = parse_time)]
        start: Option<DateTime<Utc>>,

        /// Latest report time, inclusive (ISO 8601)
        #[arg(long, value_parser = parse_time)]
        end: Option<DateTime<Utc>>,

        /// Only this vehicle
        #[arg(long)]
        vehicle: Option<String>,
    },

    /// List detections
    Detections {
        /// Only these object types (repeatable)
        #[arg(short = 't', long = "type")]
        types: Vec<String>,

        /// Only these exact values (repeatable)
        #[arg(long = "value")]
        values: Vec<f64>,

        /// Minimum value, inclusive
        #[arg(long)]
        min: Option<f64>,

        /// Maximum value, inclusive
        #[arg(long)]
        max: Option<f64>,

        /// Earliest detection time, inclusive (ISO 8601)
        #[arg(long, value_parser = parse_time)]
        start: Option<DateTime<Utc>>,

        /// Latest detection time, inclusive (ISO 8601)
        #[arg(long, value_parser = parse_time)]
        end: Option<DateTime<Utc>>,

        /// Only this vehicle
        #[arg(long)]
        vehicle: Option<String>,
    },

    /// Show a vehicle with its reports and detections
    Vehicle {
        /// Vehicle ID
        id: String,

        /// Delete the vehicle and everything it reported
        #[arg(long)]
        delete: bool,
    },
}

fn parse_time(value: &str) -> vtel_common::Result<DateTime<Utc>> {
    vtel_common::time::parse_timestamp(value)
}
