//! `vtel ingest` command implementation
//!
//! Ingests the given files once, in argument order. Unlike the watcher, the
//! files are left where they are.

use std::path::PathBuf;

use tracing::warn;

use crate::ingest::{Ingestor, StatusReport};

pub async fn run(ingestor: &Ingestor, files: &[PathBuf]) -> Vec<StatusReport> {
    let mut statuses = Vec::with_capacity(files.len());

    for path in files {
        let status = match tokio::fs::read_to_string(path).await {
            Ok(data) => ingestor.ingest(&data).await,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Could not read file");
                StatusReport::failed(format!("Could not read file {}: {}", path.display(), e))
            }
        };
        statuses.push(status);
    }

    statuses
}
