//! `vtel watch` command implementation

use std::future::Future;

use tracing::info;

use crate::ingest::{Ingestor, StatusReport};
use crate::watch::{FolderWatcher, WatchConfig};

/// Watch until the configured timeout elapses or `shutdown` resolves.
pub async fn run<F>(ingestor: Ingestor, config: WatchConfig, shutdown: F) -> Vec<StatusReport>
where
    F: Future<Output = ()>,
{
    info!(
        directory = %config.directory.display(),
        archive_dir = ?config.archive_dir,
        "Watching directory"
    );

    let watcher = FolderWatcher::new(ingestor, config);
    watcher.watch_until(shutdown).await
}
