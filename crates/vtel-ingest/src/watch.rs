//! Folder watcher
//!
//! Polls a directory on a fixed interval, ingests every matching file it
//! finds and removes (or archives) the file afterwards. One [`StatusReport`]
//! is collected per file, in the order files were processed.
//!
//! ```text
//! start ──(delay)──> poll ──> ingest files ──> sleep(interval) ──┐
//!                      ^                                          │
//!                      └────────── until timeout / shutdown ──────┘
//! ```

use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::ingest::{Ingestor, StatusReport};

/// Default time between directory polls
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default file suffix picked up by the watcher
pub const DEFAULT_EXTENSION: &str = "json";

#[derive(Debug, Clone, PartialEq)]
pub struct WatchConfig {
    /// Directory to poll
    pub directory: PathBuf,
    /// Sleep between polls
    pub interval: Duration,
    /// Stop once this much time has passed since start; `None` runs until shutdown
    pub timeout: Option<Duration>,
    /// Wait this long after start before the first poll
    pub delay: Option<Duration>,
    /// File suffix without the dot
    pub extension: String,
    /// Move consumed files here instead of deleting them
    pub archive_dir: Option<PathBuf>,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            interval: DEFAULT_INTERVAL,
            timeout: None,
            delay: None,
            extension: DEFAULT_EXTENSION.to_string(),
            archive_dir: None,
        }
    }
}

impl WatchConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    fn matches(&self, file_name: &str) -> bool {
        file_name
            .strip_suffix(self.extension.as_str())
            .is_some_and(|stem| stem.ends_with('.'))
    }
}

pub struct FolderWatcher {
    ingestor: Ingestor,
    config: WatchConfig,
}

impl FolderWatcher {
    pub fn new(ingestor: Ingestor, config: WatchConfig) -> Self {
        Self { ingestor, config }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    /// Watch until the configured timeout elapses.
    ///
    /// Without a timeout this never returns; use [`FolderWatcher::watch_until`].
    pub async fn watch(&self) -> Vec<StatusReport> {
        self.watch_until(std::future::pending::<()>()).await
    }

    /// Watch until the timeout elapses or `shutdown` resolves.
    ///
    /// Shutdown interrupts the delay and interval sleeps; a file that is
    /// already being ingested is finished first.
    #[tracing::instrument(skip_all, fields(directory = %self.config.directory.display()))]
    pub async fn watch_until<F>(&self, shutdown: F) -> Vec<StatusReport>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let started = Instant::now();
        let mut statuses = Vec::new();

        info!(
            interval = ?self.config.interval,
            timeout = ?self.config.timeout,
            delay = ?self.config.delay,
            "Watcher started"
        );

        if let Some(delay) = self.config.delay {
            let wait = match self.config.timeout {
                Some(timeout) => delay.min(timeout),
                None => delay,
            };
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Watcher stopped during start delay");
                    return statuses;
                }
                _ = sleep(wait) => {}
            }
        }

        loop {
            if self.config.timeout.is_some_and(|timeout| started.elapsed() > timeout) {
                break;
            }

            for path in self.list_files().await {
                statuses.push(self.consume(&path).await);
            }

            tokio::select! {
                _ = &mut shutdown => {
                    info!("Watcher received shutdown");
                    break;
                }
                _ = sleep(self.config.interval) => {}
            }
        }

        info!(files = statuses.len(), "Watcher stopped");
        statuses
    }

    /// Matching regular files in the watched directory, in listing order.
    async fn list_files(&self) -> Vec<PathBuf> {
        let mut entries = match tokio::fs::read_dir(&self.config.directory).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Could not list watched directory");
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "Could not read directory entry");
                    break;
                }
            };

            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let name = entry.file_name();
            if is_file && name.to_str().is_some_and(|n| self.config.matches(n)) {
                files.push(entry.path());
            }
        }

        if !files.is_empty() {
            debug!(count = files.len(), "Found files to ingest");
        }
        files
    }

    /// Read, ingest and dispose of one file.
    async fn consume(&self, path: &Path) -> StatusReport {
        let status = match tokio::fs::read_to_string(path).await {
            Ok(data) => self.ingestor.ingest(&data).await,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Could not read file");
                StatusReport::failed(format!("Could not read file {}: {}", path.display(), e))
            }
        };

        info!(
            file = %path.display(),
            status = %status.status,
            reports_saved = status.reports_saved,
            detections_saved = status.detections_saved,
            "Ingested file"
        );

        self.dispose(path).await;
        status
    }

    /// Move the file to the archive directory, or delete it.
    async fn dispose(&self, path: &Path) {
        if let Some(archive_dir) = &self.config.archive_dir {
            match archive(path, archive_dir).await {
                Ok(target) => {
                    debug!(file = %path.display(), archived = %target.display(), "Archived file");
                    return;
                }
                Err(e) => warn!(file = %path.display(), error = %e, "Could not archive file; deleting"),
            }
        }

        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(file = %path.display(), error = %e, "Could not remove file");
        }
    }
}

async fn archive(path: &Path, archive_dir: &Path) -> std::io::Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"))?;

    tokio::fs::create_dir_all(archive_dir).await?;

    let source_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let (source_dir, archive_canonical) = tokio::try_join!(
        tokio::fs::canonicalize(source_dir),
        tokio::fs::canonicalize(archive_dir)
    )?;
    if source_dir == archive_canonical {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "archive directory is the watched directory",
        ));
    }

    let target = archive_dir.join(file_name);
    tokio::fs::rename(path, &target).await?;
    Ok(target)
}

/// Whether `a` and `b` name the same directory.
///
/// Resolves both through the filesystem when they exist, otherwise compares
/// them with `.` segments dropped.
pub fn same_directory(a: &Path, b: &Path) -> bool {
    match (std::fs::canonicalize(a), std::fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => {
            fn lexical(p: &Path) -> Vec<Component<'_>> {
                p.components().filter(|c| !matches!(c, Component::CurDir)).collect()
            }
            lexical(a) == lexical(b)
        }
    }
}
