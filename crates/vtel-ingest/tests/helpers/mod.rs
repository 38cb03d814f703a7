//! Test helpers for VTel integration tests
//!
//! This module provides utilities for:
//! - Temporary SQLite databases with migrations applied
//! - Fixture loading
//! - Row counting and payload file drops
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use tempfile::TempDir;
use vtel_ingest::db::{create_pool, run_migrations, DbConfig};
use vtel_ingest::models::ObjectTypes;
use vtel_ingest::Ingestor;

/// Vehicle that appears in both fixtures
pub const VEHICLE_A: &str = "ebab5f787798416fb2b8afc1340d7a4e";
pub const VEHICLE_B: &str = "ebae3f787798416fb2b8afc1340d7a6d";
pub const VEHICLE_C: &str = "qbae3f787798416fb2b8afc1340ddf19";

/// Test database backed by a file in a temporary directory
pub struct TestDb {
    pool: SqlitePool,
    _dir: TempDir,
}

impl TestDb {
    /// Create a fresh database and run all migrations
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = DbConfig {
            url: format!("sqlite://{}", dir.path().join("vtel-test.db").display()),
            ..Default::default()
        };

        let pool = create_pool(&config).await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        Self { pool, _dir: dir }
    }

    /// Database in rollback-journal mode with a short busy timeout
    ///
    /// An open read transaction on one connection makes COMMIT on another
    /// fail with `database is locked` instead of waiting.
    pub async fn with_rollback_journal() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let options = SqliteConnectOptions::new()
            .filename(dir.path().join("vtel-test.db"))
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Delete)
            .busy_timeout(Duration::from_millis(200));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        Self { pool, _dir: dir }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Ingestor accepting the object types the fixtures use
    pub fn ingestor(&self) -> Ingestor {
        Ingestor::new(self.pool.clone()).with_object_types(fleet_object_types())
    }

    /// Ingestor with the default allow-list
    pub fn strict_ingestor(&self) -> Ingestor {
        Ingestor::new(self.pool.clone())
    }

    /// Number of rows in `table`
    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count rows")
    }
}

/// Default object types plus the extra ones found in `objects.json`
pub fn fleet_object_types() -> ObjectTypes {
    ObjectTypes::new(["pedestrians", "cars", "signs", "trucks", "obstacles"])
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("Failed to read fixture")
}

/// Write `contents` into `dir/name` so a watcher never sees a partial file
pub fn drop_file(dir: &Path, name: &str, contents: &str) {
    let staging = dir.join(format!("{}.part", name));
    std::fs::write(&staging, contents).expect("Failed to write staging file");
    std::fs::rename(&staging, dir.join(name)).expect("Failed to move file into place");
}

/// Names of the entries in `dir`, sorted
pub fn list_dir(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("Failed to list dir")
        .map(|entry| entry.expect("Failed to read entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
