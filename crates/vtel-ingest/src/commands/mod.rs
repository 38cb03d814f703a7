//! Command implementations for the `vtel` binary
//!
//! Each command returns a serializable value; the binary prints it as JSON.

pub mod ingest;
pub mod query;
pub mod watch;

use anyhow::Context;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Open the configured database and bring its schema up to date.
pub async fn connect(config: &Config) -> anyhow::Result<SqlitePool> {
    let pool = db::create_pool(&config.database)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.url))?;
    db::run_migrations(&pool).await?;
    Ok(pool)
}

/// `vtel migrate`
pub async fn migrate(config: &Config) -> anyhow::Result<serde_json::Value> {
    let pool = connect(config).await?;
    db::health_check(&pool).await?;
    pool.close().await;

    Ok(serde_json::json!({
        "status": "success",
        "database": config.database.url,
    }))
}

/// Write `value` to stdout as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to render output")?;
    println!("{}", rendered);
    Ok(())
}
