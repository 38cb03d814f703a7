//! Query commands: `vtel reports`, `vtel detections`, `vtel vehicle`

use anyhow::bail;
use sqlx::SqlitePool;

use crate::models::{Detection, Report};
use crate::query::{self, DetectionQuery, ReportQuery, VehicleHistory};

/// Empty repeatable flags mean "no filter" on the command line.
fn non_empty<T>(values: Vec<T>) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

pub async fn reports(pool: &SqlitePool, mut filter: ReportQuery) -> anyhow::Result<Vec<Report>> {
    filter.statuses = filter.statuses.and_then(non_empty);
    Ok(query::get_reports(pool, &filter).await?)
}

pub async fn detections(pool: &SqlitePool, mut filter: DetectionQuery) -> anyhow::Result<Vec<Detection>> {
    filter.types = filter.types.and_then(non_empty);
    filter.exact_values = filter.exact_values.and_then(non_empty);
    Ok(query::get_detections(pool, &filter).await?)
}

pub async fn vehicle(pool: &SqlitePool, id: &str) -> anyhow::Result<VehicleHistory> {
    match query::get_vehicle_history(pool, id).await? {
        Some(history) => Ok(history),
        None => bail!("Vehicle '{}' not found", id),
    }
}

pub async fn delete_vehicle(pool: &SqlitePool, id: &str) -> anyhow::Result<serde_json::Value> {
    if !query::delete_vehicle(pool, id).await? {
        bail!("Vehicle '{}' not found", id);
    }
    Ok(serde_json::json!({ "deleted": id }))
}
