//! Status report sub-batch

use serde::Deserialize;
use serde_json::Value;
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info, warn};
use vtel_common::time;

use super::{resolve_vehicle, IngestError, StatusReport};
use crate::models::{NewReport, ReportRecord, ValidationError};

/// Stage every item of `items` in one transaction.
///
/// Stops at the first bad item, rolls back and records
/// `Could not save report: <reason>`. `status.reports_saved` counts staged
/// rows and is not reset by the rollback.
pub async fn ingest_reports(conn: &mut SqliteConnection, items: &[Value], status: &mut StatusReport) {
    let mut tx = match conn.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            warn!(error = %e, "Could not open report transaction");
            status.fail(format!("Could not save reports: {}", e));
            return;
        }
    };

    for (index, item) in items.iter().enumerate() {
        if let Err(e) = stage_report(&mut tx, item).await {
            warn!(index, error = %e, "Rejected report; rolling back batch");
            status.fail(format!("Could not save report: {}", e));
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Report rollback failed");
            }
            return;
        }
        status.reports_saved += 1;
    }

    match tx.commit().await {
        Ok(()) => info!(count = items.len(), "Reports committed"),
        Err(e) => {
            warn!(error = %e, "Report commit failed");
            status.fail(format!("Could not save reports: {}", e));
        }
    }
}

async fn stage_report(conn: &mut SqliteConnection, item: &Value) -> Result<(), IngestError> {
    let record = ReportRecord::deserialize(item).map_err(ValidationError::from)?;

    let mut vehicle = resolve_vehicle(conn, &record.vehicle_id).await?;
    let report = NewReport::from_record(&record)?;
    vehicle.persist(conn).await?;
    insert_report(conn, &report).await?;

    debug!(vehicle_id = %report.vehicle_id, status = %report.status, "Staged report");
    Ok(())
}

async fn insert_report(conn: &mut SqliteConnection, report: &NewReport) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO reports (vehicle_id, status, timestamp) VALUES (?, ?, ?)")
        .bind(&report.vehicle_id)
        .bind(report.status.as_str())
        .bind(time::to_storage(&report.timestamp))
        .execute(&mut *conn)
        .await?;
    Ok(())
}
