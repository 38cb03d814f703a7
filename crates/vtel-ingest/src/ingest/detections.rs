//! Detection event sub-batch

use serde::Deserialize;
use serde_json::Value;
use sqlx::{Connection, SqliteConnection};
use tracing::{debug, info, warn};
use vtel_common::time;

use super::{resolve_vehicle, IngestError, StatusReport};
use crate::models::{DetectionEvent, DetectionRecord, NewDetection, ObjectTypes, ValidationError};

/// Where inside an event staging stopped
enum Failure {
    Event(IngestError),
    Detection(IngestError),
}

impl Failure {
    fn message(&self) -> String {
        match self {
            Failure::Event(e) => format!("Could not save event: {}", e),
            Failure::Detection(e) => format!("Could not save detection: {}", e),
        }
    }
}

/// Stage every detection of every event in one transaction.
///
/// The first bad event or detection rolls back the whole sub-batch and ends
/// both loops. `status.detections_saved` counts staged rows and is not reset
/// by the rollback.
pub async fn ingest_detections(
    conn: &mut SqliteConnection,
    events: &[Value],
    allowed: &ObjectTypes,
    status: &mut StatusReport,
) {
    let mut tx = match conn.begin().await {
        Ok(tx) => tx,
        Err(e) => {
            warn!(error = %e, "Could not open detection transaction");
            status.fail(format!("Could not save detections: {}", e));
            return;
        }
    };

    for (index, event) in events.iter().enumerate() {
        if let Err(failure) = stage_event(&mut tx, event, allowed, status).await {
            let message = failure.message();
            warn!(index, error = %message, "Rejected detection event; rolling back batch");
            status.fail(message);
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Detection rollback failed");
            }
            return;
        }
    }

    match tx.commit().await {
        Ok(()) => info!(events = events.len(), "Detections committed"),
        Err(e) => {
            warn!(error = %e, "Detection commit failed");
            status.fail(format!("Could not save detections: {}", e));
        }
    }
}

async fn stage_event(
    conn: &mut SqliteConnection,
    event: &Value,
    allowed: &ObjectTypes,
    status: &mut StatusReport,
) -> Result<(), Failure> {
    let event = DetectionEvent::deserialize(event)
        .map_err(|e| Failure::Event(ValidationError::from(e).into()))?;

    let mut vehicle = resolve_vehicle(conn, &event.vehicle_id)
        .await
        .map_err(Failure::Event)?;
    let timestamp = time::parse_timestamp(&event.detection_time)
        .map_err(|e| Failure::Event(ValidationError::from(e).into()))?;

    for raw in &event.detections {
        let record = DetectionRecord::deserialize(raw)
            .map_err(|e| Failure::Detection(ValidationError::from(e).into()))?;
        let detection = NewDetection::new(
            vehicle.id(),
            &record.object_type,
            record.object_value,
            timestamp,
            allowed,
        )
        .map_err(|e| Failure::Detection(e.into()))?;

        vehicle
            .persist(conn)
            .await
            .map_err(|e| Failure::Detection(e.into()))?;
        insert_detection(conn, &detection)
            .await
            .map_err(|e| Failure::Detection(e.into()))?;

        status.detections_saved += 1;
        debug!(
            vehicle_id = %detection.vehicle_id,
            object_type = %detection.object_type,
            value = detection.value,
            "Staged detection"
        );
    }

    Ok(())
}

async fn insert_detection(conn: &mut SqliteConnection, detection: &NewDetection) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO detections (vehicle_id, type, value, timestamp) VALUES (?, ?, ?, ?)")
        .bind(&detection.vehicle_id)
        .bind(&detection.object_type)
        .bind(detection.value)
        .bind(time::to_storage(&detection.timestamp))
        .execute(&mut *conn)
        .await?;
    Ok(())
}
