//! Telemetry payload ingestion
//!
//! A payload is a JSON object with up to two recognized keys:
//!
//! - `vehicle_status`: status reports, handled by [`reports::ingest_reports`]
//! - `objects_detection_events`: detection events, handled by
//!   [`detections::ingest_detections`]
//!
//! Each sub-batch runs in its own transaction and records its outcome in a
//! shared [`StatusReport`]. A failing sub-batch is rolled back without
//! affecting the other one. Unrecognized keys are ignored.
//!
//! # Example
//!
//! ```no_run
//! use vtel_ingest::ingest::Ingestor;
//!
//! # async fn run(pool: sqlx::SqlitePool) {
//! let ingestor = Ingestor::new(pool);
//! let status = ingestor
//!     .ingest(r#"{"vehicle_status": [{"vehicle_id": "v1", "status": "driving", "report_time": "2022-05-05T22:02:34.546Z"}]}"#)
//!     .await;
//! assert_eq!(status.reports_saved, 1);
//! # }
//! ```

pub mod detections;
pub mod reports;
pub mod status;
pub mod vehicles;

use serde_json::{Map, Value};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{info, warn};

use crate::models::{ObjectTypes, ValidationError};

pub use status::{IngestStatus, StatusReport};
pub use vehicles::{resolve_vehicle, VehicleRef};

/// Payload key holding status reports
pub const REPORTS_KEY: &str = "vehicle_status";

/// Payload key holding detection events
pub const EVENTS_KEY: &str = "objects_detection_events";

/// Failure of a single payload item
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Coordinates ingestion of raw payloads against a connection pool
#[derive(Debug, Clone)]
pub struct Ingestor {
    pool: SqlitePool,
    object_types: ObjectTypes,
}

impl Ingestor {
    /// Create an ingestor accepting the default object types.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            object_types: ObjectTypes::default(),
        }
    }

    /// Replace the detection allow-list.
    pub fn with_object_types(mut self, object_types: ObjectTypes) -> Self {
        self.object_types = object_types;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn object_types(&self) -> &ObjectTypes {
        &self.object_types
    }

    /// Ingest one raw payload using a connection from the pool.
    ///
    /// Never fails: every problem ends up in the returned [`StatusReport`].
    #[tracing::instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn ingest(&self, data: &str) -> StatusReport {
        let payload = match Payload::parse(data) {
            Ok(payload) => payload,
            Err(status) => return status,
        };

        if payload.is_empty() {
            info!("Payload has no recognized keys");
            return StatusReport::new();
        }

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(error = %e, "Could not acquire database connection");
                return StatusReport::failed(format!("Could not acquire database connection: {}", e));
            }
        };

        self.run(&mut conn, payload).await
    }

    /// Ingest one raw payload on a caller-supplied connection.
    ///
    /// If `conn` is inside an open transaction, each sub-batch becomes a
    /// savepoint and the caller's transaction is left open.
    #[tracing::instrument(skip(self, conn, data), fields(bytes = data.len()))]
    pub async fn ingest_with(&self, conn: &mut SqliteConnection, data: &str) -> StatusReport {
        match Payload::parse(data) {
            Ok(payload) => self.run(conn, payload).await,
            Err(status) => status,
        }
    }

    async fn run(&self, conn: &mut SqliteConnection, payload: Payload) -> StatusReport {
        let mut status = StatusReport::new();

        if let Some(value) = payload.reports {
            match value.as_array() {
                Some(items) => reports::ingest_reports(conn, items, &mut status).await,
                None => status.fail(format!(
                    "Could not save reports: expected an array under `{}`, found {}",
                    REPORTS_KEY,
                    json_kind(&value)
                )),
            }
        }

        if let Some(value) = payload.events {
            match value.as_array() {
                Some(events) => {
                    detections::ingest_detections(conn, events, &self.object_types, &mut status).await
                }
                None => status.fail(format!(
                    "Could not save detections: expected an array under `{}`, found {}",
                    EVENTS_KEY,
                    json_kind(&value)
                )),
            }
        }

        info!(
            status = %status.status,
            reports_saved = status.reports_saved,
            detections_saved = status.detections_saved,
            errors = status.errors.len(),
            "Ingest finished"
        );

        status
    }
}

/// The recognized parts of a decoded payload
#[derive(Debug, Default)]
struct Payload {
    reports: Option<Value>,
    events: Option<Value>,
}

impl Payload {
    fn parse(data: &str) -> Result<Self, StatusReport> {
        let value: Value = serde_json::from_str(data).map_err(|e| {
            warn!(error = %e, "Could not parse payload");
            StatusReport::failed(format!("Could not parse data: {}", e))
        })?;

        let mut object: Map<String, Value> = match value {
            Value::Object(object) => object,
            other => {
                warn!(found = json_kind(&other), "Payload is not a JSON object");
                return Err(StatusReport::failed(format!(
                    "Could not parse data: expected a JSON object, found {}",
                    json_kind(&other)
                )));
            }
        };

        Ok(Self {
            reports: object.remove(REPORTS_KEY),
            events: object.remove(EVENTS_KEY),
        })
    }

    fn is_empty(&self) -> bool {
        self.reports.is_none() && self.events.is_none()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
