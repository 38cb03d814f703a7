//! Telemetry entities and validated inputs
//!
//! Row types (`Vehicle`, `Report`, `Detection`) mirror the database tables.
//! Incoming payload items are first deserialized into loose `*Record` structs
//! and then turned into `NewReport` / `NewDetection`, whose constructors are
//! the only place status and object-type rules are enforced.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vtel_common::{time, VtelError};

/// Object types accepted when no allow-list is configured
pub const DEFAULT_OBJECT_TYPES: &[&str] = &["pedestrians", "cars", "signs"];

/// Reasons a payload item cannot become a report or detection
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid status value: {0}")]
    InvalidStatus(String),

    #[error("Invalid object type: {0}")]
    InvalidObjectType(String),

    #[error("Vehicle ID cannot be empty")]
    EmptyVehicleId,

    #[error(transparent)]
    Timestamp(#[from] VtelError),

    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),
}

// ============================================================================
// Rows
// ============================================================================

/// A vehicle as stored in the `vehicles` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Vehicle {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// A status report as stored in the `reports` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Report {
    pub id: i64,
    pub vehicle_id: String,
    #[sqlx(try_from = "String")]
    pub status: ReportStatus,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

/// A single object detection as stored in the `detections` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Detection {
    pub id: i64,
    pub vehicle_id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub object_type: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

// ============================================================================
// Report status
// ============================================================================

/// Vehicle state carried by a status report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Parking,
    Driving,
    Accident,
}

impl ReportStatus {
    pub const ALL: [ReportStatus; 3] = [ReportStatus::Parking, ReportStatus::Driving, ReportStatus::Accident];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Parking => "parking",
            ReportStatus::Driving => "driving",
            ReportStatus::Accident => "accident",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ReportStatus {
    type Err = ValidationError;

    /// Status values are matched exactly; `Driving` is not `driving`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "parking" => Ok(ReportStatus::Parking),
            "driving" => Ok(ReportStatus::Driving),
            "accident" => Ok(ReportStatus::Accident),
            _ => Err(ValidationError::InvalidStatus(s.to_string())),
        }
    }
}

impl TryFrom<String> for ReportStatus {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// ============================================================================
// Object type allow-list
// ============================================================================

/// The set of detection object types the ingester accepts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectTypes(Vec<String>);

impl ObjectTypes {
    pub fn new<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list: Vec<String> = Vec::new();
        for ty in types {
            let ty = ty.into().trim().to_string();
            if !ty.is_empty() && !list.contains(&ty) {
                list.push(ty);
            }
        }
        Self(list)
    }

    pub fn contains(&self, object_type: &str) -> bool {
        self.0.iter().any(|t| t == object_type)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl Default for ObjectTypes {
    fn default() -> Self {
        Self::new(DEFAULT_OBJECT_TYPES.iter().copied())
    }
}

impl std::str::FromStr for ObjectTypes {
    type Err = std::convert::Infallible;

    /// Parse a comma-separated list such as `pedestrians,cars,signs`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s.split(',')))
    }
}

impl std::fmt::Display for ObjectTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

// ============================================================================
// Payload records
// ============================================================================

/// One entry of the `vehicle_status` array
#[derive(Debug, Clone, Deserialize)]
pub struct ReportRecord {
    pub vehicle_id: String,
    pub status: String,
    pub report_time: String,
}

/// One entry of the `objects_detection_events` array
///
/// Individual detections stay as raw JSON so a malformed one is reported
/// against the detection rather than the whole event.
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionEvent {
    pub vehicle_id: String,
    pub detection_time: String,
    pub detections: Vec<serde_json::Value>,
}

/// One entry of an event's `detections` array
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionRecord {
    pub object_type: String,
    pub object_value: f64,
}

// ============================================================================
// Validated inputs
// ============================================================================

/// A report that passed validation and is ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub vehicle_id: String,
    pub status: ReportStatus,
    pub timestamp: DateTime<Utc>,
}

impl NewReport {
    pub fn new(vehicle_id: &str, status: &str, timestamp: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            vehicle_id: validate_vehicle_id(vehicle_id)?.to_string(),
            status: status.parse()?,
            timestamp: time::parse_timestamp(timestamp)?,
        })
    }

    pub fn from_record(record: &ReportRecord) -> Result<Self, ValidationError> {
        Self::new(&record.vehicle_id, &record.status, &record.report_time)
    }
}

/// A detection that passed validation and is ready to insert
#[derive(Debug, Clone, PartialEq)]
pub struct NewDetection {
    pub vehicle_id: String,
    pub object_type: String,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

impl NewDetection {
    pub fn new(
        vehicle_id: &str,
        object_type: &str,
        value: f64,
        timestamp: DateTime<Utc>,
        allowed: &ObjectTypes,
    ) -> Result<Self, ValidationError> {
        if !allowed.contains(object_type) {
            return Err(ValidationError::InvalidObjectType(object_type.to_string()));
        }

        Ok(Self {
            vehicle_id: validate_vehicle_id(vehicle_id)?.to_string(),
            object_type: object_type.to_string(),
            value,
            timestamp,
        })
    }
}

/// Reject blank vehicle IDs; anything else is an opaque key.
pub fn validate_vehicle_id(vehicle_id: &str) -> Result<&str, ValidationError> {
    if vehicle_id.trim().is_empty() {
        return Err(ValidationError::EmptyVehicleId);
    }
    Ok(vehicle_id)
}
