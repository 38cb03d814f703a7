//! Vehicle lookup and lazy creation

use sqlx::SqliteConnection;
use tracing::debug;

use super::IngestError;
use crate::models::{validate_vehicle_id, Vehicle};

/// A vehicle that either exists already or has only been referenced so far.
#[derive(Debug, Clone, PartialEq)]
pub enum VehicleRef {
    Persisted(Vehicle),
    Unsaved(String),
}

impl VehicleRef {
    pub fn id(&self) -> &str {
        match self {
            VehicleRef::Persisted(vehicle) => &vehicle.id,
            VehicleRef::Unsaved(id) => id,
        }
    }

    pub fn is_persisted(&self) -> bool {
        matches!(self, VehicleRef::Persisted(_))
    }

    /// Insert an unsaved vehicle on `conn`. No-op once persisted.
    pub async fn persist(&mut self, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
        let id = match self {
            VehicleRef::Persisted(_) => return Ok(()),
            VehicleRef::Unsaved(id) => id.clone(),
        };

        let vehicle = sqlx::query_as::<_, Vehicle>(
            "INSERT INTO vehicles (id) VALUES (?) RETURNING id, created_at, modified",
        )
        .bind(&id)
        .fetch_one(&mut *conn)
        .await?;

        debug!(vehicle_id = %id, "Created vehicle");
        *self = VehicleRef::Persisted(vehicle);
        Ok(())
    }
}

/// Look up a vehicle by exact ID on `conn`.
///
/// A missing vehicle is not an error; the caller gets an unsaved reference it
/// can persist inside the same transaction. Rows inserted earlier in that
/// transaction are visible here, so repeated IDs resolve to one vehicle.
pub async fn resolve_vehicle(conn: &mut SqliteConnection, vehicle_id: &str) -> Result<VehicleRef, IngestError> {
    let vehicle_id = validate_vehicle_id(vehicle_id)?;

    let existing = sqlx::query_as::<_, Vehicle>("SELECT id, created_at, modified FROM vehicles WHERE id = ?")
        .bind(vehicle_id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(match existing {
        Some(vehicle) => VehicleRef::Persisted(vehicle),
        None => VehicleRef::Unsaved(vehicle_id.to_string()),
    })
}
