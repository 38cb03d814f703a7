//! Filtered reads over reports, detections and vehicles
//!
//! Every filter is optional and all of them combine with `AND`. Range bounds
//! (`start`/`end`, `value_min`/`value_max`) are inclusive. An explicitly empty
//! set filter (`statuses`, `types`, `exact_values`) matches nothing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use vtel_common::time;

use crate::models::{Detection, Report, ReportStatus, Vehicle};

const REPORT_COLUMNS: &str = "SELECT id, vehicle_id, status, timestamp, created_at, modified FROM reports";
const DETECTION_COLUMNS: &str = "SELECT id, vehicle_id, type, value, timestamp, created_at, modified FROM detections";

/// Filters for [`get_reports`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportQuery {
    pub statuses: Option<Vec<ReportStatus>>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub vehicle_id: Option<String>,
}

impl ReportQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn statuses(mut self, statuses: impl IntoIterator<Item = ReportStatus>) -> Self {
        self.statuses = Some(statuses.into_iter().collect());
        self
    }

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn vehicle_id(mut self, vehicle_id: impl Into<String>) -> Self {
        self.vehicle_id = Some(vehicle_id.into());
        self
    }

    fn build(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(REPORT_COLUMNS);
        qb.push(" WHERE 1 = 1");

        if let Some(statuses) = &self.statuses {
            push_in(&mut qb, "status", statuses.iter().map(|s| s.as_str()));
        }
        push_time_range(&mut qb, self.start, self.end);
        if let Some(vehicle_id) = &self.vehicle_id {
            qb.push(" AND vehicle_id = ").push_bind(vehicle_id.clone());
        }

        qb.push(" ORDER BY timestamp, id");
        qb
    }
}

/// Filters for [`get_detections`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionQuery {
    pub types: Option<Vec<String>>,
    pub exact_values: Option<Vec<f64>>,
    pub value_min: Option<f64>,
    pub value_max: Option<f64>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub vehicle_id: Option<String>,
}

impl DetectionQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn exact_values(mut self, values: impl IntoIterator<Item = f64>) -> Self {
        self.exact_values = Some(values.into_iter().collect());
        self
    }

    pub fn value_min(mut self, min: f64) -> Self {
        self.value_min = Some(min);
        self
    }

    pub fn value_max(mut self, max: f64) -> Self {
        self.value_max = Some(max);
        self
    }

    pub fn start(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    pub fn end(mut self, end: DateTime<Utc>) -> Self {
        self.end = Some(end);
        self
    }

    pub fn vehicle_id(mut self, vehicle_id: impl Into<String>) -> Self {
        self.vehicle_id = Some(vehicle_id.into());
        self
    }

    fn build(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(DETECTION_COLUMNS);
        qb.push(" WHERE 1 = 1");

        if let Some(types) = &self.types {
            push_in(&mut qb, "type", types.iter().cloned());
        }
        if let Some(values) = &self.exact_values {
            push_in(&mut qb, "value", values.iter().copied());
        }
        if let Some(min) = self.value_min {
            qb.push(" AND value >= ").push_bind(min);
        }
        if let Some(max) = self.value_max {
            qb.push(" AND value <= ").push_bind(max);
        }
        push_time_range(&mut qb, self.start, self.end);
        if let Some(vehicle_id) = &self.vehicle_id {
            qb.push(" AND vehicle_id = ").push_bind(vehicle_id.clone());
        }

        qb.push(" ORDER BY timestamp, id");
        qb
    }
}

fn push_in<T>(qb: &mut QueryBuilder<'static, Sqlite>, column: &str, values: impl ExactSizeIterator<Item = T>)
where
    T: 'static + Send + sqlx::Encode<'static, Sqlite> + sqlx::Type<Sqlite>,
{
    if values.len() == 0 {
        qb.push(" AND 1 = 0");
        return;
    }

    qb.push(" AND ").push(column).push(" IN (");
    let mut separated = qb.separated(", ");
    for value in values {
        separated.push_bind(value);
    }
    separated.push_unseparated(")");
}

fn push_time_range(qb: &mut QueryBuilder<'static, Sqlite>, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) {
    if let Some(start) = start {
        qb.push(" AND timestamp >= ").push_bind(time::to_storage(&start));
    }
    if let Some(end) = end {
        qb.push(" AND timestamp <= ").push_bind(time::to_storage(&end));
    }
}

/// Reports matching `query`, oldest first
#[tracing::instrument(skip(executor))]
pub async fn get_reports<'e, E>(executor: E, query: &ReportQuery) -> Result<Vec<Report>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut qb = query.build();
    qb.build_query_as::<Report>().fetch_all(executor).await
}

/// Detections matching `query`, oldest first
#[tracing::instrument(skip(executor))]
pub async fn get_detections<'e, E>(executor: E, query: &DetectionQuery) -> Result<Vec<Detection>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let mut qb = query.build();
    qb.build_query_as::<Detection>().fetch_all(executor).await
}

pub async fn get_vehicle<'e, E>(executor: E, vehicle_id: &str) -> Result<Option<Vehicle>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, Vehicle>("SELECT id, created_at, modified FROM vehicles WHERE id = ?")
        .bind(vehicle_id)
        .fetch_optional(executor)
        .await
}

/// A vehicle together with everything it has reported
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleHistory {
    pub vehicle: Vehicle,
    pub reports: Vec<Report>,
    pub detections: Vec<Detection>,
}

pub async fn get_vehicle_history(pool: &SqlitePool, vehicle_id: &str) -> Result<Option<VehicleHistory>, sqlx::Error> {
    let Some(vehicle) = get_vehicle(pool, vehicle_id).await? else {
        return Ok(None);
    };

    let reports = get_reports(pool, &ReportQuery::new().vehicle_id(vehicle_id)).await?;
    let detections = get_detections(pool, &DetectionQuery::new().vehicle_id(vehicle_id)).await?;

    Ok(Some(VehicleHistory {
        vehicle,
        reports,
        detections,
    }))
}

/// Delete a vehicle; its reports and detections go with it.
///
/// Returns `false` when no such vehicle exists.
pub async fn delete_vehicle<'e, E>(executor: E, vehicle_id: &str) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM vehicles WHERE id = ?")
        .bind(vehicle_id)
        .execute(executor)
        .await?;

    if result.rows_affected() > 0 {
        tracing::info!(vehicle_id, "Deleted vehicle");
    }
    Ok(result.rows_affected() > 0)
}
