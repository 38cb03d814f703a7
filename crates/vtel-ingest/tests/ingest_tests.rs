//! Ingestion integration tests

mod helpers;

use std::time::Duration;

use helpers::{fixture, TestDb, VEHICLE_A, VEHICLE_B, VEHICLE_C};
use serde_json::json;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::Connection;
use vtel_common::time::parse_timestamp;
use vtel_ingest::ingest::IngestStatus;
use vtel_ingest::query::{get_detections, get_vehicle, DetectionQuery};
use vtel_ingest::Ingestor;

#[tokio::test]
async fn test_ingest_detections_fixture() {
    let db = TestDb::new().await;

    let status = db.ingestor().ingest(&fixture("objects.json")).await;

    assert_eq!(status.status, IngestStatus::Success);
    assert_eq!(status.reports_saved, 0);
    assert_eq!(status.detections_saved, 7);
    assert!(status.errors.is_empty());

    assert_eq!(db.count("vehicles").await, 1);
    assert_eq!(db.count("detections").await, 7);

    let expected = [
        ("2022-06-05T21:02:34.546Z", vec!["pedestrians", "pedestrians", "cars", "signs"]),
        ("2022-06-05T21:05:20.590Z", vec!["cars"]),
        ("2022-06-05T21:11:35.567Z", vec!["trucks", "obstacles"]),
    ];

    for (time, types) in expected {
        let ts = parse_timestamp(time).unwrap();
        let found = get_detections(db.pool(), &DetectionQuery::new().start(ts).end(ts))
            .await
            .unwrap();

        let found_types: Vec<&str> = found.iter().map(|d| d.object_type.as_str()).collect();
        assert_eq!(found_types, types, "detections at {}", time);
        assert!(found.iter().all(|d| d.vehicle_id == VEHICLE_A));
        assert!(found.iter().all(|d| d.timestamp == ts));
    }
}

#[tokio::test]
async fn test_ingest_reports_fixture() {
    let db = TestDb::new().await;

    let status = db.ingestor().ingest(&fixture("statuses.json")).await;

    assert!(status.is_success());
    assert_eq!(status.reports_saved, 3);
    assert_eq!(status.detections_saved, 0);
    assert_eq!(db.count("reports").await, 3);
    assert_eq!(db.count("vehicles").await, 3);

    for id in [VEHICLE_A, VEHICLE_B, VEHICLE_C] {
        assert!(get_vehicle(db.pool(), id).await.unwrap().is_some(), "vehicle {}", id);
    }
}

#[tokio::test]
async fn test_default_allow_list_rejects_fixture_detections() {
    let db = TestDb::new().await;

    let status = db.strict_ingestor().ingest(&fixture("objects.json")).await;

    assert_eq!(status.status, IngestStatus::Failure);
    assert_eq!(status.errors, vec!["Could not save detection: Invalid object type: trucks"]);
    // rows staged before the bad detection are still counted
    assert_eq!(status.detections_saved, 5);

    assert_eq!(db.count("detections").await, 0);
    assert_eq!(db.count("vehicles").await, 0);
}

#[tokio::test]
async fn test_illegal_object_type_creates_nothing() {
    let db = TestDb::new().await;
    let payload = json!({
        "objects_detection_events": [{
            "vehicle_id": "foo bar",
            "detection_time": "2020-01-01T00:00:00Z",
            "detections": [{"object_type": "wrong!", "object_value": 1}]
        }]
    });

    let status = db.ingestor().ingest(&payload.to_string()).await;

    assert_eq!(status.status, IngestStatus::Failure);
    assert!(status.errors.iter().any(|e| e.contains("Invalid object type: wrong!")));
    assert_eq!(status.detections_saved, 0);
    assert!(get_vehicle(db.pool(), "foo bar").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unrecognized_keys_are_ignored() {
    let db = TestDb::new().await;
    let payload = json!({
        "objects_detection_key": [{
            "vehicle_id": "foo bar",
            "detection_time": "2020-01-01T00:00:00Z",
            "detections": [{"object_type": "wrong!", "object_value": 1}]
        }]
    });

    let status = db.ingestor().ingest(&payload.to_string()).await;

    assert_eq!(status.status, IngestStatus::Success);
    assert!(status.errors.is_empty());
    assert_eq!(status.reports_saved, 0);
    assert_eq!(status.detections_saved, 0);
    assert_eq!(db.count("vehicles").await, 0);
}

#[tokio::test]
async fn test_malformed_json_is_a_parse_failure() {
    let db = TestDb::new().await;

    let status = db.ingestor().ingest("{\"vehicle_status\": [").await;

    assert_eq!(status.status, IngestStatus::Failure);
    assert_eq!(status.errors.len(), 1);
    assert!(status.errors[0].starts_with("Could not parse data: "));
    assert_eq!(status.reports_saved, 0);
    assert_eq!(status.detections_saved, 0);
}

#[tokio::test]
async fn test_invalid_status_rolls_back_whole_batch() {
    let db = TestDb::new().await;
    let payload = json!({
        "vehicle_status": [
            {"vehicle_id": "v1", "status": "driving", "report_time": "2022-05-05T22:02:34.546Z"},
            {"vehicle_id": "v2", "status": "flying", "report_time": "2022-05-05T22:03:00.000Z"},
            {"vehicle_id": "v3", "status": "parking", "report_time": "2022-05-05T22:04:00.000Z"}
        ]
    });

    let status = db.ingestor().ingest(&payload.to_string()).await;

    assert_eq!(status.status, IngestStatus::Failure);
    assert_eq!(status.errors, vec!["Could not save report: Invalid status value: flying"]);
    assert_eq!(status.reports_saved, 1);

    assert_eq!(db.count("reports").await, 0);
    assert_eq!(db.count("vehicles").await, 0);
}

#[tokio::test]
async fn test_missing_field_stops_reports() {
    let db = TestDb::new().await;
    let payload = json!({
        "vehicle_status": [
            {"vehicle_id": "v1", "report_time": "2022-05-05T22:02:34.546Z"}
        ]
    });

    let status = db.ingestor().ingest(&payload.to_string()).await;

    assert_eq!(status.status, IngestStatus::Failure);
    assert_eq!(status.errors.len(), 1);
    assert!(status.errors[0].starts_with("Could not save report: Malformed record: "));
    assert!(status.errors[0].contains("status"));
    assert_eq!(status.reports_saved, 0);
}

#[tokio::test]
async fn test_bad_detection_time_fails_the_event() {
    let db = TestDb::new().await;
    let payload = json!({
        "objects_detection_events": [{
            "vehicle_id": "v1",
            "detection_time": "sometime",
            "detections": [{"object_type": "cars", "object_value": 1}]
        }]
    });

    let status = db.ingestor().ingest(&payload.to_string()).await;

    assert_eq!(status.status, IngestStatus::Failure);
    assert_eq!(status.errors.len(), 1);
    assert!(status.errors[0].starts_with("Could not save event: Invalid timestamp 'sometime'"));
    assert_eq!(db.count("vehicles").await, 0);
}

#[tokio::test]
async fn test_sub_batches_are_independent() {
    let db = TestDb::new().await;
    let payload = json!({
        "vehicle_status": [
            {"vehicle_id": "v1", "status": "accident", "report_time": "2022-05-06T00:02:34.546Z"}
        ],
        "objects_detection_events": [{
            "vehicle_id": "v1",
            "detection_time": "2022-05-06T00:02:35.000Z",
            "detections": [
                {"object_type": "cars", "object_value": 1},
                {"object_type": "bicycles", "object_value": 2}
            ]
        }]
    });

    let status = db.ingestor().ingest(&payload.to_string()).await;

    assert_eq!(status.status, IngestStatus::Failure);
    assert_eq!(status.errors, vec!["Could not save detection: Invalid object type: bicycles"]);
    assert_eq!(status.reports_saved, 1);
    assert_eq!(status.detections_saved, 1);

    // the report batch committed before the detection batch failed
    assert_eq!(db.count("reports").await, 1);
    assert_eq!(db.count("vehicles").await, 1);
    assert_eq!(db.count("detections").await, 0);
}

#[tokio::test]
async fn test_non_array_value_fails_only_its_batch() {
    let db = TestDb::new().await;
    let payload = json!({
        "vehicle_status": 5,
        "objects_detection_events": [{
            "vehicle_id": "v1",
            "detection_time": "2022-05-06T00:02:35Z",
            "detections": [{"object_type": "signs", "object_value": 1.5}]
        }]
    });

    let status = db.ingestor().ingest(&payload.to_string()).await;

    assert_eq!(status.status, IngestStatus::Failure);
    assert_eq!(
        status.errors,
        vec!["Could not save reports: expected an array under `vehicle_status`, found a number"]
    );
    assert_eq!(status.detections_saved, 1);
    assert_eq!(db.count("detections").await, 1);
}

#[tokio::test]
async fn test_repeated_vehicle_ids_share_one_row() {
    let db = TestDb::new().await;
    let payload = json!({
        "vehicle_status": [
            {"vehicle_id": "v1", "status": "driving", "report_time": "2022-05-05T22:00:00Z"},
            {"vehicle_id": "v1", "status": "parking", "report_time": "2022-05-05T23:00:00Z"},
            {"vehicle_id": "v1", "status": "driving", "report_time": "2022-05-06T00:00:00Z"}
        ],
        "objects_detection_events": [
            {"vehicle_id": "v1", "detection_time": "2022-05-05T22:30:00Z",
             "detections": [{"object_type": "cars", "object_value": 1}]},
            {"vehicle_id": "v1", "detection_time": "2022-05-05T22:31:00Z",
             "detections": [{"object_type": "cars", "object_value": 2}]}
        ]
    })
    .to_string();

    let first = db.ingestor().ingest(&payload).await;
    let second = db.ingestor().ingest(&payload).await;

    assert!(first.is_success());
    assert!(second.is_success());
    assert_eq!(db.count("vehicles").await, 1);
    // no de-duplication of child rows
    assert_eq!(db.count("reports").await, 6);
    assert_eq!(db.count("detections").await, 4);
}

#[tokio::test]
async fn test_event_without_detections_creates_no_vehicle() {
    let db = TestDb::new().await;
    let payload = json!({
        "objects_detection_events": [
            {"vehicle_id": "quiet", "detection_time": "2022-05-05T22:30:00Z", "detections": []}
        ]
    });

    let status = db.ingestor().ingest(&payload.to_string()).await;

    assert!(status.is_success());
    assert_eq!(status.detections_saved, 0);
    assert_eq!(db.count("vehicles").await, 0);
}

#[tokio::test]
async fn test_ingest_with_leaves_caller_transaction_open() {
    let db = TestDb::new().await;
    let ingestor = db.ingestor();
    let mut conn = db.pool().acquire().await.unwrap();
    let mut tx = conn.begin().await.unwrap();

    let status = ingestor.ingest_with(&mut tx, &fixture("statuses.json")).await;
    assert!(status.is_success());
    assert_eq!(status.reports_saved, 3);

    let staged: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports")
        .fetch_one(&mut *tx)
        .await
        .unwrap();
    assert_eq!(staged, 3);

    tx.rollback().await.unwrap();

    assert_eq!(db.count("reports").await, 0);
    assert_eq!(db.count("vehicles").await, 0);
}

#[tokio::test]
async fn test_detection_round_trip() {
    let db = TestDb::new().await;
    let payload = json!({
        "objects_detection_events": [{
            "vehicle_id": "round-trip",
            "detection_time": "2020-01-01T00:00:00Z",
            "detections": [{"object_type": "signs", "object_value": 1.25}]
        }]
    });

    let status = db.ingestor().ingest(&payload.to_string()).await;
    assert!(status.is_success());

    let found = get_detections(
        db.pool(),
        &DetectionQuery::new()
            .vehicle_id("round-trip")
            .types(["signs"])
            .value_min(1.25)
            .value_max(1.25),
    )
    .await
    .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].value, 1.25);
    assert_eq!(found[0].timestamp, parse_timestamp("2020-01-01T00:00:00Z").unwrap());
}

#[tokio::test]
async fn test_report_commit_failure_is_reported() {
    let db = TestDb::with_rollback_journal().await;

    // a reader holding its shared lock keeps the writer from committing
    let mut reader = db.pool().acquire().await.unwrap();
    let mut read_tx = reader.begin().await.unwrap();
    let _: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM reports")
        .fetch_one(&mut *read_tx)
        .await
        .unwrap();

    let status = db.ingestor().ingest(&fixture("statuses.json")).await;

    read_tx.rollback().await.unwrap();
    drop(reader);

    assert_eq!(status.status, IngestStatus::Failure);
    assert_eq!(status.errors.len(), 1);
    assert!(status.errors[0].starts_with("Could not save reports: "), "{}", status.errors[0]);
    assert_eq!(status.reports_saved, 3);

    assert_eq!(db.count("reports").await, 0);
    assert_eq!(db.count("vehicles").await, 0);
}

#[tokio::test]
async fn test_detection_commit_failure_is_reported() {
    let db = TestDb::with_rollback_journal().await;

    let mut reader = db.pool().acquire().await.unwrap();
    let mut read_tx = reader.begin().await.unwrap();
    let _: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM detections")
        .fetch_one(&mut *read_tx)
        .await
        .unwrap();

    let status = db.ingestor().ingest(&fixture("objects.json")).await;

    read_tx.rollback().await.unwrap();
    drop(reader);

    assert_eq!(status.status, IngestStatus::Failure);
    assert_eq!(status.errors.len(), 1);
    assert!(status.errors[0].starts_with("Could not save detections: "), "{}", status.errors[0]);
    assert_eq!(status.detections_saved, 7);

    assert_eq!(db.count("detections").await, 0);
    assert_eq!(db.count("vehicles").await, 0);
}

#[tokio::test]
async fn test_unreachable_database_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let options = SqliteConnectOptions::new().filename(dir.path().join("missing").join("vtel.db"));
    let pool = SqlitePoolOptions::new()
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy_with(options);
    let ingestor = Ingestor::new(pool);

    let status = ingestor.ingest(&fixture("statuses.json")).await;

    assert_eq!(status.status, IngestStatus::Failure);
    assert_eq!(status.errors.len(), 1);
    assert!(status.errors[0].starts_with("Could not acquire database connection: "));
    assert_eq!(status.reports_saved, 0);
    assert_eq!(status.detections_saved, 0);
}
