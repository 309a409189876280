use api::routes::routes;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use db::models::{process_usage, sample};
use db::test_utils::setup_test_db;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use serde_json::Value;
use tower::ServiceExt;
use util::state::AppState;

// ---------- test helpers ----------

async fn make_test_app() -> (Router, DatabaseConnection) {
    let db = setup_test_db().await;
    let app = Router::new().nest("/api", routes(AppState::new(db.clone())));
    (app, db)
}

async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&body).unwrap())
}

async fn seed_sample(db: &DatabaseConnection, device_index: i32, timestamp: &str) -> sample::Model {
    sample::ActiveModel {
        device_index: Set(device_index),
        timestamp: Set(timestamp.to_string()),
        utilization_percent: Set(50),
        memory_used_mb: Set(1000),
        memory_total_mb: Set(16384),
        temperature_c: Set(70),
        power_usage_w: Set(150.0),
        fan_speed_percent: Set(60),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap()
}

async fn seed_process(db: &DatabaseConnection, sample_id: i64, pid: i32, name: &str) {
    process_usage::ActiveModel {
        sample_id: Set(sample_id),
        pid: Set(pid),
        name: Set(name.to_string()),
        used_memory_mb: Set(500),
        ..Default::default()
    }
    .insert(db)
    .await
    .unwrap();
}

// ---------- TESTS ----------

#[tokio::test]
async fn empty_store_lists_no_devices() {
    let (app, _db) = make_test_app().await;

    let (status, json) = get_json(app, "/api/devices").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"], serde_json::json!([]));
    assert_eq!(json["message"], "No samples recorded yet");
}

#[tokio::test]
async fn devices_are_listed_distinct_and_sorted() {
    let (app, db) = make_test_app().await;

    seed_sample(&db, 2, "2024-01-01 00:00:00").await;
    seed_sample(&db, 0, "2024-01-01 00:00:01").await;
    seed_sample(&db, 2, "2024-01-01 00:00:02").await;

    let (status, json) = get_json(app, "/api/devices").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"], serde_json::json!([0, 2]));
}

#[tokio::test]
async fn single_snapshot_round_trips_through_the_dashboard() {
    let (app, db) = make_test_app().await;

    let row = seed_sample(&db, 0, "2024-01-01 00:00:00").await;
    seed_process(&db, row.id, 123, "x").await;

    let (status, json) = get_json(app, "/api/devices/0").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);

    let data = &json["data"];
    assert_eq!(data["device_index"], 0);
    assert_eq!(data["has_data"], true);

    let series = data["series"].as_array().unwrap();
    assert_eq!(series.len(), 1);
    assert_eq!(series[0]["timestamp"], "2024-01-01 00:00:00");
    assert_eq!(series[0]["utilization_percent"], 50);
    assert_eq!(series[0]["memory_used_mb"], 1000);
    assert_eq!(series[0]["memory_total_mb"], 16384);
    assert_eq!(series[0]["temperature_c"], 70);
    assert_eq!(series[0]["power_usage_w"], 150.0);
    assert_eq!(series[0]["fan_speed_percent"], 60);

    let processes = data["processes"].as_array().unwrap();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0]["pid"], 123);
    assert_eq!(processes[0]["name"], "x");
    assert_eq!(processes[0]["used_memory_mb"], 500);
}

#[tokio::test]
async fn unknown_device_yields_explicit_no_data() {
    let (app, db) = make_test_app().await;

    seed_sample(&db, 0, "2024-01-01 00:00:00").await;

    let (status, json) = get_json(app, "/api/devices/7").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["has_data"], false);
    assert_eq!(json["data"]["series"], serde_json::json!([]));
    assert_eq!(json["data"]["processes"], serde_json::json!([]));
    assert_eq!(json["message"], "No samples recorded for this device");
}

#[tokio::test]
async fn series_comes_back_in_timestamp_order() {
    let (app, db) = make_test_app().await;

    seed_sample(&db, 0, "2024-01-01 00:00:02").await;
    seed_sample(&db, 0, "2024-01-01 00:00:00").await;
    seed_sample(&db, 0, "2024-01-01 00:00:01").await;

    let (_, json) = get_json(app, "/api/devices/0").await;
    let timestamps: Vec<&str> = json["data"]["series"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["timestamp"].as_str().unwrap())
        .collect();
    assert_eq!(
        timestamps,
        vec![
            "2024-01-01 00:00:00",
            "2024-01-01 00:00:01",
            "2024-01-01 00:00:02",
        ]
    );
}

#[tokio::test]
async fn process_table_comes_from_the_latest_sample() {
    let (app, db) = make_test_app().await;

    let old = seed_sample(&db, 0, "2024-01-01 00:00:00").await;
    seed_process(&db, old.id, 1, "old-proc").await;
    let newer = seed_sample(&db, 0, "2024-01-01 00:00:05").await;
    seed_process(&db, newer.id, 2, "new-proc").await;

    let (_, json) = get_json(app, "/api/devices/0").await;
    let processes = json["data"]["processes"].as_array().unwrap();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0]["name"], "new-proc");
}

#[tokio::test]
async fn timestamp_tie_resolves_to_the_highest_id() {
    let (app, db) = make_test_app().await;

    let first = seed_sample(&db, 0, "2024-01-01 00:00:00").await;
    seed_process(&db, first.id, 1, "first").await;
    let second = seed_sample(&db, 0, "2024-01-01 00:00:00").await;
    seed_process(&db, second.id, 2, "second").await;
    assert!(second.id > first.id);

    let (_, json) = get_json(app, "/api/devices/0").await;
    let processes = json["data"]["processes"].as_array().unwrap();
    assert_eq!(processes.len(), 1);
    assert_eq!(processes[0]["name"], "second");
}

#[tokio::test]
async fn latest_sample_without_processes_yields_empty_table() {
    let (app, db) = make_test_app().await;

    let old = seed_sample(&db, 0, "2024-01-01 00:00:00").await;
    seed_process(&db, old.id, 1, "old-proc").await;
    seed_sample(&db, 0, "2024-01-01 00:00:05").await;

    let (_, json) = get_json(app, "/api/devices/0").await;
    assert_eq!(json["data"]["has_data"], true);
    assert_eq!(json["data"]["processes"], serde_json::json!([]));
}
