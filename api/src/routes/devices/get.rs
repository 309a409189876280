use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use util::state::AppState;

use crate::response::ApiResponse;
use db::models::{process_usage, sample};

/// One point of a per-device time series, in recording order.
#[derive(Debug, Serialize)]
pub struct SeriesPoint {
    pub timestamp: String,
    pub utilization_percent: i32,
    pub memory_used_mb: i64,
    pub memory_total_mb: i64,
    pub temperature_c: i32,
    pub power_usage_w: f64,
    pub fan_speed_percent: i32,
}

#[derive(Debug, Serialize)]
pub struct ProcessRow {
    pub pid: i32,
    pub name: String,
    pub used_memory_mb: i64,
}

/// Everything the dashboard needs for one selected device: the full series
/// for charting plus the process table of the latest sample. `has_data`
/// distinguishes "device never sampled" from a genuinely idle device.
#[derive(Debug, Default, Serialize)]
pub struct DeviceDashboard {
    pub device_index: i32,
    pub has_data: bool,
    pub series: Vec<SeriesPoint>,
    pub processes: Vec<ProcessRow>,
}

/// GET /api/devices
///
/// Sorted list of device indexes with at least one recorded sample.
pub async fn list_devices(State(state): State<AppState>) -> Json<ApiResponse<Vec<i32>>> {
    match sample::Model::device_indexes(state.db()).await {
        Ok(devices) => {
            let message = if devices.is_empty() {
                "No samples recorded yet"
            } else {
                "OK"
            };
            Json(ApiResponse::success(devices, message))
        }
        Err(e) => {
            tracing::error!("failed to list devices: {e}");
            Json(ApiResponse::error("Telemetry store unavailable"))
        }
    }
}

/// GET /api/devices/{device_index}
///
/// Reads both tables in full, reattaches process rows to their samples via a
/// multimap built once, and reshapes the selected device's rows into an
/// ascending series plus the latest process table. A device with no samples
/// yields an explicit no-data payload, never an error.
pub async fn device_dashboard(
    State(state): State<AppState>,
    Path(device_index): Path<i32>,
) -> Json<ApiResponse<DeviceDashboard>> {
    let samples = match sample::Model::find_all_ordered(state.db()).await {
        Ok(samples) => samples,
        Err(e) => {
            tracing::error!("failed to read samples: {e}");
            return Json(ApiResponse::error("Telemetry store unavailable"));
        }
    };
    let process_rows = match process_usage::Model::find_all(state.db()).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!("failed to read process usages: {e}");
            return Json(ApiResponse::error("Telemetry store unavailable"));
        }
    };

    let device_samples: Vec<&sample::Model> = samples
        .iter()
        .filter(|s| s.device_index == device_index)
        .collect();

    if device_samples.is_empty() {
        return Json(ApiResponse::success(
            DeviceDashboard {
                device_index,
                ..Default::default()
            },
            "No samples recorded for this device",
        ));
    }

    let processes_by_sample = group_by_sample(process_rows);
    let latest = latest_sample(&device_samples);
    let processes = latest
        .and_then(|s| processes_by_sample.get(&s.id))
        .map(|rows| rows.iter().map(process_row).collect())
        .unwrap_or_default();

    let series = device_samples.iter().map(|s| series_point(s)).collect();

    Json(ApiResponse::success(
        DeviceDashboard {
            device_index,
            has_data: true,
            series,
            processes,
        },
        "OK",
    ))
}

/// Multimap of `sample_id → process rows`, built once per read.
fn group_by_sample(
    rows: Vec<process_usage::Model>,
) -> HashMap<i64, Vec<process_usage::Model>> {
    let mut map: HashMap<i64, Vec<process_usage::Model>> = HashMap::new();
    for row in rows {
        map.entry(row.sample_id).or_default().push(row);
    }
    map
}

/// The sample that sources the "current process table". Timestamp ties are
/// broken by the surrogate key, so the pick is deterministic per query.
fn latest_sample<'a>(samples: &[&'a sample::Model]) -> Option<&'a sample::Model> {
    samples
        .iter()
        .max_by_key(|s| (s.timestamp.as_str(), s.id))
        .copied()
}

fn series_point(sample: &sample::Model) -> SeriesPoint {
    SeriesPoint {
        timestamp: sample.timestamp.clone(),
        utilization_percent: sample.utilization_percent,
        memory_used_mb: sample.memory_used_mb,
        memory_total_mb: sample.memory_total_mb,
        temperature_c: sample.temperature_c,
        power_usage_w: sample.power_usage_w,
        fan_speed_percent: sample.fan_speed_percent,
    }
}

fn process_row(row: &process_usage::Model) -> ProcessRow {
    ProcessRow {
        pid: row.pid,
        name: row.name.clone(),
        used_memory_mb: row.used_memory_mb,
    }
}
