//! Telemetry sources and the snapshot value types they produce.
//!
//! A source answers one question: "what are the current stats for every
//! device?". The NVML-backed source talks to the real driver; the mock source
//! synthesizes plausible data so the rest of the pipeline can run anywhere.

pub mod mock;
pub mod nvml;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use mock::MockSource;
pub use nvml::NvmlSource;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The source could not be polled at all this cycle. The sampling loop
    /// skips the cycle and retries on the next one.
    #[error("telemetry source unavailable: {0}")]
    Unavailable(String),
}

/// One compute process observed on a device during a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: i32,
    pub name: String,
    pub used_memory_mb: i64,
}

/// Everything measured for one device at one instant, including its running
/// compute processes. Field names match both the persisted columns and the
/// JSON-lines audit shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub device_index: u32,
    #[serde(with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    pub utilization_percent: i32,
    pub memory_used_mb: i64,
    pub memory_total_mb: i64,
    pub temperature_c: i32,
    pub power_usage_w: f64,
    pub fan_speed_percent: i32,
    pub processes: Vec<ProcessSample>,
}

impl DeviceSnapshot {
    /// Boundary validation: percentages are clamped to 0..=100 before a
    /// snapshot leaves the source.
    pub fn sanitized(mut self) -> Self {
        self.utilization_percent = self.utilization_percent.clamp(0, 100);
        self.fan_speed_percent = self.fan_speed_percent.clamp(0, 100);
        self
    }
}

/// Serializes timestamps as `YYYY-MM-DD HH:MM:SS`, the same text shape the
/// store persists.
pub mod timestamp_format {
    use chrono::NaiveDateTime;
    use db::models::sample::TIMESTAMP_FORMAT;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.format(TIMESTAMP_FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        NaiveDateTime::parse_from_str(&raw, TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

/// A pollable provider of device snapshots.
///
/// Implementations fail soft where they can: a device whose process list is
/// unavailable reports an empty list rather than failing the poll. Only a
/// wholesale failure (driver gone, enumeration error) surfaces as
/// [`TelemetryError`].
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn poll(&self) -> Result<Vec<DeviceSnapshot>, TelemetryError>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn snapshot() -> DeviceSnapshot {
        DeviceSnapshot {
            device_index: 0,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            utilization_percent: 50,
            memory_used_mb: 1000,
            memory_total_mb: 16384,
            temperature_c: 70,
            power_usage_w: 150.0,
            fan_speed_percent: 60,
            processes: vec![ProcessSample {
                pid: 123,
                name: "x".into(),
                used_memory_mb: 500,
            }],
        }
    }

    #[test]
    fn sanitized_clamps_percentages() {
        let mut out_of_range = snapshot();
        out_of_range.utilization_percent = 130;
        out_of_range.fan_speed_percent = -5;

        let clean = out_of_range.sanitized();
        assert_eq!(clean.utilization_percent, 100);
        assert_eq!(clean.fan_speed_percent, 0);
    }

    #[test]
    fn snapshot_serializes_with_text_timestamp() {
        let value = serde_json::to_value(snapshot()).unwrap();
        assert_eq!(value["timestamp"], "2024-01-01 00:00:00");
        assert_eq!(value["processes"][0]["pid"], 123);

        let back: DeviceSnapshot = serde_json::from_value(value).unwrap();
        assert_eq!(back, snapshot());
    }
}
