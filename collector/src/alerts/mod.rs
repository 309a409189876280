//! Threshold alerting.
//!
//! The sampling loop talks to a sink through [`AlertSink`]; delivery is
//! best-effort and every failure is swallowed and logged by the caller.

pub mod email;

use async_trait::async_trait;
use db::models::sample::TIMESTAMP_FORMAT;
use thiserror::Error;

use crate::telemetry::DeviceSnapshot;

pub use email::SmtpAlertSink;

#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert transport not configured: {0}")]
    Config(String),
    #[error("invalid alert address: {0}")]
    Address(String),
    #[error("smtp delivery failed: {0}")]
    Smtp(String),
}

/// A notification channel invoked on threshold breach.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn notify(&self, subject: &str, body: &str) -> Result<(), AlertError>;
}

/// Builds the subject/body pair for a temperature breach.
pub fn temperature_alert(snapshot: &DeviceSnapshot) -> (String, String) {
    let subject = "GPU Temperature Alert".to_string();
    let body = format!(
        "GPU {} temperature is {}°C\n\
         Utilization: {}%\n\
         Memory: {}/{} MB\n\
         Time: {}",
        snapshot.device_index,
        snapshot.temperature_c,
        snapshot.utilization_percent,
        snapshot.memory_used_mb,
        snapshot.memory_total_mb,
        snapshot.timestamp.format(TIMESTAMP_FORMAT),
    );
    (subject, body)
}
