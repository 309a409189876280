//! The sampling loop.
//!
//! Drives the telemetry source on a fixed cadence and fans each cycle's
//! snapshots out to the store, the audit trail, the in-memory history
//! windows, and the alert sink. Every failure past the poll itself is
//! non-fatal: the cycle finishes with whatever stages still work, and the
//! next cycle starts fresh. The interval is measured from the end of one
//! cycle, so a slow poll drifts instead of bursting to catch up.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{info, warn};

use crate::alerts::{self, AlertSink};
use crate::audit::AuditLog;
use crate::store;
use crate::telemetry::{DeviceSnapshot, TelemetrySource};
use db::models::sample::TIMESTAMP_FORMAT;

/// Bounded ring of the most recent snapshots for one device, kept for live
/// plotting without re-querying the store. Reconstructable from the store;
/// discarded on exit.
#[derive(Debug)]
pub struct DeviceHistoryWindow {
    capacity: usize,
    entries: VecDeque<DeviceSnapshot>,
}

impl DeviceHistoryWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    /// Appends a snapshot, evicting the oldest entries beyond capacity.
    pub fn push(&mut self, snapshot: DeviceSnapshot) {
        self.entries.push_back(snapshot);
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshots in arrival order, oldest first.
    pub fn snapshots(&self) -> impl Iterator<Item = &DeviceSnapshot> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&DeviceSnapshot> {
        self.entries.back()
    }
}

#[derive(Debug, Clone)]
pub struct SamplerSettings {
    pub interval: Duration,
    pub poll_timeout: Duration,
    pub temp_alert_threshold_c: i32,
    pub history_window_size: usize,
}

pub struct Sampler {
    db: DatabaseConnection,
    source: Box<dyn TelemetrySource>,
    sink: Option<Arc<dyn AlertSink>>,
    audit: Option<AuditLog>,
    windows: HashMap<u32, DeviceHistoryWindow>,
    settings: SamplerSettings,
}

impl Sampler {
    pub fn new(
        db: DatabaseConnection,
        source: Box<dyn TelemetrySource>,
        sink: Option<Arc<dyn AlertSink>>,
        audit: Option<AuditLog>,
        settings: SamplerSettings,
    ) -> Self {
        Self {
            db,
            source,
            sink,
            audit,
            windows: HashMap::new(),
            settings,
        }
    }

    /// Runs cycles until the shutdown flag flips. The flag is checked between
    /// cycles only; an in-flight cycle always completes (its writes are
    /// already atomic), so stopping never leaves partial rows behind.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "sampling loop started: {:?} interval, window size {}, alert threshold {}°C",
            self.settings.interval,
            self.settings.history_window_size,
            self.settings.temp_alert_threshold_c,
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            self.run_cycle().await;

            tokio::select! {
                _ = tokio::time::sleep(self.settings.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("sampling loop stopped");
    }

    /// One POLL → PERSIST → AUDIT → UPDATE_WINDOW → ALERT_CHECK pass.
    pub async fn run_cycle(&mut self) {
        let snapshots = match timeout(self.settings.poll_timeout, self.source.poll()).await {
            Err(_) => {
                warn!(
                    "telemetry poll exceeded {:?}, skipping cycle",
                    self.settings.poll_timeout
                );
                return;
            }
            Ok(Err(e)) => {
                warn!("telemetry poll failed, skipping cycle: {e}");
                return;
            }
            Ok(Ok(snapshots)) => snapshots,
        };

        if let Err(e) = store::append_snapshots(&self.db, &snapshots).await {
            warn!("failed to persist {} snapshot(s): {e}", snapshots.len());
        }

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.append(&snapshots) {
                warn!("audit log write failed: {e}");
            }
        }

        for snapshot in &snapshots {
            log_status(snapshot);
            self.windows
                .entry(snapshot.device_index)
                .or_insert_with(|| DeviceHistoryWindow::new(self.settings.history_window_size))
                .push(snapshot.clone());
        }

        self.check_alerts(&snapshots).await;
    }

    async fn check_alerts(&self, snapshots: &[DeviceSnapshot]) {
        let Some(sink) = &self.sink else { return };

        for snapshot in snapshots {
            if snapshot.temperature_c < self.settings.temp_alert_threshold_c {
                continue;
            }
            let (subject, body) = alerts::temperature_alert(snapshot);
            match sink.notify(&subject, &body).await {
                Ok(()) => info!(
                    "temperature alert sent for GPU {} ({}°C)",
                    snapshot.device_index, snapshot.temperature_c
                ),
                Err(e) => warn!(
                    "temperature alert for GPU {} failed: {e}",
                    snapshot.device_index
                ),
            }
        }
    }

    /// The live-plotting window for a device, if it has seen samples.
    pub fn window(&self, device_index: u32) -> Option<&DeviceHistoryWindow> {
        self.windows.get(&device_index)
    }
}

fn log_status(snapshot: &DeviceSnapshot) {
    info!(
        "[{}] GPU {} | util {}% | mem {}/{} MB | {}°C | fan {}% | {:.1} W | {} process(es)",
        snapshot.timestamp.format(TIMESTAMP_FORMAT),
        snapshot.device_index,
        snapshot.utilization_percent,
        snapshot.memory_used_mb,
        snapshot.memory_total_mb,
        snapshot.temperature_c,
        snapshot.fan_speed_percent,
        snapshot.power_usage_w,
        snapshot.processes.len(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertError;
    use crate::telemetry::{ProcessSample, TelemetryError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    fn snapshot(device_index: u32, temperature_c: i32, second: u32) -> DeviceSnapshot {
        DeviceSnapshot {
            device_index,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(0, 0, second)
                .unwrap(),
            utilization_percent: 50,
            memory_used_mb: 1000,
            memory_total_mb: 16384,
            temperature_c,
            power_usage_w: 150.0,
            fan_speed_percent: 60,
            processes: vec![ProcessSample {
                pid: 123,
                name: "x".into(),
                used_memory_mb: 500,
            }],
        }
    }

    struct StaticSource {
        snapshots: Vec<DeviceSnapshot>,
    }

    #[async_trait]
    impl TelemetrySource for StaticSource {
        async fn poll(&self) -> Result<Vec<DeviceSnapshot>, TelemetryError> {
            Ok(self.snapshots.clone())
        }

        fn name(&self) -> &'static str {
            "static"
        }
    }

    struct FailingSource;

    #[async_trait]
    impl TelemetrySource for FailingSource {
        async fn poll(&self) -> Result<Vec<DeviceSnapshot>, TelemetryError> {
            Err(TelemetryError::Unavailable("driver gone".into()))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        notifications: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn notify(&self, subject: &str, body: &str) -> Result<(), AlertError> {
            self.notifications
                .lock()
                .unwrap()
                .push((subject.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn settings() -> SamplerSettings {
        SamplerSettings {
            interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(1),
            temp_alert_threshold_c: 80,
            history_window_size: 20,
        }
    }

    #[test]
    fn window_never_exceeds_capacity_and_keeps_the_newest() {
        let mut window = DeviceHistoryWindow::new(3);
        for second in 0..8 {
            window.push(snapshot(0, 70, second));
        }

        assert_eq!(window.len(), 3);
        let seconds: Vec<u32> = window
            .snapshots()
            .map(|s| s.timestamp.format("%S").to_string().parse().unwrap())
            .collect();
        assert_eq!(seconds, vec![5, 6, 7]);
        assert_eq!(
            window.latest().unwrap().timestamp.format("%S").to_string(),
            "07"
        );
    }

    #[tokio::test]
    async fn persist_failure_still_updates_windows_and_alerts() {
        // No migrations: every append fails like a locked or missing store.
        let db = sea_orm::Database::connect("sqlite::memory:").await.unwrap();
        let sink = Arc::new(RecordingSink::default());

        let mut sampler = Sampler::new(
            db,
            Box::new(StaticSource {
                snapshots: vec![snapshot(0, 85, 0)],
            }),
            Some(sink.clone()),
            None,
            settings(),
        );

        sampler.run_cycle().await;
        assert_eq!(sampler.window(0).unwrap().len(), 1);
        assert_eq!(sink.notifications.lock().unwrap().len(), 1);

        // Cycle K+1 still runs.
        sampler.run_cycle().await;
        assert_eq!(sampler.window(0).unwrap().len(), 2);
        assert_eq!(sink.notifications.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn alerts_fire_only_at_or_above_threshold() {
        let db = db::test_utils::setup_test_db().await;
        let sink = Arc::new(RecordingSink::default());

        let mut sampler = Sampler::new(
            db,
            Box::new(StaticSource {
                snapshots: vec![snapshot(0, 85, 0), snapshot(1, 79, 0)],
            }),
            Some(sink.clone()),
            None,
            settings(),
        );

        sampler.run_cycle().await;

        let notifications = sink.notifications.lock().unwrap();
        assert_eq!(notifications.len(), 1);
        assert!(notifications[0].1.contains("GPU 0 temperature is 85°C"));
    }

    #[tokio::test]
    async fn source_failure_skips_the_whole_cycle() {
        let db = db::test_utils::setup_test_db().await;
        let sink = Arc::new(RecordingSink::default());

        let mut sampler = Sampler::new(
            db.clone(),
            Box::new(FailingSource),
            Some(sink.clone()),
            None,
            settings(),
        );

        sampler.run_cycle().await;

        assert!(sampler.window(0).is_none());
        assert!(sink.notifications.lock().unwrap().is_empty());
        assert!(
            db::models::sample::Model::find_all_ordered(&db)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn cycle_persists_and_windows_each_device() {
        let db = db::test_utils::setup_test_db().await;

        let mut sampler = Sampler::new(
            db.clone(),
            Box::new(StaticSource {
                snapshots: vec![snapshot(0, 70, 0), snapshot(1, 72, 0)],
            }),
            None,
            None,
            settings(),
        );

        sampler.run_cycle().await;

        assert_eq!(sampler.window(0).unwrap().len(), 1);
        assert_eq!(sampler.window(1).unwrap().len(), 1);
        let rows = db::models::sample::Model::find_all_ordered(&db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[tokio::test]
    async fn run_exits_when_shutdown_flag_flips() {
        let db = db::test_utils::setup_test_db().await;
        let sampler = Sampler::new(
            db,
            Box::new(StaticSource { snapshots: vec![] }),
            None,
            None,
            settings(),
        );

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn(sampler.run(rx));

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("sampler did not stop")
            .unwrap();
    }
}
