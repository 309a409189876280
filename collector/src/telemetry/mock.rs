//! Synthetic telemetry source for development and demos.
//!
//! Generates bounded-random metrics for a fixed set of fake devices, shaped
//! like real workstation readings. Fan speed tracks temperature, and a small
//! pool of plausible process names comes and goes between polls.

use async_trait::async_trait;
use chrono::Local;
use rand::Rng;

use super::{DeviceSnapshot, ProcessSample, TelemetryError, TelemetrySource};

const PROCESS_POOL: &[(&str, i64)] = &[
    ("python.exe", 1200),
    ("blender.exe", 2500),
    ("stable_diffusion.py", 6000),
    ("ollama", 4500),
];

pub struct MockSource {
    device_count: u32,
}

impl MockSource {
    /// Picks the simulated device count (1 to 4) once; it stays stable for the
    /// process lifetime, like a physical machine.
    pub fn new() -> Self {
        Self {
            device_count: rand::thread_rng().gen_range(1..=4),
        }
    }

    pub fn with_device_count(device_count: u32) -> Self {
        Self { device_count }
    }
}

impl Default for MockSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySource for MockSource {
    async fn poll(&self) -> Result<Vec<DeviceSnapshot>, TelemetryError> {
        let mut rng = rand::thread_rng();
        let mut snapshots = Vec::with_capacity(self.device_count as usize);

        for device_index in 0..self.device_count {
            let memory_total_mb: i64 = if device_index % 2 == 0 { 16384 } else { 24576 };
            let memory_used_mb =
                rng.gen_range((memory_total_mb / 5)..=(memory_total_mb * 9 / 10));
            let temperature_c = rng.gen_range(55..=88);
            // Fan ramps with temperature, floored at idle speed.
            let fan_speed_percent = (((temperature_c - 30) as f64) * 1.5) as i32;

            let mut processes = Vec::new();
            if rng.gen_bool(0.7) {
                for _ in 0..rng.gen_range(1..=2) {
                    let (name, base_mb) = PROCESS_POOL[rng.gen_range(0..PROCESS_POOL.len())];
                    processes.push(ProcessSample {
                        pid: rng.gen_range(1000..=20000),
                        name: name.to_string(),
                        used_memory_mb: rng.gen_range(base_mb - 500..=base_mb + 500),
                    });
                }
            }

            snapshots.push(
                DeviceSnapshot {
                    device_index,
                    timestamp: Local::now().naive_local(),
                    utilization_percent: rng.gen_range(30..=95),
                    memory_used_mb,
                    memory_total_mb,
                    temperature_c,
                    power_usage_w: rng.gen_range(120.0..350.0),
                    fan_speed_percent: fan_speed_percent.max(20),
                    processes,
                }
                .sanitized(),
            );
        }

        Ok(snapshots)
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn poll_respects_configured_device_count() {
        let source = MockSource::with_device_count(3);
        let snapshots = source.poll().await.unwrap();

        assert_eq!(snapshots.len(), 3);
        let indexes: Vec<u32> = snapshots.iter().map(|s| s.device_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn generated_metrics_stay_in_bounds() {
        let source = MockSource::with_device_count(4);
        for _ in 0..50 {
            for snapshot in source.poll().await.unwrap() {
                assert!((0..=100).contains(&snapshot.utilization_percent));
                assert!((20..=100).contains(&snapshot.fan_speed_percent));
                assert!((55..=88).contains(&snapshot.temperature_c));
                assert!(snapshot.power_usage_w >= 120.0 && snapshot.power_usage_w < 350.0);
                assert!(snapshot.memory_used_mb <= snapshot.memory_total_mb);
                assert!(snapshot.processes.len() <= 2);
                for process in &snapshot.processes {
                    assert!(process.used_memory_mb >= 0);
                    assert!(!process.name.is_empty());
                }
            }
        }
    }

    #[test]
    fn randomized_device_count_stays_in_range() {
        for _ in 0..20 {
            let source = MockSource::new();
            assert!((1..=4).contains(&source.device_count));
        }
    }
}
