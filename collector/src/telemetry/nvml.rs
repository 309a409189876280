//! NVML-backed telemetry source.
//!
//! NVML calls are blocking, so each poll runs on the blocking pool. The
//! library handle is initialized lazily on the first poll; a host without a
//! driver keeps retrying every cycle instead of failing startup.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Local;
use nvml_wrapper::Nvml;
use nvml_wrapper::enum_wrappers::device::TemperatureSensor;
use nvml_wrapper::enums::device::UsedGpuMemory;
use once_cell::sync::OnceCell;
use sysinfo::{Pid, System};
use tracing::debug;

use super::{DeviceSnapshot, ProcessSample, TelemetryError, TelemetrySource};

const BYTES_PER_MB: u64 = 1024 * 1024;

pub struct NvmlSource {
    nvml: Arc<OnceCell<Nvml>>,
    process_table: Arc<Mutex<System>>,
}

impl NvmlSource {
    pub fn new() -> Self {
        Self {
            nvml: Arc::new(OnceCell::new()),
            process_table: Arc::new(Mutex::new(System::new())),
        }
    }
}

impl Default for NvmlSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TelemetrySource for NvmlSource {
    async fn poll(&self) -> Result<Vec<DeviceSnapshot>, TelemetryError> {
        let nvml = Arc::clone(&self.nvml);
        let process_table = Arc::clone(&self.process_table);

        tokio::task::spawn_blocking(move || poll_devices(&nvml, &process_table))
            .await
            .map_err(|e| TelemetryError::Unavailable(format!("poll task aborted: {e}")))?
    }

    fn name(&self) -> &'static str {
        "nvml"
    }
}

fn poll_devices(
    cell: &OnceCell<Nvml>,
    process_table: &Mutex<System>,
) -> Result<Vec<DeviceSnapshot>, TelemetryError> {
    let nvml = cell
        .get_or_try_init(Nvml::init)
        .map_err(|e| TelemetryError::Unavailable(format!("NVML init failed: {e}")))?;

    let device_count = nvml
        .device_count()
        .map_err(|e| TelemetryError::Unavailable(format!("device enumeration failed: {e}")))?;

    let mut process_table = process_table
        .lock()
        .expect("process table lock poisoned");
    process_table.refresh_processes();

    let mut snapshots = Vec::with_capacity(device_count as usize);
    for device_index in 0..device_count {
        let device = nvml.device_by_index(device_index).map_err(|e| {
            TelemetryError::Unavailable(format!("device {device_index} unavailable: {e}"))
        })?;

        let utilization = device
            .utilization_rates()
            .map_err(|e| metric_error(device_index, "utilization", e))?;
        let memory = device
            .memory_info()
            .map_err(|e| metric_error(device_index, "memory", e))?;
        let temperature = device
            .temperature(TemperatureSensor::Gpu)
            .map_err(|e| metric_error(device_index, "temperature", e))?;
        let power_usage_w = device
            .power_usage()
            .map_err(|e| metric_error(device_index, "power", e))? as f64
            / 1000.0;
        // Passively cooled datacenter boards report no fan at all.
        let fan_speed_percent = device.fan_speed(0).unwrap_or(0);

        // Fail-soft: a device whose process list is unavailable (driver or
        // permission error) still yields a sample, just with no processes.
        let processes = match device.running_compute_processes() {
            Ok(list) => list
                .into_iter()
                .map(|p| ProcessSample {
                    pid: p.pid as i32,
                    name: resolve_name(&process_table, p.pid),
                    used_memory_mb: match p.used_gpu_memory {
                        UsedGpuMemory::Used(bytes) => (bytes / BYTES_PER_MB) as i64,
                        UsedGpuMemory::Unavailable => 0,
                    },
                })
                .collect(),
            Err(e) => {
                debug!("process enumeration failed for GPU {device_index}: {e}");
                Vec::new()
            }
        };

        snapshots.push(
            DeviceSnapshot {
                device_index,
                timestamp: Local::now().naive_local(),
                utilization_percent: utilization.gpu as i32,
                memory_used_mb: (memory.used / BYTES_PER_MB) as i64,
                memory_total_mb: (memory.total / BYTES_PER_MB) as i64,
                temperature_c: temperature as i32,
                power_usage_w,
                fan_speed_percent: fan_speed_percent as i32,
                processes,
            }
            .sanitized(),
        );
    }

    Ok(snapshots)
}

fn resolve_name(process_table: &System, pid: u32) -> String {
    process_table
        .process(Pid::from_u32(pid))
        .map(|p| p.name().to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn metric_error(device_index: u32, metric: &str, e: nvml_wrapper::error::NvmlError) -> TelemetryError {
    TelemetryError::Unavailable(format!("{metric} read failed for GPU {device_index}: {e}"))
}
