//! Durable persistence of device snapshots.
//!
//! Each snapshot becomes one `samples` row plus its `process_usages` rows,
//! written inside a single transaction so a process row can never exist
//! without its parent sample.

use db::models::sample::TIMESTAMP_FORMAT;
use db::models::{process_usage, sample};
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, TransactionTrait};

use crate::telemetry::DeviceSnapshot;

/// Appends the snapshots of one poll cycle, returning the assigned sample
/// ids in snapshot order. The transaction boundary is per snapshot; an error
/// rolls back the snapshot being written and leaves earlier ones durable.
pub async fn append_snapshots(
    db: &DatabaseConnection,
    snapshots: &[DeviceSnapshot],
) -> Result<Vec<i64>, DbErr> {
    let mut sample_ids = Vec::with_capacity(snapshots.len());

    for snapshot in snapshots {
        let txn = db.begin().await?;

        let inserted = sample::ActiveModel {
            device_index: Set(snapshot.device_index as i32),
            timestamp: Set(snapshot.timestamp.format(TIMESTAMP_FORMAT).to_string()),
            utilization_percent: Set(snapshot.utilization_percent),
            memory_used_mb: Set(snapshot.memory_used_mb),
            memory_total_mb: Set(snapshot.memory_total_mb),
            temperature_c: Set(snapshot.temperature_c),
            power_usage_w: Set(snapshot.power_usage_w),
            fan_speed_percent: Set(snapshot.fan_speed_percent),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        for process in &snapshot.processes {
            process_usage::ActiveModel {
                sample_id: Set(inserted.id),
                pid: Set(process.pid),
                name: Set(process.name.clone()),
                used_memory_mb: Set(process.used_memory_mb),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
        }

        txn.commit().await?;
        sample_ids.push(inserted.id);
    }

    Ok(sample_ids)
}
