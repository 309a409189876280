use sea_orm::{QueryOrder, QuerySelect, entity::prelude::*};
use serde::{Deserialize, Serialize};

/// Format of the `timestamp` column: second resolution, lexicographic order
/// equals chronological order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One measurement of one GPU at one instant. Rows are append-only; nothing
/// updates or deletes them outside of retention tooling.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "samples")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub device_index: i32,
    pub timestamp: String,

    pub utilization_percent: i32,
    pub memory_used_mb: i64,
    pub memory_total_mb: i64,
    pub temperature_c: i32,
    pub power_usage_w: f64,
    pub fan_speed_percent: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::process_usage::Entity")]
    ProcessUsage,
}

impl Related<super::process_usage::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ProcessUsage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Full-table read ordered by `(timestamp, id)` ascending. The secondary
    /// id ordering makes the "latest sample" of a device deterministic when
    /// two rows share a timestamp: the highest surrogate key wins.
    pub async fn find_all_ordered(db: &DbConn) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .order_by_asc(Column::Timestamp)
            .order_by_asc(Column::Id)
            .all(db)
            .await
    }

    /// Distinct device indexes that have at least one recorded sample,
    /// ascending.
    pub async fn device_indexes(db: &DbConn) -> Result<Vec<i32>, DbErr> {
        Entity::find()
            .select_only()
            .column(Column::DeviceIndex)
            .distinct()
            .order_by_asc(Column::DeviceIndex)
            .into_tuple::<i32>()
            .all(db)
            .await
    }
}
