use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One compute process observed on a GPU, attributed to the sample it was
/// captured with. Created atomically with its parent sample, never orphaned.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "process_usages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    pub sample_id: i64,

    pub pid: i32,
    pub name: String,
    pub used_memory_mb: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::sample::Entity",
        from = "Column::SampleId",
        to = "super::sample::Column::Id"
    )]
    Sample,
}

impl Related<super::sample::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sample.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub async fn find_all(db: &DbConn) -> Result<Vec<Model>, DbErr> {
        Entity::find().all(db).await
    }

    pub async fn find_for_sample(db: &DbConn, sample_id: i64) -> Result<Vec<Model>, DbErr> {
        Entity::find()
            .filter(Column::SampleId.eq(sample_id))
            .all(db)
            .await
    }
}
