use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum Samples {
    Table,
    Id,
    DeviceIndex,
    Timestamp,
    UtilizationPercent,
    MemoryUsedMb,
    MemoryTotalMb,
    TemperatureC,
    PowerUsageW,
    FanSpeedPercent,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202607140001_create_samples"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Samples::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Samples::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Samples::DeviceIndex)
                            .integer()
                            .not_null(),
                    )
                    // "YYYY-MM-DD HH:MM:SS", second resolution
                    .col(ColumnDef::new(Samples::Timestamp).text().not_null())
                    .col(
                        ColumnDef::new(Samples::UtilizationPercent)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Samples::MemoryUsedMb)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Samples::MemoryTotalMb)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Samples::TemperatureC)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Samples::PowerUsageW).double().not_null())
                    .col(
                        ColumnDef::new(Samples::FanSpeedPercent)
                            .integer()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_samples_device_timestamp")
                    .table(Samples::Table)
                    .col(Samples::DeviceIndex)
                    .col(Samples::Timestamp)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Samples::Table).to_owned())
            .await
    }
}
