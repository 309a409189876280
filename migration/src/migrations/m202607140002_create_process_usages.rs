use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum ProcessUsages {
    Table,
    Id,
    SampleId,
    Pid,
    Name,
    UsedMemoryMb,
}

#[derive(DeriveIden)]
enum Samples {
    Table,
    Id,
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m202607140002_create_process_usages"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ProcessUsages::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ProcessUsages::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(ProcessUsages::SampleId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(ProcessUsages::Pid).integer().not_null())
                    .col(ColumnDef::new(ProcessUsages::Name).text().not_null())
                    .col(
                        ColumnDef::new(ProcessUsages::UsedMemoryMb)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_process_usages_sample_id")
                            .from(ProcessUsages::Table, ProcessUsages::SampleId)
                            .to(Samples::Table, Samples::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_process_usages_sample_id")
                    .table(ProcessUsages::Table)
                    .col(ProcessUsages::SampleId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ProcessUsages::Table).to_owned())
            .await
    }
}
