//! Migration to create the job_status table for background-job bookkeeping

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(JobStatus::Table)
                    .if_not_exists()
                    .col(pk_auto(JobStatus::Id))
                    .col(string_uniq(JobStatus::JobName))
                    .col(timestamp_null(JobStatus::LastRunAt))
                    .col(timestamp_null(JobStatus::LastSuccessAt))
                    .col(string_null(JobStatus::LastError))
                    .col(big_integer(JobStatus::RunCount).default(0))
                    .col(big_integer(JobStatus::ErrorCount).default(0))
                    .col(integer(JobStatus::MinIntervalSecs).default(600))
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(JobStatus::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum JobStatus {
    Table,
    Id,
    JobName,
    LastRunAt,
    LastSuccessAt,
    LastError,
    RunCount,
    ErrorCount,
    MinIntervalSecs,
}
