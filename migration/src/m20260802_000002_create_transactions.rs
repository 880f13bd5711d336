//! Migration to create the transactions table
//!
//! The unique index on offer_id enforces at most one transaction per
//! offer at the storage layer, backing the duplicate-open guard.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(pk_auto(Transactions::Id))
                    .col(integer(Transactions::OfferId))
                    .col(string(Transactions::Reference))
                    .col(decimal(Transactions::Amount))
                    .col(decimal(Transactions::Charge))
                    .col(string(Transactions::Status))
                    .col(boolean(Transactions::IsPaid).default(false))
                    .col(string(Transactions::PaymentLink))
                    .col(timestamp_with_time_zone_null(Transactions::PaidAt))
                    .col(
                        timestamp_with_time_zone(Transactions::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Transactions::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("uq_transactions_offer")
                    .table(Transactions::Table)
                    .col(Transactions::OfferId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // The webhook looks transactions up by gateway reference
        manager
            .create_index(
                Index::create()
                    .name("uq_transactions_reference")
                    .table(Transactions::Table)
                    .col(Transactions::Reference)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Transactions {
    Table,
    Id,
    OfferId,
    Reference,
    Amount,
    Charge,
    Status,
    IsPaid,
    PaymentLink,
    PaidAt,
    CreatedAt,
    UpdatedAt,
}
