//! Migration to create the offers table
//!
//! `status` holds the escrow status string; transitions are applied as
//! conditional updates on the expected current value.

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Offers::Table)
                    .if_not_exists()
                    .col(pk_auto(Offers::Id))
                    .col(integer(Offers::ProductId))
                    .col(integer(Offers::BuyerId))
                    .col(integer(Offers::SellerId))
                    .col(decimal(Offers::Amount))
                    .col(text_null(Offers::Description))
                    .col(string(Offers::Status))
                    .col(
                        timestamp_with_time_zone(Offers::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Offers::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Scoped listing always filters on one of the two parties
        manager
            .create_index(
                Index::create()
                    .name("idx_offers_buyer")
                    .table(Offers::Table)
                    .col(Offers::BuyerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_offers_seller")
                    .table(Offers::Table)
                    .col(Offers::SellerId)
                    .to_owned(),
            )
            .await?;

        // The abandonment sweep scans by (status, updated_at)
        manager
            .create_index(
                Index::create()
                    .name("idx_offers_status_updated_at")
                    .table(Offers::Table)
                    .col(Offers::Status)
                    .col(Offers::UpdatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Offers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Offers {
    Table,
    Id,
    ProductId,
    BuyerId,
    SellerId,
    Amount,
    Description,
    Status,
    CreatedAt,
    UpdatedAt,
}
