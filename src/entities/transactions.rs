//! `SeaORM` Entity for the transactions table
//!
//! One transaction per offer, created on entry to `in_escrow` and never
//! deleted. The unique index on `offer_id` backs the duplicate-open guard.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub offer_id: i32,
    /// Gateway reference, echoed back by the pay-confirmation webhook
    #[sea_orm(unique)]
    pub reference: String,
    /// Always equals the owning offer's amount
    pub amount: Decimal,
    /// Platform fee, deducted from the seller payout
    pub charge: Decimal,
    pub status: String,
    pub is_paid: bool,
    pub payment_link: String,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
