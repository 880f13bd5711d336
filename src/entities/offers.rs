//! `SeaORM` Entity for the offers table
//!
//! `status` holds one of the escrow status strings
//! (see `models::escrow::EscrowStatus`); every transition goes through a
//! conditional update on the expected current status, so two concurrent
//! transitions can never both win.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "offers")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub product_id: i32,
    pub buyer_id: i32,
    pub seller_id: i32,
    pub amount: Decimal,
    pub description: Option<String>,
    pub status: String,
    pub created_at: DateTimeWithTimeZone,
    /// Bumped on every status change; the abandonment window is measured
    /// from here (i.e. from entry into `in_escrow`).
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
