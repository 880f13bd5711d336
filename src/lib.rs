// src/lib.rs

use sea_orm::DatabaseConnection;
use services::{
    escrow::EscrowService, escrow_stats::EscrowStatsService, payments::PaymentGatewayService,
};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub escrow: EscrowService,
    pub payments: PaymentGatewayService,
    pub stats: EscrowStatsService,
    pub admin_api_key: String,
}

pub mod entities {
    pub mod prelude;
    pub mod job_status;
    pub mod offers;
    pub mod products;
    pub mod transactions;
    pub mod users;
}

pub mod services {
    pub mod escrow;
    pub mod escrow_stats;
    pub mod job_status;
    pub mod payments;
}

pub mod handlers;
pub mod jobs;
pub mod models;
