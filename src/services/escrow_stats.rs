//! Escrow activity counters for the admin dashboard
//!
//! One grouped count over the offers table, cached briefly so dashboard
//! polling stays off the database.

use moka::future::Cache;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, FromQueryResult, QuerySelect,
};
use std::sync::Arc;
use std::time::Duration;

use crate::entities::{offers, prelude::Offers};
use crate::models::admin::EscrowStatsResponse;

const STATS_KEY: &str = "escrow_stats";

#[derive(Debug, FromQueryResult)]
struct StatusCount {
    status: String,
    count: i64,
}

#[derive(Clone)]
pub struct EscrowStatsService {
    cache: Arc<Cache<&'static str, EscrowStatsResponse>>,
}

impl EscrowStatsService {
    pub fn new(ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(1)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();
        Self {
            cache: Arc::new(cache),
        }
    }

    pub async fn get_stats(
        &self,
        db: &DatabaseConnection,
    ) -> Result<EscrowStatsResponse, DbErr> {
        if let Some(cached) = self.cache.get(&STATS_KEY).await {
            tracing::debug!("Escrow stats cache hit");
            return Ok(cached);
        }

        let counts: Vec<(String, i64)> = Offers::find()
            .select_only()
            .column(offers::Column::Status)
            .column_as(offers::Column::Id.count(), "count")
            .group_by(offers::Column::Status)
            .into_model::<StatusCount>()
            .all(db)
            .await?
            .into_iter()
            .map(|row| (row.status, row.count))
            .collect();

        let stats = EscrowStatsResponse::from_counts(&counts);
        self.cache.insert(STATS_KEY, stats.clone()).await;
        Ok(stats)
    }
}
