//! Abandonment sweep
//!
//! The only automatic transition in the escrow lifecycle: offers that sat
//! in `in_escrow` past the abandonment window without a payment are moved
//! to `abandoned`. The sweep is a single conditional UPDATE, so re-running
//! it is a no-op and a buyer paying at the same moment simply wins or
//! loses the usual check-and-set race.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use sea_orm::DatabaseConnection;
use tokio::time::interval;

use crate::services::escrow::{EscrowError, EscrowService};
use crate::services::job_status::{self, jobs};

pub async fn start_abandonment_sweep_job(
    db: DatabaseConnection,
    escrow: EscrowService,
    window_hours: i64,
    interval_secs: u64,
) {
    tokio::spawn(async move {
        let mut ticker = interval(std::time::Duration::from_secs(interval_secs));

        loop {
            ticker.tick().await;

            match job_status::should_run(&db, jobs::ABANDONMENT_SWEEP, interval_secs as i32).await
            {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    tracing::error!("Failed to check sweep schedule: {}", e);
                    continue;
                }
            }

            match run_sweep(&db, &escrow, window_hours).await {
                Ok(swept) => {
                    if swept > 0 {
                        tracing::info!(swept, "Abandonment sweep moved offers out of escrow");
                    }
                    if let Err(e) =
                        job_status::record_success(&db, jobs::ABANDONMENT_SWEEP, interval_secs as i32)
                            .await
                    {
                        tracing::error!("Failed to record sweep success: {}", e);
                    }
                }
                Err(e) => {
                    tracing::error!("Abandonment sweep failed: {}", e);
                    if let Err(e) = job_status::record_failure(
                        &db,
                        jobs::ABANDONMENT_SWEEP,
                        &e.to_string(),
                        interval_secs as i32,
                    )
                    .await
                    {
                        tracing::error!("Failed to record sweep failure: {}", e);
                    }
                }
            }
        }
    });
}

async fn run_sweep(
    db: &DatabaseConnection,
    escrow: &EscrowService,
    window_hours: i64,
) -> Result<u64, EscrowError> {
    let cutoff = cutoff_for(Utc::now().fixed_offset(), window_hours);
    escrow.abandon_stale(db, cutoff).await
}

/// Offers whose last status change predates this are considered unpaid
/// for good
fn cutoff_for(now: DateTime<FixedOffset>, window_hours: i64) -> DateTime<FixedOffset> {
    now - Duration::hours(window_hours)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutoff_is_window_before_now() {
        let now = DateTime::parse_from_rfc3339("2026-08-04T12:00:00Z").unwrap();
        let cutoff = cutoff_for(now, 72);
        assert_eq!(
            cutoff,
            DateTime::parse_from_rfc3339("2026-08-01T12:00:00Z").unwrap()
        );
    }
}
