//! Background-job bookkeeping
//!
//! Records when each background job last ran and whether it succeeded,
//! and gates re-runs behind a minimum interval so a restart (or a second
//! instance) does not produce extra effective runs. The jobs themselves
//! are idempotent; this keeps them cheap and observable.

use chrono::{Duration, Utc};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};

use crate::entities::job_status::{self, Entity as JobStatus};

/// Job names tracked in the job_status table
pub mod jobs {
    pub const ABANDONMENT_SWEEP: &str = "abandonment_sweep";
}

/// Whether `job_name` is due, i.e. it has never run or its last run is at
/// least its minimum interval ago.
pub async fn should_run(
    db: &DatabaseConnection,
    job_name: &str,
    default_interval_secs: i32,
) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
    let record = JobStatus::find()
        .filter(job_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    let Some(record) = record else {
        tracing::info!("[{}] First run", job_name);
        return Ok(true);
    };

    let min_interval = if record.min_interval_secs > 0 {
        record.min_interval_secs
    } else {
        default_interval_secs
    };

    match record.last_run_at {
        None => Ok(true),
        Some(last_run) => {
            let elapsed = Utc::now().naive_utc().signed_duration_since(last_run);
            let due = elapsed >= Duration::seconds(min_interval as i64);
            if !due {
                tracing::debug!(
                    "[{}] Skipping run, last was {}s ago (min {}s)",
                    job_name,
                    elapsed.num_seconds(),
                    min_interval
                );
            }
            Ok(due)
        }
    }
}

/// Record a completed run
pub async fn record_success(
    db: &DatabaseConnection,
    job_name: &str,
    default_interval_secs: i32,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = Utc::now().naive_utc();
    let existing = JobStatus::find()
        .filter(job_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    match existing {
        Some(record) => {
            let run_count = record.run_count + 1;
            let mut active: job_status::ActiveModel = record.into();
            active.last_run_at = Set(Some(now));
            active.last_success_at = Set(Some(now));
            active.last_error = Set(None);
            active.run_count = Set(run_count);
            active.update(db).await?;
        }
        None => {
            job_status::ActiveModel {
                job_name: Set(job_name.to_string()),
                last_run_at: Set(Some(now)),
                last_success_at: Set(Some(now)),
                last_error: Set(None),
                run_count: Set(1),
                error_count: Set(0),
                min_interval_secs: Set(default_interval_secs),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    Ok(())
}

/// Record a failed run; the error message is kept for the next operator
/// who asks why the sweep stopped
pub async fn record_failure(
    db: &DatabaseConnection,
    job_name: &str,
    error: &str,
    default_interval_secs: i32,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let now = Utc::now().naive_utc();
    let existing = JobStatus::find()
        .filter(job_status::Column::JobName.eq(job_name))
        .one(db)
        .await?;

    match existing {
        Some(record) => {
            let error_count = record.error_count + 1;
            let run_count = record.run_count + 1;
            let mut active: job_status::ActiveModel = record.into();
            active.last_run_at = Set(Some(now));
            active.last_error = Set(Some(error.to_string()));
            active.run_count = Set(run_count);
            active.error_count = Set(error_count);
            active.update(db).await?;
        }
        None => {
            job_status::ActiveModel {
                job_name: Set(job_name.to_string()),
                last_run_at: Set(Some(now)),
                last_success_at: Set(None),
                last_error: Set(Some(error.to_string())),
                run_count: Set(1),
                error_count: Set(1),
                min_interval_secs: Set(default_interval_secs),
                ..Default::default()
            }
            .insert(db)
            .await?;
        }
    }

    Ok(())
}
