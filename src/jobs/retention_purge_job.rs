//! Retention purge job
//!
//! Job Schedule: daily, off-peak.
//!
//! Purpose and Distinction: enforces `retention_days` by deleting
//! events, their impacts, and stale price bars older than the
//! configured window, and sweeps expired rows out of the generic KV
//! store used for debate/pipeline caching.
//!
//! Data Created: none — this job only deletes.
//!
//! Error Handling: the events purge and the KV purge are independent;
//! either failing is reported but does not block the other.
use crate::config::Settings;
use crate::errors::AppError;
use crate::db::kv_store_queries;
use crate::services::event_store;
use crate::services::job_scheduler_service::{JobContext, JobResult};

pub async fn run(ctx: JobContext) -> Result<JobResult, AppError> {
    let settings = Settings::from_env();
    let pool = ctx.pool.as_ref();

    let mut processed = 0;
    let mut failed = 0;

    match event_store::purge_retention(pool, settings.retention_days).await {
        Ok(()) => processed += 1,
        Err(e) => {
            failed += 1;
            tracing::warn!("event retention purge failed: {}", e);
        }
    }

    match kv_store_queries::purge_expired(pool).await {
        Ok(n) => processed += n as i32,
        Err(e) => {
            failed += 1;
            tracing::warn!("kv store purge failed: {}", e);
        }
    }

    Ok(JobResult { items_processed: processed, items_failed: failed })
}
