//! News ingestion job
//!
//! Job Schedule: every `news_ingest_interval_minutes` (config, default
//! from `Settings::from_env`).
//!
//! Purpose and Distinction: would pull fresh articles from whichever
//! `NewsSearchProvider` is configured, score them through
//! `news_engine::fetch_news` / `event_store::build_event_cluster`, and
//! upsert the resulting clusters. The wire format of any concrete news
//! search provider is intentionally out of scope here (only the
//! `NewsSearchProvider` contract is), so this job is a structural
//! placeholder until a provider is wired into `JobContext` — mirrors
//! `warm_popular_caches` in the same scheduler, which is an intentional
//! no-op until its target caches exist.
use crate::errors::AppError;
use crate::services::job_scheduler_service::{JobContext, JobResult};

pub async fn run(_ctx: JobContext) -> Result<JobResult, AppError> {
    tracing::info!("news ingestion tick skipped: no NewsSearchProvider configured");
    Ok(JobResult { items_processed: 0, items_failed: 0 })
}
