use crate::errors::AppError;
use crate::external::price_provider::PriceProvider;
use crate::jobs::{event_impact_job, forecast_tick_job, news_ingest_job, retention_purge_job};
use crate::models::market_forecast::Timeframe;
use crate::services::failure_cache::FailureCache;
use crate::services::quote_router::QuoteRouter;
use crate::services::rate_limiter::RateLimiter;
use sqlx::PgPool;
use tokio_cron_scheduler::{JobScheduler, Job};
use tracing::{info, error};
use chrono::Utc;
use std::sync::Arc;

// Context passed to job functions
#[derive(Clone)]
pub struct JobContext {
    pub pool: Arc<PgPool>,
    pub price_provider: Arc<dyn PriceProvider>,
    pub failure_cache: Arc<FailureCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub quote_router: Arc<QuoteRouter>,
}

pub struct JobSchedulerService {
    scheduler: JobScheduler,
    context: JobContext,
}

impl JobSchedulerService {
    pub async fn new(
        pool: Arc<PgPool>,
        price_provider: Arc<dyn PriceProvider>,
        failure_cache: Arc<FailureCache>,
        rate_limiter: Arc<RateLimiter>,
        quote_router: Arc<QuoteRouter>,
    ) -> Result<Self, AppError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::External(format!("Failed to create scheduler: {}", e)))?;

        let context = JobContext {
            pool,
            price_provider,
            failure_cache,
            rate_limiter,
            quote_router,
        };

        Ok(Self {
            scheduler,
            context,
        })
    }

    /// Start all scheduled jobs
    pub async fn start(&mut self) -> Result<(), AppError> {
        info!("🚀 Starting job scheduler...");

        // Check if we're in test mode (runs jobs every minute for testing)
        let test_mode = std::env::var("JOB_SCHEDULER_TEST_MODE")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        if test_mode {
            info!("⚠️  JOB SCHEDULER IN TEST MODE - Jobs will run every minute!");
        }

        let news_ingest_schedule = if test_mode { "0 */2 * * * *" } else { "0 */15 * * * *" };
        let news_ingest_desc = if test_mode { "Every 2 minutes (TEST MODE)" } else { "Every 15 minutes" };

        self.schedule_job(
            news_ingest_schedule,
            "news_ingest",
            news_ingest_desc,
            |ctx| news_ingest_job::run(ctx),
        ).await?;

        // One forecast tick per timeframe, cadenced to that timeframe's own window.
        self.schedule_job(
            "0 */15 * * * *",
            "forecast_tick_15m",
            "Every 15 minutes",
            |ctx| forecast_tick_job::run(ctx, Timeframe::M15),
        ).await?;

        self.schedule_job(
            "0 5 * * * *",
            "forecast_tick_1h",
            "Every hour at :05",
            |ctx| forecast_tick_job::run(ctx, Timeframe::H1),
        ).await?;

        self.schedule_job(
            "0 10 */3 * * *",
            "forecast_tick_3h",
            "Every 3 hours at :10",
            |ctx| forecast_tick_job::run(ctx, Timeframe::H3),
        ).await?;

        self.schedule_job(
            "0 15 */6 * * *",
            "forecast_tick_6h",
            "Every 6 hours at :15",
            |ctx| forecast_tick_job::run(ctx, Timeframe::H6),
        ).await?;

        // Event impact + forecast scoring sweep
        self.schedule_job(
            "0 */30 * * * *",
            "event_impact_sweep",
            "Every 30 minutes",
            |ctx| event_impact_job::run(ctx),
        ).await?;

        // Weekly retention purge (SUN = Sunday)
        let retention_schedule = if test_mode { "0 */3 * * * *" } else { "0 0 3 * * SUN" };
        let retention_desc = if test_mode { "Every 3 minutes (TEST MODE)" } else { "Every Sunday at 3:00 AM" };

        self.schedule_job(
            retention_schedule,
            "retention_purge",
            retention_desc,
            |ctx| retention_purge_job::run(ctx),
        ).await?;

        // Start the scheduler
        self.scheduler.start()
            .await
            .map_err(|e| AppError::External(format!("Failed to start scheduler: {}", e)))?;

        info!("✅ Job scheduler started successfully with 6 jobs");
        Ok(())
    }

    /// Stop the scheduler gracefully
    #[allow(dead_code)]
    pub async fn stop(&mut self) -> Result<(), AppError> {
        info!("🛑 Stopping job scheduler...");
        self.scheduler.shutdown()
            .await
            .map_err(|e| AppError::External(format!("Failed to stop scheduler: {}", e)))?;
        info!("✅ Job scheduler stopped");
        Ok(())
    }

    /// Helper to schedule a job with tracking
    async fn schedule_job<F, Fut>(
        &mut self,
        schedule: &str,
        job_name: &'static str,
        description: &str,
        job_fn: F,
    ) -> Result<(), AppError>
    where
        F: Fn(JobContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<JobResult, AppError>> + Send + 'static,
    {
        let context = self.context.clone();
        let job_fn = Arc::new(job_fn);

        let job = Job::new_async(schedule, move |_uuid, _l| {
            let context = context.clone();
            let job_fn = job_fn.clone();
            Box::pin(async move {
                execute_job_with_tracking(&context.pool, job_name, context.clone(), job_fn).await;
            })
        })
        .map_err(|e| AppError::External(format!("Failed to create job {}: {}", job_name, e)))?;

        self.scheduler.add(job)
            .await
            .map_err(|e| AppError::External(format!("Failed to add job {}: {}", job_name, e)))?;

        info!("📅 Scheduled: {} - {} [cron: {}]", job_name, description, schedule);
        Ok(())
    }
}

// Job tracking wrapper
async fn execute_job_with_tracking<F, Fut>(
    pool: &PgPool,
    job_name: &str,
    context: JobContext,
    job_fn: Arc<F>,
) where
    F: Fn(JobContext) -> Fut,
    Fut: std::future::Future<Output = Result<JobResult, AppError>>,
{
    info!("🏃 Starting job: {}", job_name);
    let started_at = Utc::now();

    // Record job start
    let job_id = match record_job_start(pool, job_name).await {
        Ok(id) => id,
        Err(e) => {
            error!("Failed to record job start: {}", e);
            return;
        }
    };

    // Execute job
    let result = job_fn(context).await;

    let duration_ms = (Utc::now() - started_at).num_milliseconds();

    // Record job completion
    match result {
        Ok(job_result) => {
            info!(
                "✅ Job completed: {} (processed: {}, failed: {}, duration: {}ms)",
                job_name, job_result.items_processed, job_result.items_failed, duration_ms
            );

            if let Err(e) = record_job_success(
                pool,
                job_id,
                job_result.items_processed,
                job_result.items_failed,
                duration_ms,
            ).await {
                error!("Failed to record job success: {}", e);
            }
        }
        Err(e) => {
            error!("❌ Job failed: {} - {}", job_name, e);

            if let Err(e) = record_job_failure(pool, job_id, &e.to_string(), duration_ms).await {
                error!("Failed to record job failure: {}", e);
            }
        }
    }
}

#[derive(Debug)]
pub struct JobResult {
    pub items_processed: i32,
    pub items_failed: i32,
}

// Database functions for job tracking
async fn record_job_start(pool: &PgPool, job_name: &str) -> Result<i32, AppError> {
    let row = sqlx::query!(
        r#"
        INSERT INTO job_runs (job_name, status)
        VALUES ($1, 'running'::job_status)
        RETURNING id
        "#,
        job_name
    )
    .fetch_one(pool)
    .await?;

    Ok(row.id)
}

async fn record_job_success(
    pool: &PgPool,
    job_id: i32,
    items_processed: i32,
    items_failed: i32,
    duration_ms: i64,
) -> Result<(), AppError> {
    sqlx::query!(
        r#"
        UPDATE job_runs
        SET completed_at = NOW(),
            status = 'success'::job_status,
            items_processed = $2,
            items_failed = $3,
            duration_ms = $4
        WHERE id = $1
        "#,
        job_id,
        items_processed,
        items_failed,
        duration_ms
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn record_job_failure(
    pool: &PgPool,
    job_id: i32,
    error_message: &str,
    duration_ms: i64,
) -> Result<(), AppError> {
    sqlx::query!(
        r#"
        UPDATE job_runs
        SET completed_at = NOW(),
            status = 'failed'::job_status,
            error_message = $2,
            duration_ms = $3
        WHERE id = $1
        "#,
        job_id,
        error_message,
        duration_ms
    )
    .execute(pool)
    .await?;

    Ok(())
}


