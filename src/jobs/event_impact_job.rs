//! Event impact scoring job
//!
//! Job Schedule: every 30 minutes.
//!
//! Purpose and Distinction: backfills `event_impacts` for clusters that
//! are now old enough that every timeframe window they could affect has
//! fully elapsed, plus scores any forecast whose `expires_at_utc` has
//! passed and has no realized score yet. Keeping these on one tick
//! avoids the event-study and forecast-scoring passes drifting apart.
//!
//! Data Created: rows in `event_impacts` (`event_store::compute_realized_impact`)
//! and `forecast_scores` (`forecast_queries::insert_score`).
//!
//! Error Handling: a single cluster/target/timeframe combination or a
//! single expired forecast that fails to score does not abort the
//! sweep; failures accumulate into `items_failed`.
use chrono::{Duration, Utc};

use crate::errors::AppError;
use crate::models::market_forecast::{Target, Timeframe};
use crate::db::{event_queries, forecast_queries, price_bar_queries};
use crate::models::market_forecast::ForecastScore;
use crate::services::forecasting_engine::{score_expired, EXPIRED_FORECAST_REFERENCE_ASSET};
use crate::services::event_store;
use crate::services::job_scheduler_service::{JobContext, JobResult};

pub async fn run(ctx: JobContext) -> Result<JobResult, AppError> {
    let pool = ctx.pool.as_ref();
    let now = Utc::now();

    let mut processed = 0;
    let mut failed = 0;

    let since = now - Duration::hours(24);
    let rows = event_queries::fetch_recent(pool, since, 200).await?;
    for row in &rows {
        for target in Target::ALL {
            for tf in Timeframe::ALL {
                // Only backfill once the timeframe window has fully elapsed.
                if now - row.ts_utc < Duration::minutes(tf.minutes()) {
                    continue;
                }
                match event_store::compute_realized_impact(pool, &row.cluster_id, row.ts_utc, target, tf, 30).await {
                    Ok(Some(_)) => processed += 1,
                    Ok(None) => {}
                    Err(e) => {
                        failed += 1;
                        tracing::warn!("impact scoring failed for {}/{}/{}: {}", row.cluster_id, target.as_str(), tf.as_str(), e);
                    }
                }
            }
        }
    }

    match score_expired_forecasts(pool, now).await {
        Ok(n) => processed += n,
        Err(e) => {
            failed += 1;
            tracing::warn!("forecast scoring sweep failed: {}", e);
        }
    }

    Ok(JobResult { items_processed: processed, items_failed: failed })
}

async fn score_expired_forecasts(pool: &sqlx::PgPool, now: chrono::DateTime<Utc>) -> Result<i32, AppError> {
    let expired = forecast_queries::fetch_expired_unscored(pool, now).await?;
    let mut scored = 0;

    for row in expired {
        let Some(forecast) = row.clone().into_model() else { continue };
        let band = 0.0015;
        let start = price_bar_queries::fetch_window(
            pool,
            EXPIRED_FORECAST_REFERENCE_ASSET,
            forecast.ts_utc - Duration::minutes(5),
            forecast.ts_utc + Duration::minutes(5),
        )
        .await?;
        let end = price_bar_queries::fetch_window(
            pool,
            EXPIRED_FORECAST_REFERENCE_ASSET,
            forecast.expires_at_utc - Duration::minutes(5),
            forecast.expires_at_utc + Duration::minutes(5),
        )
        .await?;
        let (Some(start_bar), Some(end_bar)) = (start.first(), end.first()) else {
            continue;
        };

        let (realized_return, hit, brier) =
            score_expired(forecast.direction, forecast.confidence, start_bar.close, end_bar.close, band);

        forecast_queries::insert_score(
            pool,
            &ForecastScore {
                forecast_id: forecast.id,
                realized_return,
                hit,
                brier_component: brier,
                scored_at_utc: now,
            },
        )
        .await?;
        scored += 1;
    }

    Ok(scored)
}
