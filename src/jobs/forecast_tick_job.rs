//! Forecast tick job
//!
//! Job Schedule: one run per timeframe, on a cadence equal to that
//! timeframe (M15 every 15 minutes, H1 hourly, H3 every 3 hours, H6
//! every 6 hours).
//!
//! Purpose and Distinction: recomputes the market+news composite score
//! for every `(timeframe, target)` pair and emits a new forecast row
//! when `forecasting_engine::should_emit` says the move is worth
//! surfacing. This is the periodic counterpart to the on-demand
//! forecast read path — it does the averaging, hysteresis, and
//! calibration work so a request handler never has to.
//!
//! Data Created: rows in `forecasts` via `forecast_queries::insert`.
//!
//! Processing Strategy: for each target, pull the active event clusters
//! from the last `3 * half_life` hours, fold them into a news signal,
//! combine with a market signal (derived from whatever `MarketSnapshot`s
//! the quote layer already cached), adaptively reweight the two against
//! recent calibration, apply hysteresis against the previous forecast,
//! then gate emission.
//!
//! Error Handling: a failure to score one target does not stop the
//! other targets in the same tick; failures are aggregated into
//! `items_failed`.
use chrono::{Duration, Utc};

use crate::errors::AppError;
use crate::models::event::{EventCluster, SourceTier};
use crate::models::market::MarketSnapshot;
use crate::models::market_forecast::{Target, Timeframe};
use crate::config::Settings;
use crate::db::{event_queries, forecast_queries};
use crate::services::forecasting_engine::{
    adaptive_weights, apply_hysteresis, build_forecast, calibrate_confidence, direction_for,
    market_signal, news_signal, should_emit, MarketSnapshotInputs,
};
use crate::services::job_scheduler_service::{JobContext, JobResult};
use crate::services::quote_router::QuoteRouter;

/// Keys `market_signal` can derive a feature from; fetched once per tick
/// and shared across all four targets via `QuoteRouter::patch_snapshot`.
const MARKET_SNAPSHOT_KEYS: &[&str] = &["dxy", "qqq", "oil", "vix", "btc"];

async fn fetch_market_snapshots(router: &QuoteRouter) -> Vec<MarketSnapshot> {
    let now = Utc::now();
    router
        .patch_snapshot(MARKET_SNAPSHOT_KEYS)
        .await
        .into_iter()
        .map(|(target, price, change)| MarketSnapshot {
            target,
            ts_utc: now,
            price,
            change_pct_24h: change.map(|(_, pct)| pct),
            volume_24h: None,
            market_cap: None,
            source: "quote_router".to_string(),
        })
        .collect()
}

fn cluster_from_row(row: &event_queries::RawEventRow) -> EventCluster {
    EventCluster {
        cluster_id: row.cluster_id.clone(),
        headline: row.headline.clone(),
        ts_utc: row.ts_utc,
        source_tier: row.source_tier(),
        tags: Vec::new(),
        credibility: row.credibility,
        severity: row.severity,
        impact: row.impact,
        direction: row.direction as i8,
        targets: Vec::new(),
    }
}

fn source_tier_score(tier: SourceTier) -> f64 {
    tier.score()
}

/// Runs one forecast tick for every `Target` at a single `Timeframe`.
pub async fn run(ctx: JobContext, tf: Timeframe) -> Result<JobResult, AppError> {
    let settings = Settings::from_env();
    let now = Utc::now();
    let half_life = settings.impact_half_life_hours;

    let since = now - Duration::hours((3.0 * half_life).ceil() as i64);
    let rows = event_queries::fetch_recent(ctx.pool.as_ref(), since, 500).await?;
    let clusters: Vec<(EventCluster, f64)> = rows
        .iter()
        .map(cluster_from_row)
        .map(|c| {
            let relevance = source_tier_score(c.source_tier);
            (c, relevance)
        })
        .collect();

    let market_snapshots = fetch_market_snapshots(ctx.quote_router.as_ref()).await;
    let market_inputs = MarketSnapshotInputs::from_snapshots(&market_snapshots);

    let mut processed = 0;
    let mut failed = 0;

    for target in Target::ALL {
        match tick_one(ctx.pool.as_ref(), &settings, tf, target, &clusters, &market_inputs, now).await {
            Ok(emitted) => {
                if emitted {
                    processed += 1;
                }
            }
            Err(e) => {
                failed += 1;
                tracing::warn!("forecast tick failed for {}/{}: {}", tf.as_str(), target.as_str(), e);
            }
        }
    }

    Ok(JobResult { items_processed: processed, items_failed: failed })
}

async fn tick_one(
    pool: &sqlx::PgPool,
    settings: &Settings,
    tf: Timeframe,
    target: Target,
    clusters: &[(EventCluster, f64)],
    market_inputs: &MarketSnapshotInputs,
    now: chrono::DateTime<Utc>,
) -> Result<bool, AppError> {
    let (market_raw, market_contrib) = market_signal(target, market_inputs);
    let (news_raw, news_contrib) = news_signal(target, clusters, settings.impact_half_life_hours, now);

    let since = now - Duration::days(7);
    let scores = forecast_queries::fetch_scores_since(pool, tf, since).await?;
    let recent_brier = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().map(|s| s.brier_component).sum::<f64>() / scores.len() as f64)
    };
    let recent_hit_rate = if scores.is_empty() {
        None
    } else {
        Some(scores.iter().filter(|s| s.hit).count() as f64 / scores.len() as f64)
    };

    let (w_market, w_news) = adaptive_weights(0.5, 0.5, recent_brier, recent_hit_rate);
    let proposed_raw = (w_market * market_raw + w_news * news_raw).clamp(-1.0, 1.0);
    let proposed_direction = direction_for(proposed_raw, settings.neutral_band_pct());

    let previous = forecast_queries::fetch_latest(pool, tf, target)
        .await?
        .and_then(|row| row.clone().into_model().map(|f| (f.direction, row.raw_score, row.ts_utc)));

    let min_hold = settings.min_hold_minutes_for(tf.as_str());
    let major_event = clusters.iter().any(|(c, _)| c.impact >= 70.0);
    let (direction, raw_score) =
        apply_hysteresis(proposed_direction, proposed_raw, previous, now, min_hold, 0.15, major_event);

    let history: Vec<(f64, bool)> = scores.iter().map(|s| (s.realized_return, s.hit)).collect();
    let confidence = calibrate_confidence(raw_score, 0.5, &history);

    if !should_emit(previous, direction, confidence, now, tf.minutes()) {
        return Ok(false);
    }

    let forecast = build_forecast(settings, tf, target, raw_score, confidence, market_contrib, news_contrib, now);
    forecast_queries::insert(pool, &forecast).await?;
    Ok(true)
}
