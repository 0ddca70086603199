//! Event persistence: cluster ingest, relevance-target mapping, and
//! realized event impact.
//!
//! Ported from `app/services/event_store.py` + `app/services/event_impact.py`.
use chrono::{DateTime, Duration, Utc};
use sha1::{Digest, Sha1};
use sqlx::PgPool;

use crate::db::{event_impact_queries, event_queries, price_bar_queries};
use crate::models::event::{EventCluster, EventImpact, SourceTier};
use crate::models::market_forecast::{Target, Timeframe};
use crate::models::news::{EventType, NewsItem, NewsScope};

/// `event_id` is the SHA-1 of the canonical URL when present, else of
/// `canonical_title + top 2 entities + domain` (spec.md §3 takes
/// precedence over the original's simpler `url`-or-`title::domain`
/// hash — see DESIGN.md).
pub fn event_id(item: &NewsItem) -> String {
    let mut hasher = Sha1::new();
    if !item.canonical_url.is_empty() {
        hasher.update(item.canonical_url.as_bytes());
    } else {
        hasher.update(item.title.as_bytes());
        for entity in item.entities.iter().take(2) {
            hasher.update(entity.as_bytes());
        }
        hasher.update(item.source_domain.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}

/// `_severity_score`, re-derived against spec.md's `EventType` enum
/// (DESIGN.md carries the mapping from the original's now-defunct
/// WAR/SANCTIONS/GEO_RISK string set).
pub fn severity_score(item: &NewsItem) -> f64 {
    match item.event_type {
        Some(EventType::SanctionsGeopolitics) | Some(EventType::EnergySupplyOpec) => 0.9,
        Some(EventType::RegulationLegal) | Some(EventType::CryptoMarketStructure) => 0.75,
        Some(EventType::EarningsGuidance) => 0.6,
        _ if item.tags.iter().any(|t| t == "ETF") => 0.55,
        _ => 0.45,
    }
}

fn source_tier_for(item: &NewsItem) -> SourceTier {
    match item.tier_score {
        t if t >= 1.0 => SourceTier::Primary,
        t if t >= 0.75 => SourceTier::Tier1,
        t if t >= 0.5 => SourceTier::Tier2,
        _ => SourceTier::Social,
    }
}

/// `_relevance_targets` — maps a NewsItem to a weighted set of targets.
/// Additive rules take the max when multiple fire; the defaults layer
/// guarantees all four primary targets are present with floor weights
/// (higher for MACRO/GEOPOLITICS/SYSTEMIC, lower for COMPANY).
pub fn relevance_targets(item: &NewsItem) -> Vec<(String, f64)> {
    let mut weights: std::collections::HashMap<String, f64> = std::collections::HashMap::new();
    let mut bump = |key: &str, weight: f64| {
        let entry = weights.entry(key.to_string()).or_insert(0.0);
        *entry = entry.max(weight);
    };

    let title_lower = item.title.to_lowercase();
    if title_lower.contains("bitcoin") || title_lower.contains("btc") {
        bump("BTC", 0.9);
    }
    if title_lower.contains("ethereum") || title_lower.contains("eth") {
        bump("ETH", 0.9);
    }
    if title_lower.contains("stablecoin") || title_lower.contains("usdt") || title_lower.contains("usdc") {
        bump("STABLES", 0.85);
    }
    if matches!(item.event_type, Some(EventType::CryptoMarketStructure)) {
        bump("ALTS", 0.6);
    }

    let scale = 0.85 + 0.15 * (item.scope_score as f64 / 100.0).max(item.max_sector_impact as f64 / 100.0);
    for (target, weight) in weights.iter_mut() {
        if target != "SCOPE" {
            *weight *= scale;
        }
    }

    if let Some(scope) = item.news_scope {
        bump(&format!("SCOPE:{}", scope_str(scope)), item.scope_score as f64 / 100.0);
    }
    for sector in &item.sector_impacts {
        bump(&format!("SECTOR:{}", sector.sector), sector.impact_score as f64 / 100.0);
    }

    let floor = match item.news_scope {
        Some(NewsScope::Macro) | Some(NewsScope::Geopolitics) | Some(NewsScope::Systemic) => 0.35,
        Some(NewsScope::Company) => 0.1,
        _ => 0.2,
    };
    for target in Target::ALL {
        bump(target.as_str(), floor);
    }

    weights.into_iter().collect()
}

fn scope_str(scope: NewsScope) -> &'static str {
    match scope {
        NewsScope::Macro => "MACRO",
        NewsScope::Geopolitics => "GEOPOLITICS",
        NewsScope::Company => "COMPANY",
        NewsScope::Sector => "SECTOR",
        NewsScope::Systemic => "SYSTEMIC",
        NewsScope::Unknown => "UNKNOWN",
    }
}

/// Build the persisted [`EventCluster`] for a scored NewsItem, ready to
/// upsert via `db::event_queries::upsert` + `upsert_targets`.
pub fn build_event_cluster(item: &NewsItem) -> (EventCluster, String) {
    let id = event_id(item);
    let targets = relevance_targets(item);
    let direction = item
        .person_event
        .as_ref()
        .map(|p| match p.expected_direction_short_term.as_str() {
            "UP" => 1i8,
            "DOWN" => -1,
            _ => 0,
        })
        .unwrap_or(0);

    let cluster = EventCluster {
        cluster_id: id.clone(),
        headline: item.title.clone(),
        ts_utc: item.published_at_utc.unwrap_or_else(Utc::now),
        source_tier: source_tier_for(item),
        tags: item.tags.clone(),
        credibility: item.tier_score,
        severity: severity_score(item),
        impact: item.final_rank_score,
        direction,
        targets,
    };
    (cluster, id)
}

/// Ingest a batch of scored news into the event store, gated by
/// `news_ingest_interval_minutes` at the caller level (job scheduler
/// tracks `last_ingest` in `kv_store`).
pub async fn ingest(pool: &PgPool, items: &[NewsItem]) -> Result<usize, sqlx::Error> {
    let mut count = 0;
    for item in items {
        let (cluster, dedup_hash) = build_event_cluster(item);
        event_queries::upsert(pool, &cluster, &dedup_hash).await?;
        event_queries::upsert_targets(pool, &cluster.cluster_id, &cluster.targets).await?;
        count += 1;
    }
    Ok(count)
}

pub async fn purge_retention(pool: &PgPool, retention_days: i64) -> Result<(), sqlx::Error> {
    let cutoff = Utc::now() - Duration::days(retention_days);
    sqlx::query("DELETE FROM events WHERE ts_utc < $1")
        .bind(cutoff)
        .execute(pool)
        .await?;
    Ok(())
}

/// σ_tf: standard deviation of non-overlapping `tf`-step returns over
/// `lookback_days`, minimum 20 samples, falling back to a 7-day window.
async fn historical_sigma(pool: &PgPool, asset: &str, tf: Timeframe, lookback_days: i64) -> Result<Option<f64>, sqlx::Error> {
    let now = Utc::now();
    let from = now - Duration::days(lookback_days);
    let bars = price_bar_queries::fetch_window(pool, asset, from, now).await?;
    if bars.len() < 2 {
        return Ok(None);
    }
    let step_minutes = tf.minutes();
    let returns = non_overlapping_step_returns(&bars, step_minutes);
    if returns.len() < 20 {
        let from_short = now - Duration::days(7);
        let bars_short = price_bar_queries::fetch_window(pool, asset, from_short, now).await?;
        let returns_short = non_overlapping_step_returns(&bars_short, step_minutes);
        return Ok(std_dev(&returns_short));
    }
    Ok(std_dev(&returns))
}

fn non_overlapping_step_returns(bars: &[crate::models::event::PriceBar], step_minutes: i64) -> Vec<f64> {
    let mut returns = Vec::new();
    let mut i = 0;
    while i + 1 < bars.len() {
        let t0 = bars[i].ts_utc;
        let target_ts = t0 + Duration::minutes(step_minutes);
        if let Some(j) = bars[i + 1..].iter().position(|b| b.ts_utc >= target_ts) {
            let j = i + 1 + j;
            if bars[i].close > 0.0 {
                returns.push((bars[j].close - bars[i].close) / bars[i].close);
            }
            i = j;
        } else {
            break;
        }
    }
    returns
}

fn std_dev(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Realized return/z-score for a cluster's effect on a target over a
/// timeframe: close at t0 and t0+tf_minutes, `realized_z = realized_ret / sigma`.
pub async fn compute_realized_impact(
    pool: &PgPool,
    cluster_id: &str,
    cluster_ts: DateTime<Utc>,
    target: Target,
    tf: Timeframe,
    lookback_days: i64,
) -> Result<Option<EventImpact>, sqlx::Error> {
    let asset = target.as_str();
    let bars = price_bar_queries::fetch_window(pool, asset, cluster_ts - Duration::minutes(5), cluster_ts + Duration::minutes(tf.minutes() + 10)).await?;
    let Some(t0_bar) = bars.iter().min_by_key(|b| (b.ts_utc - cluster_ts).num_seconds().abs()) else {
        return Ok(None);
    };
    let target_ts = cluster_ts + Duration::minutes(tf.minutes());
    let Some(t1_bar) = bars.iter().min_by_key(|b| (b.ts_utc - target_ts).num_seconds().abs()) else {
        return Ok(None);
    };

    if t0_bar.close <= 0.0 {
        return Ok(None);
    }
    let realized_ret = (t1_bar.close - t0_bar.close) / t0_bar.close;
    let sigma = historical_sigma(pool, asset, tf, lookback_days).await?;
    let realized_z = sigma.filter(|s| *s > 0.0).map(|s| realized_ret / s);

    let impact = EventImpact {
        cluster_id: cluster_id.to_string(),
        target,
        tf,
        realized_ret: Some(realized_ret),
        realized_z,
        computed_at: Utc::now(),
    };
    event_impact_queries::upsert(pool, &impact).await?;
    Ok(Some(impact))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> NewsItem {
        let mut item = NewsItem::new(
            "Bitcoin surges after ETF approval".to_string(),
            "https://example.com/btc-etf".to_string(),
            "example.com".to_string(),
        );
        item.event_type = Some(EventType::CryptoMarketStructure);
        item.scope_score = 60;
        item.max_sector_impact = 40;
        item.news_scope = Some(NewsScope::Sector);
        item
    }

    #[test]
    fn event_id_is_stable_for_same_url() {
        let item = sample_item();
        assert_eq!(event_id(&item), event_id(&item));
    }

    #[test]
    fn relevance_targets_always_include_primary_four() {
        let item = sample_item();
        let targets = relevance_targets(&item);
        for target in Target::ALL {
            assert!(targets.iter().any(|(t, _)| t == target.as_str()));
        }
    }

    #[test]
    fn severity_score_buckets_crypto_high() {
        let item = sample_item();
        assert_eq!(severity_score(&item), 0.75);
    }
}
