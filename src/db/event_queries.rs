use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::models::event::{EventCluster, SourceTier};

/// `events(event_id PK, ts_utc, source, source_tier, headline, body, url,
/// tags_json, dedup_hash, cluster_id, credibility, severity, impact,
/// event_type, category, direction)`.
pub async fn upsert(pool: &PgPool, event: &EventCluster, dedup_hash: &str) -> Result<(), sqlx::Error> {
    let tags_json = Value::from(event.tags.clone());
    sqlx::query(
        "INSERT INTO events (event_id, ts_utc, headline, source_tier, tags_json, dedup_hash,
                              cluster_id, credibility, severity, impact, direction)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
         ON CONFLICT (event_id) DO UPDATE SET
            credibility = EXCLUDED.credibility,
            severity = EXCLUDED.severity,
            impact = EXCLUDED.impact,
            direction = EXCLUDED.direction",
    )
    .bind(&event.cluster_id)
    .bind(event.ts_utc)
    .bind(&event.headline)
    .bind(event.source_tier.as_str())
    .bind(tags_json)
    .bind(dedup_hash)
    .bind(&event.cluster_id)
    .bind(event.credibility)
    .bind(event.severity)
    .bind(event.impact)
    .bind(event.direction as i16)
    .execute(pool)
    .await?;
    Ok(())
}

/// `event_asset_map(event_id, asset_or_sector, relevance_score)`, unique
/// on the pair.
pub async fn upsert_targets(pool: &PgPool, event_id: &str, targets: &[(String, f64)]) -> Result<(), sqlx::Error> {
    for (asset_or_sector, relevance) in targets {
        sqlx::query(
            "INSERT INTO event_asset_map (event_id, asset_or_sector, relevance_score)
             VALUES ($1, $2, $3)
             ON CONFLICT (event_id, asset_or_sector) DO UPDATE SET relevance_score = EXCLUDED.relevance_score",
        )
        .bind(event_id)
        .bind(asset_or_sector)
        .bind(relevance)
        .execute(pool)
        .await?;
    }
    Ok(())
}

pub async fn fetch_recent(pool: &PgPool, since: DateTime<Utc>, limit: i64) -> Result<Vec<RawEventRow>, sqlx::Error> {
    sqlx::query_as::<_, RawEventRow>(
        "SELECT event_id, ts_utc, headline, source_tier, dedup_hash, cluster_id,
                credibility, severity, impact, direction
         FROM events
         WHERE ts_utc >= $1
         ORDER BY ts_utc DESC
         LIMIT $2",
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RawEventRow {
    pub event_id: String,
    pub ts_utc: DateTime<Utc>,
    pub headline: String,
    pub source_tier: String,
    pub dedup_hash: String,
    pub cluster_id: String,
    pub credibility: f64,
    pub severity: f64,
    pub impact: f64,
    pub direction: i16,
}

impl RawEventRow {
    pub fn source_tier(&self) -> SourceTier {
        match self.source_tier.as_str() {
            "primary" => SourceTier::Primary,
            "tier1" => SourceTier::Tier1,
            "tier2" => SourceTier::Tier2,
            _ => SourceTier::Social,
        }
    }
}
