use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::market_forecast::{Target, Timeframe};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTier {
    Primary,
    Tier1,
    Tier2,
    Social,
}

impl SourceTier {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTier::Primary => "primary",
            SourceTier::Tier1 => "tier1",
            SourceTier::Tier2 => "tier2",
            SourceTier::Social => "social",
        }
    }

    /// `_tier_score` in `event_store.py`.
    pub fn score(self) -> f64 {
        match self {
            SourceTier::Primary => 1.0,
            SourceTier::Tier1 => 0.85,
            SourceTier::Tier2 => 0.65,
            SourceTier::Social => 0.4,
        }
    }
}

/// A persisted, scored news event (`events` row). Cluster IDs are
/// deterministic hashes of the canonical URL, or of
/// `canonical_title + top entities` when no URL survives dedup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventCluster {
    pub cluster_id: String,
    pub headline: String,
    pub ts_utc: DateTime<Utc>,
    pub source_tier: SourceTier,
    pub tags: Vec<String>,
    pub credibility: f64,
    pub severity: f64,
    /// 0..100
    pub impact: f64,
    pub direction: i8,
    /// asset-or-sector -> relevance in [0, 1]
    pub targets: Vec<(String, f64)>,
}

/// One row per `(asset, ts_utc)`, append-only (upsert by key).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceBar {
    pub asset: String,
    pub ts_utc: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Realized return/z-score for a cluster's effect on a target over a
/// timeframe, keyed by `(cluster_id, target, tf)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventImpact {
    pub cluster_id: String,
    pub target: Target,
    pub tf: Timeframe,
    pub realized_ret: Option<f64>,
    pub realized_z: Option<f64>,
    pub computed_at: DateTime<Utc>,
}

/// API-facing projection for `/events/latest`, with `realized_impacts`
/// joined in from `event_impact`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventClusterView {
    pub cluster_id: String,
    pub headline: String,
    pub ts_utc: DateTime<Utc>,
    pub source_tier: SourceTier,
    pub tags: Vec<String>,
    pub impact: f64,
    pub direction: i8,
    pub targets: Vec<(String, f64)>,
    pub realized_impacts: Vec<EventImpact>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventClusterResponse {
    pub clusters: Vec<EventClusterView>,
    pub notes: Vec<String>,
}
