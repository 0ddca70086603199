use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "3h")]
    H3,
    #[serde(rename = "6h")]
    H6,
}

impl Timeframe {
    pub const ALL: [Timeframe; 4] = [Timeframe::M15, Timeframe::H1, Timeframe::H3, Timeframe::H6];

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H3 => "3h",
            Timeframe::H6 => "6h",
        }
    }

    pub fn minutes(self) -> i64 {
        match self {
            Timeframe::M15 => 15,
            Timeframe::H1 => 60,
            Timeframe::H3 => 180,
            Timeframe::H6 => 360,
        }
    }

    pub fn from_str_opt(s: &str) -> Option<Timeframe> {
        match s {
            "15m" => Some(Timeframe::M15),
            "1h" => Some(Timeframe::H1),
            "3h" => Some(Timeframe::H3),
            "6h" => Some(Timeframe::H6),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Target {
    Btc,
    Eth,
    Alts,
    Stables,
}

impl Target {
    pub const ALL: [Target; 4] = [Target::Btc, Target::Eth, Target::Alts, Target::Stables];

    pub fn as_str(self) -> &'static str {
        match self {
            Target::Btc => "BTC",
            Target::Eth => "ETH",
            Target::Alts => "ALTS",
            Target::Stables => "STABLES",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    Up,
    Down,
    Neutral,
}

/// A directional, per-(timeframe, target) forecast, emitted under
/// hysteresis by `services::forecasting_engine`. Immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub id: String,
    pub ts_utc: DateTime<Utc>,
    pub tf: Timeframe,
    pub target: Target,
    pub direction: Direction,
    /// Pre-calibration fused score in [-1, 1]. Used by hysteresis
    /// comparisons against the previous forecast for the pair.
    pub raw_score: f64,
    /// Calibrated confidence in [min_confidence, 0.95].
    pub confidence: f64,
    pub expires_at_utc: DateTime<Utc>,
    pub drivers: Value,
    pub rationale_text: String,
}

/// Appended exactly once per forecast, when `expires_at_utc <= now` and a
/// reference price exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastScore {
    pub forecast_id: String,
    pub realized_return: f64,
    pub hit: bool,
    pub brier_component: f64,
    pub scored_at_utc: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReliabilityBucket {
    pub bucket_low: f64,
    pub bucket_high: f64,
    pub predicted_mean: f64,
    pub observed_hit_rate: f64,
    pub count: u32,
}

/// Per-timeframe backtest metrics exposed to `/forecasts/metrics`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub tf: Timeframe,
    pub hit_rate_24h: Option<f64>,
    pub hit_rate_7d: Option<f64>,
    pub brier_24h: Option<f64>,
    pub brier_7d: Option<f64>,
    pub flip_rate_7d: Option<f64>,
    pub coverage_24h: Option<f64>,
    pub reliability_7d: Vec<ReliabilityBucket>,
    pub mean_calibration_error_7d: Option<f64>,
}

/// A driver-list entry recorded for explainability (market-signal feature
/// contributions and the top-3 news clusters by |contribution|).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub name: String,
    pub value: f64,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsClusterContribution {
    pub cluster_id: String,
    pub headline: String,
    pub contribution: f64,
    pub tags: Vec<String>,
}

/// The API-facing projection served from `/forecasts/latest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastView {
    pub tf: Timeframe,
    pub target: Target,
    pub direction: Direction,
    pub confidence: f64,
    pub ts_utc: DateTime<Utc>,
    pub expires_at_utc: DateTime<Utc>,
    pub rationale_text: String,
    pub drivers: Value,
}
