use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Generic envelope every provider adapter returns (§2 component A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub latency_ms: u64,
    pub error: Option<String>,
    pub degraded: bool,
    pub cache_hit: bool,
}

impl<T> ProviderResult<T> {
    pub fn ok(data: T, latency_ms: u64) -> Self {
        Self {
            ok: true,
            data: Some(data),
            latency_ms,
            error: None,
            degraded: false,
            cache_hit: false,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            latency_ms: 0,
            error: Some(error.into()),
            degraded: false,
            cache_hit: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteMeta {
    pub source: String,
    pub is_fallback: bool,
    pub freshness_seconds: i64,
    pub degraded_mode: bool,
}

/// A single resolved quote. `price`/`change_pct` can be absent when the
/// router falls back to an empty last-good-less response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub price: Option<f64>,
    pub change_pct: Option<f64>,
    pub ts_utc: DateTime<Utc>,
    pub currency: Option<String>,
    pub meta: QuoteMeta,
}
