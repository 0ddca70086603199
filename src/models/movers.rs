//! Daily equity-movers panel (spec.md §6 `/intel/run` response's
//! `block_hashes.daily_equity_movers` key). Grounded on
//! `app/engine/movers.py::build_daily_equity_movers` — trimmed to the
//! fields `services::movers` can derive from this crate's [`EventItem`]
//! (the original also carries a `crypto_outlook` panel fed by raw
//! CoinGecko/Yahoo deltas, which is out of scope here since the
//! watchlist-driven `EventFeed` has no equivalent crypto-dominance
//! source).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MoverDirection {
    Up,
    Down,
    Neutral,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyEquityMoverEvidence {
    pub event_id: String,
    pub category: crate::models::news::EventCategory,
    pub confidence: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyEquityMoverItem {
    pub ticker: String,
    pub expected_direction: MoverDirection,
    pub expected_move_band_pct: f64,
    pub move_score: u8,
    pub confidence: u8,
    pub catalysts: Vec<String>,
    pub evidence: Vec<DailyEquityMoverEvidence>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyEquityMoversDebug {
    pub candidates_seen: u32,
    pub dropped_non_us: u32,
    pub reason_if_empty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyEquityMovers {
    pub asof: chrono::DateTime<chrono::Utc>,
    pub items: Vec<DailyEquityMoverItem>,
    pub debug: DailyEquityMoversDebug,
}
