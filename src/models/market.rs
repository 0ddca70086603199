use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Raw CoinGecko `/simple/price` response slice for one coin id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoinGeckoSnapshot {
    pub id: String,
    pub usd: f64,
    pub usd_24h_change: Option<f64>,
    pub usd_24h_vol: Option<f64>,
    pub usd_market_cap: Option<f64>,
}

/// Raw Yahoo Finance quote slice used for equity/index reference series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooSnapshot {
    pub symbol: String,
    pub regular_market_price: f64,
    pub regular_market_change_percent: Option<f64>,
    pub regular_market_volume: Option<f64>,
}

/// Normalized cross-source market snapshot the market-signal stage of
/// `services::forecasting_engine` computes features from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub target: String,
    pub ts_utc: DateTime<Utc>,
    pub price: f64,
    pub change_pct_24h: Option<f64>,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub source: String,
}
