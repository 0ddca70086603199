//! Pipeline orchestrator types (spec.md §4/§6 component J): the request
//! shape for `/intel/run` and the `IntelResponse` envelope with its
//! content-addressed block hashes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::market_forecast::ForecastView;
use crate::models::news::{EventFeed, NewsItem};

#[derive(Debug, Clone, Deserialize)]
pub struct IntelRequest {
    pub timeframe: String,
    #[serde(rename = "newsTimespan")]
    pub news_timespan: String,
    #[serde(default)]
    pub watchlist: Vec<String>,
}

/// One content hash per response block, each a 16-hex-char prefix of a
/// sha256 over the block's canonical (sorted-key, compact, ASCII-only)
/// JSON encoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockHashes {
    pub market: String,
    pub leaders: String,
    pub top_news: String,
    pub eventfeed: String,
    pub flow: String,
    pub risk: String,
    pub derivatives: String,
    pub forecast: String,
    pub daily_equity_movers: String,
    pub debug: String,
}

impl BlockHashes {
    /// `(name, hash)` pairs in a fixed, stable order — used both to
    /// build the request's `changed_blocks` diff and to derive `etag`.
    pub fn pairs(&self) -> [(&'static str, &str); 10] {
        [
            ("market", &self.market),
            ("leaders", &self.leaders),
            ("top_news", &self.top_news),
            ("eventfeed", &self.eventfeed),
            ("flow", &self.flow),
            ("risk", &self.risk),
            ("derivatives", &self.derivatives),
            ("forecast", &self.forecast),
            ("daily_equity_movers", &self.daily_equity_movers),
            ("debug", &self.debug),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntelResponse {
    pub etag: String,
    pub block_hashes: BlockHashes,
    pub changed_blocks: Vec<String>,
    pub market: Value,
    pub leaders: Value,
    pub top_news: Vec<NewsItem>,
    pub eventfeed: EventFeed,
    pub flow: Value,
    pub risk: Value,
    pub derivatives: Value,
    pub forecast: Vec<ForecastView>,
    pub daily_equity_movers: Value,
    pub debug: Value,
    pub generated_at: DateTime<Utc>,
}
