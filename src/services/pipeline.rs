//! Pipeline orchestrator (spec.md §4 overview row J / §6 `/intel/run`):
//! providers → market snapshot → news → events → forecasts →
//! portfolio-ready data, with a content-addressed `etag` and per-block
//! hashes so callers can diff against their previous response.
//!
//! Ported from `app/services/pipeline.py`. Component boundaries mirror
//! spec.md §2's table: this module only sequences calls into
//! `news_engine`, `event_store`, `forecasting_engine` and
//! `portfolio_engine` — it owns no business logic of its own beyond the
//! block-hash bookkeeping. The previous-response cache used to compute
//! `changed_blocks` is an explicitly-scoped `DashMap` owned by the
//! orchestrator instance, the same pattern as `quote_router.rs` and
//! `debate_engine.rs` (spec.md §9 "ambient module-level caches").

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::models::market_forecast::ForecastView;
use crate::models::news::{EventFeed, NewsItem};
use crate::models::pipeline::{BlockHashes, IntelRequest, IntelResponse};

/// Re-encodes a JSON value with sorted keys (the default for
/// `serde_json::Value`'s internal `BTreeMap` when the `preserve_order`
/// feature is off), compact separators, and every non-ASCII codepoint
/// `\uXXXX`-escaped, so the hash is stable across platforms and
/// locales.
fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    let compact = serde_json::to_string(value).unwrap_or_default();
    let mut ascii = String::with_capacity(compact.len());
    for ch in compact.chars() {
        if ch.is_ascii() {
            ascii.push(ch);
        } else {
            let mut buf = [0u16; 2];
            for unit in ch.encode_utf16(&mut buf) {
                ascii.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    ascii.into_bytes()
}

/// Truncated (16 hex char) sha256 of a block's canonical encoding.
/// Matches the truncation `debate_engine` uses for `context_hash`.
pub fn hash_block<T: Serialize>(value: &T) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_bytes(value));
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

fn cache_key(req: &IntelRequest) -> String {
    let mut watchlist = req.watchlist.clone();
    watchlist.sort();
    format!("{}:{}:{}", req.timeframe, req.news_timespan, watchlist.join(","))
}

/// Everything a single orchestrator run needs, already computed by the
/// caller from `news_engine`/`event_store`/`forecasting_engine`/
/// `portfolio_engine`. The orchestrator's own job starts at hashing.
pub struct RunInputs {
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
}

pub struct PipelineOrchestrator {
    previous_hashes: DashMap<String, BlockHashes>,
}

impl PipelineOrchestrator {
    pub fn new() -> Self {
        Self { previous_hashes: DashMap::new() }
    }

    /// Hashes every block, compares against the previous run for the
    /// same `(timeframe, newsTimespan, watchlist)` key, and assembles
    /// the `IntelResponse` envelope. Running this twice on identical
    /// `RunInputs` yields an identical `etag` and identical
    /// `block_hashes` (spec.md §8 idempotence property).
    pub fn assemble(&self, req: &IntelRequest, inputs: RunInputs) -> IntelResponse {
        let block_hashes = BlockHashes {
            market: hash_block(&inputs.market),
            leaders: hash_block(&inputs.leaders),
            top_news: hash_block(&inputs.top_news),
            eventfeed: hash_block(&inputs.eventfeed),
            flow: hash_block(&inputs.flow),
            risk: hash_block(&inputs.risk),
            derivatives: hash_block(&inputs.derivatives),
            forecast: hash_block(&inputs.forecast),
            daily_equity_movers: hash_block(&inputs.daily_equity_movers),
            debug: hash_block(&inputs.debug),
        };

        let key = cache_key(req);
        let changed_blocks = match self.previous_hashes.get(&key) {
            Some(prev) => block_hashes
                .pairs()
                .iter()
                .zip(prev.pairs().iter())
                .filter(|((_, new), (_, old))| new != old)
                .map(|((name, _), _)| name.to_string())
                .collect(),
            None => block_hashes.pairs().iter().map(|(name, _)| name.to_string()).collect(),
        };
        self.previous_hashes.insert(key, block_hashes.clone());

        let mut etag_hasher = Sha256::new();
        for (name, hash) in block_hashes.pairs() {
            etag_hasher.update(name.as_bytes());
            etag_hasher.update(b":");
            etag_hasher.update(hash.as_bytes());
            etag_hasher.update(b";");
        }
        let etag = format!("{:x}", etag_hasher.finalize())[..16].to_string();

        IntelResponse {
            etag,
            block_hashes,
            changed_blocks,
            market: inputs.market,
            leaders: inputs.leaders,
            top_news: inputs.top_news,
            eventfeed: inputs.eventfeed,
            flow: inputs.flow,
            risk: inputs.risk,
            derivatives: inputs.derivatives,
            forecast: inputs.forecast,
            daily_equity_movers: inputs.daily_equity_movers,
            debug: inputs.debug,
            generated_at: Utc::now(),
        }
    }
}

impl Default for PipelineOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::news::EventFeed;

    fn sample_request() -> IntelRequest {
        IntelRequest { timeframe: "1h".to_string(), news_timespan: "24h".to_string(), watchlist: vec!["AAPL".to_string()] }
    }

    fn sample_inputs() -> RunInputs {
        RunInputs {
            market: serde_json::json!({"btc": 50000.0}),
            leaders: serde_json::json!([]),
            top_news: vec![],
            eventfeed: EventFeed::default(),
            flow: serde_json::json!({}),
            risk: serde_json::json!({}),
            derivatives: serde_json::json!({}),
            forecast: vec![],
            daily_equity_movers: serde_json::json!({}),
            debug: serde_json::json!({}),
        }
    }

    #[test]
    fn same_inputs_yield_identical_etag_and_hashes() {
        let orchestrator = PipelineOrchestrator::new();
        let req = sample_request();
        let a = orchestrator.assemble(&req, sample_inputs());
        let b = orchestrator.assemble(&req, sample_inputs());
        assert_eq!(a.etag, b.etag);
        assert_eq!(a.block_hashes.market, b.block_hashes.market);
    }

    #[test]
    fn first_run_reports_all_blocks_changed() {
        let orchestrator = PipelineOrchestrator::new();
        let req = sample_request();
        let resp = orchestrator.assemble(&req, sample_inputs());
        assert_eq!(resp.changed_blocks.len(), 10);
    }

    #[test]
    fn second_run_with_same_inputs_reports_no_changes() {
        let orchestrator = PipelineOrchestrator::new();
        let req = sample_request();
        orchestrator.assemble(&req, sample_inputs());
        let resp = orchestrator.assemble(&req, sample_inputs());
        assert!(resp.changed_blocks.is_empty());
    }

    #[test]
    fn changed_market_block_is_isolated_in_diff() {
        let orchestrator = PipelineOrchestrator::new();
        let req = sample_request();
        orchestrator.assemble(&req, sample_inputs());
        let mut second = sample_inputs();
        second.market = serde_json::json!({"btc": 51000.0});
        let resp = orchestrator.assemble(&req, second);
        assert_eq!(resp.changed_blocks, vec!["market".to_string()]);
    }

    #[test]
    fn canonical_bytes_escapes_non_ascii() {
        let value = serde_json::json!({"headline": "café"});
        let bytes = canonical_bytes(&value);
        assert!(bytes.is_ascii());
    }
}
