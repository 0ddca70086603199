//! Quote router (spec.md §4.3 / component C): resolves a symbol to a
//! current quote through an ordered provider list with token-bucket
//! rate limiting, exponential backoff, negative caching and a
//! last-known-good degraded mode.
//!
//! Ported from `app/services/quote_router.py`. Per-provider and
//! per-symbol state is modeled as explicitly-scoped `DashMap`s owned by
//! the router instance (spec.md §9 "ambient module-level caches") —
//! never process-global statics.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::external::price_provider::PriceProvider;
use crate::external::twelvedata::TwelveDataProvider;
use crate::external::yahoo::YahooProvider;
use crate::models::quote::{ProviderResult, Quote, QuoteMeta};

pub const STALE_AFTER_S: i64 = 21_600;
pub const NEGATIVE_CACHE_TTL_S: i64 = 2_700;
pub const LAST_GOOD_TTL_S: i64 = 120;
const RESOLUTION_CACHE_TTL_S: i64 = 7 * 24 * 3600;
const MAX_BACKOFF_EXPONENT: u32 = 5;
const MAX_BACKOFF_SECS: u64 = 300;

/// `(symbol, change_key)` a snapshot field resolves to when the router
/// is asked to backfill a hole left by the primary market-data fetch.
pub const SNAPSHOT_PATCH_MAP: &[(&str, &str, Option<&str>)] = &[
    ("btc", "BTC-USD", Some("btc_change")),
    ("eth", "ETH-USD", Some("eth_change")),
    ("nasdaq", "^IXIC", Some("nasdaq_change")),
    ("ftse", "^FTSE", Some("ftse_change")),
    ("eurostoxx", "^STOXX50E", Some("eurostoxx_change")),
    ("bist", "XU100.IS", Some("bist_change")),
    ("dxy", "DX-Y.NYB", None),
    ("qqq", "QQQ", Some("qqq_change")),
    ("vix", "^VIX", None),
    ("oil", "CL=F", Some("oil_change")),
    ("gold", "GC=F", Some("gold_change")),
    ("silver", "SI=F", Some("silver_change")),
    ("copper", "HG=F", Some("copper_change")),
];

/// Abstract provider contract for a current-quote source (distinct from
/// `PriceProvider`, which only covers historical daily bars).
#[async_trait]
pub trait QuoteSource: Send + Sync {
    fn name(&self) -> &'static str;
    async fn get_quote(&self, symbol: &str) -> ProviderResult<Quote>;
    async fn search(&self, _symbol: &str) -> Option<String> {
        None
    }
}

/// Wraps the teacher's `YahooProvider` (daily-bar history) to serve as
/// a current-quote source: last close is treated as the latest price,
/// the prior close as the reference for `change_pct`.
pub struct YahooQuoteSource(pub YahooProvider);

#[async_trait]
impl QuoteSource for YahooQuoteSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn get_quote(&self, symbol: &str) -> ProviderResult<Quote> {
        let start = Instant::now();
        match self.0.fetch_daily_history(symbol, 5).await {
            Ok(points) if points.len() >= 1 => {
                use bigdecimal::ToPrimitive;
                let last = points.last().unwrap();
                let prev = if points.len() >= 2 { points.get(points.len() - 2) } else { None };
                let price = last.close.to_f64().unwrap_or(0.0);
                let change_pct = prev.and_then(|p| {
                    let prev_close = p.close.to_f64()?;
                    if prev_close == 0.0 {
                        None
                    } else {
                        Some((price - prev_close) / prev_close * 100.0)
                    }
                });
                ProviderResult::ok(
                    Quote {
                        price: Some(price),
                        change_pct,
                        ts_utc: Utc::now(),
                        currency: Some("USD".to_string()),
                        meta: QuoteMeta {
                            source: "yahoo".to_string(),
                            is_fallback: false,
                            freshness_seconds: 0,
                            degraded_mode: false,
                        },
                    },
                    start.elapsed().as_millis() as u64,
                )
            }
            Ok(_) => ProviderResult::failed("empty"),
            Err(e) => ProviderResult::failed(format!("{:?}", e)),
        }
    }
}

/// Wraps the teacher's `TwelveDataProvider` the same way.
pub struct TwelveDataQuoteSource(pub TwelveDataProvider);

#[async_trait]
impl QuoteSource for TwelveDataQuoteSource {
    fn name(&self) -> &'static str {
        "twelvedata"
    }

    async fn get_quote(&self, symbol: &str) -> ProviderResult<Quote> {
        let start = Instant::now();
        match self.0.fetch_daily_history(symbol, 5).await {
            Ok(points) if !points.is_empty() => {
                use bigdecimal::ToPrimitive;
                let last = points.last().unwrap();
                let prev = if points.len() >= 2 { points.get(points.len() - 2) } else { None };
                let price = last.close.to_f64().unwrap_or(0.0);
                let change_pct = prev.and_then(|p| {
                    let prev_close = p.close.to_f64()?;
                    if prev_close == 0.0 {
                        None
                    } else {
                        Some((price - prev_close) / prev_close * 100.0)
                    }
                });
                ProviderResult::ok(
                    Quote {
                        price: Some(price),
                        change_pct,
                        ts_utc: Utc::now(),
                        currency: Some("USD".to_string()),
                        meta: QuoteMeta {
                            source: "twelvedata".to_string(),
                            is_fallback: false,
                            freshness_seconds: 0,
                            degraded_mode: false,
                        },
                    },
                    start.elapsed().as_millis() as u64,
                )
            }
            Ok(_) => ProviderResult::failed("empty"),
            Err(e) => ProviderResult::failed(format!("{:?}", e)),
        }
    }
}

/// A naive token bucket: refills continuously at `refill_per_sec`,
/// capped at `capacity`.
struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: f64, refill_per_sec: f64) -> Self {
        Self { capacity, tokens: capacity, refill_per_sec, last_refill: Instant::now() }
    }

    fn try_take(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[derive(Default)]
struct BackoffState {
    backoff_until: Option<Instant>,
    exponent: u32,
}

impl BackoffState {
    fn is_open(&self) -> bool {
        self.backoff_until.map(|t| Instant::now() < t).unwrap_or(false)
    }

    fn bump(&mut self) {
        self.exponent = (self.exponent + 1).min(MAX_BACKOFF_EXPONENT);
        let secs = (2u64.saturating_pow(self.exponent)).min(MAX_BACKOFF_SECS);
        self.backoff_until = Some(Instant::now() + Duration::from_secs(secs));
    }
}

/// Observable counters for `/quotes/debug`.
#[derive(Debug, Default, Clone, serde::Serialize)]
pub struct RouterStats {
    pub provider_hits: u64,
    pub fallback_hits: u64,
    pub rate_limit_hits: u64,
    pub negative_cache_hits: u64,
    pub all_failed: u64,
}

struct LastGoodEntry {
    quote: Quote,
    expires_at: Instant,
}

struct NegativeCacheEntry {
    expires_at: Instant,
}

struct ResolutionEntry {
    resolved: String,
    expires_at: Instant,
}

/// One entry per configured provider, in resolution order.
struct ProviderSlot {
    source: Arc<dyn QuoteSource>,
    bucket: Mutex<TokenBucket>,
    backoff: Mutex<BackoffState>,
    enabled: bool,
}

pub struct QuoteRouter {
    providers: Vec<ProviderSlot>,
    negative_cache: DashMap<(String, String), NegativeCacheEntry>,
    last_good: DashMap<String, LastGoodEntry>,
    resolution_cache: DashMap<(String, String), ResolutionEntry>,
    static_map: HashMap<&'static str, &'static str>,
    stats: Mutex<RouterStats>,
}

impl QuoteRouter {
    /// Builds the default provider chain: yahoo (60/min), finnhub
    /// (60/min), twelvedata (8/min), in that order.
    pub fn new(providers: Vec<(Arc<dyn QuoteSource>, f64, bool)>) -> Self {
        let slots = providers
            .into_iter()
            .map(|(source, per_min, enabled)| ProviderSlot {
                source,
                bucket: Mutex::new(TokenBucket::new(per_min, per_min / 60.0)),
                backoff: Mutex::new(BackoffState::default()),
                enabled,
            })
            .collect();

        let static_map = HashMap::from([
            ("BTC", "BTC-USD"),
            ("ETH", "ETH-USD"),
        ]);

        Self {
            providers: slots,
            negative_cache: DashMap::new(),
            last_good: DashMap::new(),
            resolution_cache: DashMap::new(),
            static_map,
            stats: Mutex::new(RouterStats::default()),
        }
    }

    pub fn stats(&self) -> RouterStats {
        self.stats.lock().clone()
    }

    /// `{provider_name: enabled}` for every configured provider, in
    /// resolution order — feeds `/health`'s provider-enable map.
    pub fn provider_enable_map(&self) -> Vec<(&'static str, bool)> {
        self.providers.iter().map(|slot| (slot.source.name(), slot.enabled)).collect()
    }

    async fn resolve_symbol(&self, provider_name: &str, symbol: &str) -> String {
        if let Some(mapped) = self.static_map.get(symbol) {
            return mapped.to_string();
        }
        let key = (provider_name.to_string(), symbol.to_string());
        if let Some(entry) = self.resolution_cache.get(&key) {
            if Instant::now() < entry.expires_at {
                return entry.resolved.clone();
            }
        }
        symbol.to_string()
    }

    async fn record_resolution(&self, provider_name: &str, symbol: &str, resolved: String) {
        self.resolution_cache.insert(
            (provider_name.to_string(), symbol.to_string()),
            ResolutionEntry { resolved, expires_at: Instant::now() + Duration::from_secs(RESOLUTION_CACHE_TTL_S as u64) },
        );
    }

    fn in_negative_cache(&self, provider_name: &str, symbol: &str) -> bool {
        let key = (provider_name.to_string(), symbol.to_string());
        match self.negative_cache.get(&key) {
            Some(entry) if Instant::now() < entry.expires_at => true,
            Some(_) => {
                self.negative_cache.remove(&key);
                false
            }
            None => false,
        }
    }

    fn add_negative_cache(&self, provider_name: &str, symbol: &str) {
        self.negative_cache.insert(
            (provider_name.to_string(), symbol.to_string()),
            NegativeCacheEntry { expires_at: Instant::now() + Duration::from_secs(NEGATIVE_CACHE_TTL_S as u64) },
        );
    }

    /// Step 1-5 of spec.md §4.3's `get_quote` algorithm.
    pub async fn get_quote(&self, symbol: &str) -> Quote {
        for slot in &self.providers {
            if !slot.enabled {
                continue;
            }
            if slot.backoff.lock().is_open() {
                continue;
            }
            if !slot.bucket.lock().try_take() {
                self.stats.lock().rate_limit_hits += 1;
                continue;
            }

            let provider_name = slot.source.name();
            if self.in_negative_cache(provider_name, symbol) {
                self.stats.lock().negative_cache_hits += 1;
                continue;
            }

            let resolved = self.resolve_symbol(provider_name, symbol).await;
            let result = slot.source.get_quote(&resolved).await;

            if result.ok {
                if let Some(mut quote) = result.data {
                    let freshness_seconds = (Utc::now() - quote.ts_utc).num_seconds().max(0);
                    if freshness_seconds <= STALE_AFTER_S {
                        quote.meta = QuoteMeta {
                            source: provider_name.to_string(),
                            is_fallback: false,
                            freshness_seconds,
                            degraded_mode: false,
                        };
                        self.last_good.insert(
                            symbol.to_string(),
                            LastGoodEntry {
                                quote: quote.clone(),
                                expires_at: Instant::now() + Duration::from_secs(LAST_GOOD_TTL_S as u64),
                            },
                        );
                        self.record_resolution(provider_name, symbol, resolved).await;
                        self.stats.lock().provider_hits += 1;
                        return quote;
                    }
                }
            }

            let error = result.error.unwrap_or_default();
            if error.starts_with("http_429") || error == "rate_limited" || error.starts_with("http_5xx") {
                slot.backoff.lock().bump();
            }
            self.add_negative_cache(provider_name, symbol);
            debug!(provider = provider_name, symbol, error, "quote provider failed");
        }

        if let Some(entry) = self.last_good.get(symbol) {
            self.stats.lock().fallback_hits += 1;
            let mut quote = entry.quote.clone();
            let freshness_seconds = (Utc::now() - quote.ts_utc).num_seconds().max(1);
            quote.meta.degraded_mode = true;
            quote.meta.is_fallback = true;
            quote.meta.freshness_seconds = freshness_seconds;
            return quote;
        }

        self.stats.lock().all_failed += 1;
        warn!(symbol, "all quote providers failed and no last-good entry");
        Quote {
            price: None,
            change_pct: None,
            ts_utc: Utc::now(),
            currency: None,
            meta: QuoteMeta { source: "none".to_string(), is_fallback: true, freshness_seconds: 0, degraded_mode: true },
        }
    }

    /// Backfills missing snapshot fields via `SNAPSHOT_PATCH_MAP`.
    /// Returns `(field_name, price, change_key_and_pct)` triples for
    /// whichever keys the caller flags as missing.
    pub async fn patch_snapshot(&self, missing_keys: &[&str]) -> Vec<(String, f64, Option<(String, f64)>)> {
        let mut patches = Vec::new();
        for (key, symbol, change_key) in SNAPSHOT_PATCH_MAP {
            if !missing_keys.contains(key) {
                continue;
            }
            let quote = self.get_quote(symbol).await;
            let Some(price) = quote.price else { continue };
            let change = change_key.zip(quote.change_pct).map(|(k, c)| (k.to_string(), c));
            patches.push((key.to_string(), price, change));
        }
        patches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FlakySource {
        name: &'static str,
        fail_times: AtomicUsize,
        price: f64,
    }

    #[async_trait]
    impl QuoteSource for FlakySource {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn get_quote(&self, _symbol: &str) -> ProviderResult<Quote> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return ProviderResult::failed("http_5xx:500");
            }
            ProviderResult::ok(
                Quote {
                    price: Some(self.price),
                    change_pct: Some(1.0),
                    ts_utc: Utc::now(),
                    currency: Some("USD".to_string()),
                    meta: QuoteMeta { source: self.name.to_string(), is_fallback: false, freshness_seconds: 0, degraded_mode: false },
                },
                5,
            )
        }
    }

    #[tokio::test]
    async fn falls_back_to_second_provider_after_failures() {
        let yahoo = Arc::new(FlakySource { name: "yahoo", fail_times: AtomicUsize::new(2), price: 0.0 });
        let finnhub = Arc::new(FlakySource { name: "finnhub", fail_times: AtomicUsize::new(0), price: 101.0 });
        let router = QuoteRouter::new(vec![
            (yahoo, 60.0, true),
            (finnhub, 60.0, true),
        ]);

        let quote = router.get_quote("AAPL").await;
        assert_eq!(quote.price, Some(101.0));
        assert_eq!(quote.meta.source, "finnhub");
        assert!(quote.meta.is_fallback);
        assert!(!quote.meta.degraded_mode);
        assert!(router.stats().provider_hits >= 1);
    }

    #[tokio::test]
    async fn degraded_mode_when_all_providers_fail_but_last_good_exists() {
        let flaky = Arc::new(FlakySource { name: "yahoo", fail_times: AtomicUsize::new(0), price: 55.0 });
        let router = QuoteRouter::new(vec![(flaky.clone(), 60.0, true)]);

        let first = router.get_quote("X").await;
        assert_eq!(first.price, Some(55.0));
        assert!(!first.meta.degraded_mode);

        flaky.fail_times.store(999, Ordering::SeqCst);
        let second = router.get_quote("X").await;
        assert_eq!(second.price, Some(55.0));
        assert!(second.meta.degraded_mode);
        assert!(second.meta.is_fallback);
        assert!(second.meta.freshness_seconds > 0);
    }

    #[tokio::test]
    async fn fallback_hits_never_exceed_provider_hits() {
        let flaky = Arc::new(FlakySource { name: "yahoo", fail_times: AtomicUsize::new(0), price: 10.0 });
        let router = QuoteRouter::new(vec![(flaky.clone(), 60.0, true)]);
        let _ = router.get_quote("A").await;
        flaky.fail_times.store(999, Ordering::SeqCst);
        let _ = router.get_quote("A").await;
        let stats = router.stats();
        assert!(stats.fallback_hits <= stats.provider_hits);
    }
}
