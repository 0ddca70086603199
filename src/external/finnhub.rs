//! Finnhub `/quote` adapter (spec.md §4.3). The teacher only talks to
//! Finnhub for news (`providers/finnhub_news.py` in the original); this
//! is a new, distinct client for its current-quote endpoint, grounded
//! on the status-branching + JSON-shape pattern in
//! `external/twelvedata.rs`.

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::models::quote::{ProviderResult, Quote, QuoteMeta};
use crate::services::quote_router::QuoteSource;

pub struct FinnhubProvider {
    client: reqwest::Client,
    api_key: Option<String>,
}

impl FinnhubProvider {
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: std::env::var("FINNHUB_API_KEY").ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FinnhubQuoteResponse {
    /// current price
    c: f64,
    /// previous close
    pc: f64,
    /// quote timestamp (unix seconds); 0 when the symbol is unknown
    t: i64,
}

#[async_trait]
impl QuoteSource for FinnhubProvider {
    fn name(&self) -> &'static str {
        "finnhub"
    }

    async fn get_quote(&self, symbol: &str) -> ProviderResult<Quote> {
        let Some(key) = &self.api_key else {
            return ProviderResult::failed("missing_key");
        };
        let start = std::time::Instant::now();
        let url = format!("https://finnhub.io/api/v1/quote?symbol={symbol}&token={key}");
        let resp = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return ProviderResult::failed(format!("network_error:{e}")),
        };
        let latency_ms = start.elapsed().as_millis() as u64;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return ProviderResult::failed("rate_limited");
        }
        if resp.status().is_server_error() {
            return ProviderResult::failed(format!("http_5xx:{}", resp.status()));
        }
        if resp.status().is_client_error() {
            return ProviderResult::failed(format!("http_4xx:{}", resp.status()));
        }

        let body: FinnhubQuoteResponse = match resp.json().await {
            Ok(b) => b,
            Err(e) => return ProviderResult::failed(format!("schema:{e}")),
        };

        if body.t == 0 || body.c == 0.0 {
            return ProviderResult::failed("empty");
        }

        let change_pct = if body.pc != 0.0 {
            Some((body.c - body.pc) / body.pc * 100.0)
        } else {
            None
        };

        ProviderResult::ok(
            Quote {
                price: Some(body.c),
                change_pct,
                ts_utc: Utc::now(),
                currency: Some("USD".to_string()),
                meta: QuoteMeta {
                    source: "finnhub".to_string(),
                    is_fallback: false,
                    freshness_seconds: 0,
                    degraded_mode: false,
                },
            },
            latency_ms,
        )
    }
}
