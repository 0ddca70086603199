//! Process-wide configuration, loaded once at startup.
//!
//! Mirrors the precedence rules of the analytics pipeline this service
//! replaces: environment variables win, an optional YAML file
//! (`CONFIG_PATH`, default `config.yaml`) supplies defaults for anything
//! not set in the environment, and a final hardcoded default covers
//! everything else.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Default)]
struct YamlOverlay {
    database_url: Option<String>,
    retention_days: Option<i64>,
    news_ingest_interval_minutes: Option<i64>,
    impact_half_life_hours: Option<f64>,
    weights: Option<HashMap<String, f64>>,
    news_rank_weights: Option<HashMap<String, f64>>,
    news_rank_profiles: Option<HashMap<String, HashMap<String, f64>>>,
    thresholds: Option<HashMap<String, f64>>,
    min_hold_minutes: Option<HashMap<String, i64>>,
    source_tiers: Option<HashMap<String, Vec<String>>>,
}

/// Every environment/config key spec.md §6 names, plus the defaults the
/// original pipeline ships with (`app/config.py::load_settings`).
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub enable_openai_summary: bool,
    pub request_timeout_secs: f64,
    pub cache_ttl_seconds: i64,
    pub redis_url: Option<String>,
    pub database_url: String,
    pub retention_days: i64,
    pub news_ingest_interval_minutes: i64,
    pub impact_half_life_hours: f64,
    pub weights: HashMap<String, f64>,
    pub news_rank_weights: HashMap<String, f64>,
    pub news_rank_profiles: HashMap<String, HashMap<String, f64>>,
    pub news_rank_profile: Option<String>,
    pub news_rank_profile_auto: bool,
    pub thresholds: HashMap<String, f64>,
    pub min_hold_minutes: HashMap<String, i64>,
    pub source_tiers: HashMap<String, Vec<String>>,
    pub max_queries_per_span: u32,
    pub personal_budget_ms: u64,
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn load_yaml_overlay() -> YamlOverlay {
    let path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yaml"));
    match std::fs::read_to_string(&path) {
        Ok(raw) => serde_yaml::from_str(&raw).unwrap_or_default(),
        Err(_) => YamlOverlay::default(),
    }
}

impl Settings {
    pub fn from_env() -> Self {
        let cfg = load_yaml_overlay();

        let weights = cfg.weights.clone().unwrap_or_else(|| {
            HashMap::from([("market".to_string(), 0.6), ("news".to_string(), 0.4)])
        });
        let news_rank_weights = cfg.news_rank_weights.clone().unwrap_or_else(|| {
            HashMap::from([
                ("relevance".to_string(), 0.45),
                ("quality".to_string(), 0.30),
                ("impact".to_string(), 0.15),
                ("scope".to_string(), 0.10),
            ])
        });
        let thresholds = cfg.thresholds.clone().unwrap_or_else(|| {
            HashMap::from([
                ("flip_hysteresis".to_string(), 0.12),
                ("neutral_band_pct".to_string(), 0.0015),
                ("min_confidence".to_string(), 0.35),
            ])
        });
        let min_hold_minutes = cfg.min_hold_minutes.clone().unwrap_or_else(|| {
            HashMap::from([
                ("15m".to_string(), 20),
                ("1h".to_string(), 75),
                ("3h".to_string(), 200),
                ("6h".to_string(), 340),
            ])
        });
        let source_tiers = cfg.source_tiers.clone().unwrap_or_else(|| {
            HashMap::from([
                ("primary".to_string(), Vec::new()),
                ("tier1".to_string(), Vec::new()),
                ("tier2".to_string(), Vec::new()),
                ("social".to_string(), Vec::new()),
            ])
        });

        Settings {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            openai_model: std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            enable_openai_summary: env_bool("ENABLE_OPENAI_SUMMARY", false),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT", 12.0),
            cache_ttl_seconds: env_parse("CACHE_TTL_SECONDS", 30),
            redis_url: std::env::var("REDIS_URL").ok(),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .or(cfg.database_url.clone())
                .unwrap_or_else(|| "postgres://localhost/market_intel".to_string()),
            retention_days: env_parse("RETENTION_DAYS", cfg.retention_days.unwrap_or(8)),
            news_ingest_interval_minutes: env_parse(
                "NEWS_INGEST_INTERVAL_MINUTES",
                cfg.news_ingest_interval_minutes.unwrap_or(30),
            ),
            impact_half_life_hours: env_parse(
                "IMPACT_HALF_LIFE_HOURS",
                cfg.impact_half_life_hours.unwrap_or(12.0),
            ),
            weights,
            news_rank_weights,
            news_rank_profiles: cfg.news_rank_profiles.clone().unwrap_or_default(),
            news_rank_profile: std::env::var("NEWS_RANK_PROFILE").ok(),
            news_rank_profile_auto: env_bool("NEWS_RANK_PROFILE_AUTO", true),
            thresholds,
            min_hold_minutes,
            source_tiers,
            max_queries_per_span: env_parse("MAX_QUERIES_PER_SPAN", 4),
            personal_budget_ms: env_parse("PERSONAL_BUDGET_MS", 800),
        }
    }

    pub fn flip_hysteresis(&self) -> f64 {
        *self.thresholds.get("flip_hysteresis").unwrap_or(&0.12)
    }

    pub fn neutral_band_pct(&self) -> f64 {
        *self.thresholds.get("neutral_band_pct").unwrap_or(&0.0015)
    }

    pub fn min_confidence(&self) -> f64 {
        *self.thresholds.get("min_confidence").unwrap_or(&0.35)
    }

    pub fn min_hold_minutes_for(&self, tf: &str) -> i64 {
        *self.min_hold_minutes.get(tf).unwrap_or(&60)
    }
}
