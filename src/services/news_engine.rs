//! Ranked, deduplicated news retrieval and event-feed assembly.
//!
//! Ported from `app/engine/news_engine.py`. Responsibility: produce a
//! ranked, deduplicated list of [`NewsItem`] for a given
//! `(query, timespan, maxrecords, watchlist)` and a parallel
//! [`EventFeed`] bucketed by category.
//!
//! Fetch orchestration builds `1 + N` queries (base plus one per
//! watchlist category), calls up to `MAX_QUERIES_PER_SPAN` in parallel
//! against the primary provider, and walks a timespan fallback ladder
//! `[1h, 6h, 24h]` until the deduped item count clears `MIN_NEWS` (12,
//! short spans) or `MIN_NEWS_LONG` (6, long spans). The whole call is
//! wrapped in a time budget (18s) and never fails the request: when
//! nothing clears the minimum it returns whatever it has plus a
//! `"news_data_weak"` note.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use regex::Regex;
use sha1::{Digest, Sha1};
use tokio::time::timeout;
use url::Url;

use crate::errors::{EngineNotes, ProviderErrorKind};
use crate::models::news::{EventCategory, EventFeed, EventItem, EventType, NewsItem};
use crate::services::person_impact;
use crate::services::sector_impact;

pub const MAX_QUERIES_PER_SPAN: usize = 4;
pub const MIN_NEWS: usize = 12;
pub const MIN_NEWS_LONG: usize = 6;
pub const NEWS_EXTRA_MAX_TICKERS: usize = 5;
pub const NEWS_EXTRA_MAX_FEEDS: usize = 3;
pub const DOMAIN_SOFT_CAP: usize = 5;
const FETCH_BUDGET_NEWS: Duration = Duration::from_secs(18);
const FETCH_BUDGET_EVENTS: Duration = Duration::from_secs(12);
const TIMESPAN_LADDER: [&str; 3] = ["1h", "6h", "24h"];
/// Broad syndication-style queries the extras fallback reaches for when
/// per-ticker company news still doesn't clear the minimum.
const EXTRA_SYNDICATION_QUERIES: &[&str] = &["markets", "economy", "breaking news"];
const TITLE_SIMILARITY_THRESHOLD: f64 = 0.85;
const CIRCUIT_OPEN_SECS: u64 = 60;

const TRACKING_PARAMS: &[&str] = &[
    "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content",
    "ref", "fbclid", "gclid", "mc_cid", "mc_eid", "cmpid", "spm", "igshid",
    "mkt_tok", "yclid",
];

/// Raw item returned by a provider before canonicalization/tagging.
#[derive(Debug, Clone)]
pub struct RawNewsItem {
    pub title: String,
    pub url: String,
    pub source_domain: String,
    pub published_at: DateTime<Utc>,
    pub snippet: String,
}

#[async_trait]
pub trait NewsSearchProvider: Send + Sync {
    async fn search(&self, query: &str, timespan: &str, max_records: usize)
        -> Result<Vec<RawNewsItem>, String>;
}

/// Per-provider 60-second circuit breaker, tripped on rate-limit errors.
/// Grounded on the existing failure_cache/rate_limiter idiom used by the
/// price providers.
#[derive(Clone, Default)]
pub struct CircuitBreaker {
    opened_at: Arc<DashMap<String, Instant>>,
}

impl CircuitBreaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self, provider: &str) -> bool {
        match self.opened_at.get(provider) {
            Some(at) => at.elapsed() < Duration::from_secs(CIRCUIT_OPEN_SECS),
            None => false,
        }
    }

    pub fn trip(&self, provider: &str) {
        self.opened_at.insert(provider.to_string(), Instant::now());
    }
}

/// Strip the tracking-parameter blocklist and fragment, preserving
/// scheme+host+path and any remaining query parameters.
pub fn canonicalize_url(raw: &str) -> String {
    let Ok(mut url) = Url::parse(raw) else {
        return raw.to_string();
    };
    url.set_fragment(None);
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !TRACKING_PARAMS.contains(&k.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else {
        let qs = kept
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        url.set_query(Some(&qs));
    }
    url.to_string()
}

fn tokenize_title(title: &str) -> std::collections::HashSet<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Jaccard token-set ratio, standing in for the original's
/// `SequenceMatcher`-based token-set comparison.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let ta = tokenize_title(a);
    let tb = tokenize_title(b);
    if ta.is_empty() || tb.is_empty() {
        return 0.0;
    }
    let intersection = ta.intersection(&tb).count();
    let union = ta.union(&tb).count();
    intersection as f64 / union as f64
}

pub fn dedup_cluster_id(canonical_url: &str, title: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(canonical_url.as_bytes());
    hasher.update(title.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

struct Cluster {
    representative: NewsItem,
    other_sources: Vec<String>,
}

/// Two-phase dedup: local clustering by (canonical_url | top-2 entities)
/// + title similarity, then a global pass that suppresses any item
/// whose canonical URL or title matches an already-kept survivor.
fn dedup_clusters(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut groups: HashMap<String, Vec<NewsItem>> = HashMap::new();
    for item in items {
        let key = if !item.canonical_url.is_empty() {
            item.canonical_url.clone()
        } else {
            item.entities.iter().take(2).cloned().collect::<Vec<_>>().join("|")
        };
        groups.entry(key).or_default().push(item);
    }

    let mut clusters: Vec<Cluster> = Vec::new();
    for (_key, mut group) in groups {
        group.sort_by(|a, b| {
            b.quality_score
                .cmp(&a.quality_score)
                .then(b.relevance_score.cmp(&a.relevance_score))
                .then(
                    b.published_at_utc
                        .unwrap_or(Utc::now())
                        .cmp(&a.published_at_utc.unwrap_or(Utc::now())),
                )
        });

        let mut local: Vec<Cluster> = Vec::new();
        'item: for item in group.drain(..) {
            for c in local.iter_mut() {
                if title_similarity(&c.representative.title, &item.title) >= TITLE_SIMILARITY_THRESHOLD {
                    if c.representative.source_domain != item.source_domain
                        && c.other_sources.len() < 3
                        && !c.other_sources.contains(&item.source_domain)
                    {
                        c.other_sources.push(item.source_domain.clone());
                    }
                    continue 'item;
                }
            }
            local.push(Cluster {
                representative: item,
                other_sources: Vec::new(),
            });
        }
        clusters.extend(local);
    }

    let mut survivors: Vec<NewsItem> = Vec::new();
    let mut seen_urls: Vec<String> = Vec::new();
    let mut seen_titles: Vec<String> = Vec::new();
    for cluster in clusters {
        let mut rep = cluster.representative;
        rep.other_sources = cluster.other_sources;
        let url_dup = !rep.canonical_url.is_empty() && seen_urls.contains(&rep.canonical_url);
        let title_dup = seen_titles
            .iter()
            .any(|t| title_similarity(t, &rep.title) >= TITLE_SIMILARITY_THRESHOLD);
        if url_dup || title_dup {
            if let Some(survivor) = survivors.iter_mut().find(|s| {
                s.canonical_url == rep.canonical_url
                    || title_similarity(&s.title, &rep.title) >= TITLE_SIMILARITY_THRESHOLD
            }) {
                if survivor.other_sources.len() < 3
                    && !survivor.other_sources.contains(&rep.source_domain)
                {
                    survivor.other_sources.push(rep.source_domain.clone());
                }
            }
            continue;
        }
        seen_urls.push(rep.canonical_url.clone());
        seen_titles.push(rep.title.clone());
        rep.dedup_cluster_id = Some(dedup_cluster_id(&rep.canonical_url, &rep.title));
        survivors.push(rep);
    }
    survivors
}

/// Drop items past the per-domain soft cap of 5, in ranked order.
fn apply_domain_cap(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    items
        .into_iter()
        .filter(|item| {
            let count = counts.entry(item.source_domain.clone()).or_insert(0);
            *count += 1;
            *count <= DOMAIN_SOFT_CAP
        })
        .collect()
}

fn tier_weight(source_domain: &str) -> f64 {
    const TIER_A: &[&str] = &["reuters.com", "bloomberg.com", "ft.com", "wsj.com", "apnews.com"];
    const TIER_B: &[&str] = &["cnbc.com", "coindesk.com", "theblock.co", "techcrunch.com"];
    if TIER_A.iter().any(|d| source_domain.ends_with(d)) {
        1.0
    } else if TIER_B.iter().any(|d| source_domain.ends_with(d)) {
        0.75
    } else {
        0.5
    }
}

fn recency_decay(age_hours: f64, source_domain: &str) -> f64 {
    let lambda = match tier_weight(source_domain) {
        w if w >= 1.0 => 0.7,
        w if w >= 0.75 => 0.85,
        _ => 1.0,
    };
    (-lambda * age_hours).exp().clamp(0.35, 1.0)
}

fn recency_bonus(age_hours: f64) -> f64 {
    (20.0 * (-0.18 * age_hours).exp()).round().max(2.0)
}

/// Regime/volatility keywords the original flags as macro-risk signals
/// distinct from the per-category topic keywords in
/// `ENTITY_TITLE_KEYWORDS`.
const REGIME_KEYWORDS: &[&str] = &[
    "recession", "rate hike", "rate cut", "volatility", "risk-off", "risk off",
    "flight to safety", "crash", "selloff", "sell-off",
];

fn regime_bonus(title: &str) -> f64 {
    let lower = title.to_lowercase();
    let hits = REGIME_KEYWORDS.iter().filter(|kw| lower.contains(*kw)).count();
    (hits as f64 * 4.0).min(12.0)
}

/// Boost from a detected [`crate::models::news::PersonEvent`], scaled by
/// its own `impact_potential` and capped so a single actor headline
/// can't dominate `relevance_score` on its own.
fn personal_boost(person_event: Option<&crate::models::news::PersonEvent>) -> f64 {
    person_event
        .map(|p| (p.impact_potential as f64 / 100.0) * 15.0)
        .unwrap_or(0.0)
}

/// `relevance_score`/`quality_score`/`final_rank_score` per spec §4.1.
/// Fields land on NewsItem's 0..100 `u8` scale, clamping any
/// out-of-range intermediate result.
pub fn score_item(item: &mut NewsItem, entity_match: f64, extra_entities: u32, topic_hits: u32) {
    let age_hours = (Utc::now() - item.published_at_utc.unwrap_or_else(Utc::now)).num_minutes() as f64 / 60.0;

    let capped_entity = (entity_match + 6.0 * (1.0 + extra_entities as f64).ln()).min(40.0);
    let relevance = 50.0
        + capped_entity
        + (topic_hits as f64 * 10.0)
        + recency_bonus(age_hours)
        + regime_bonus(&item.title)
        + personal_boost(item.person_event.as_ref());
    item.relevance_score = relevance.clamp(0.0, 100.0).round() as u8;

    let decay = recency_decay(age_hours, &item.source_domain);
    let health_penalty = 0.0;
    let quality = 100.0 * tier_weight(&item.source_domain) * decay * (1.0 - health_penalty);
    item.quality_score = quality.round().clamp(0.0, 100.0) as u8;

    item.max_sector_impact = item
        .sector_impacts
        .iter()
        .map(|s| s.impact_score)
        .max()
        .unwrap_or(0);
    let impact_person = item.person_event.as_ref().map(|p| p.impact_potential).unwrap_or(0);
    item.impact_potential = impact_person.max(item.max_sector_impact);

    item.final_rank_score = 0.45 * item.relevance_score as f64
        + 0.30 * item.quality_score as f64
        + 0.15 * item.impact_potential as f64
        + 0.10 * item.scope_score as f64;

    item.score = (item.final_rank_score / 10.0).round().clamp(0.0, 10.0) as u8;
    item.tier_score = tier_weight(&item.source_domain);
}

const ENTITY_TITLE_KEYWORDS: &[(&str, f64)] = &[
    ("policy rate", 5.0),
    ("sanctions", 5.0),
    ("tariffs", 5.0),
    ("oil supply", 5.0),
    ("ceasefire", 5.0),
];

const EVENT_TYPE_RULES: &[(&str, EventType)] = &[
    ("earnings|guidance|eps", EventType::EarningsGuidance),
    ("lawsuit|regulator|fine|probe", EventType::RegulationLegal),
    ("acqui|merger|takeover", EventType::Mna),
    ("capex|investment|expansion", EventType::CapexInvestment),
    ("sanction|geopolit|invasion|conflict", EventType::SanctionsGeopolitics),
    ("opec|oil supply|pipeline|barrel", EventType::EnergySupplyOpec),
    ("inflation|interest rate|central bank|fed ", EventType::MacroRatesInflation),
    ("blockchain|crypto|token|defi", EventType::CryptoMarketStructure),
    ("breach|hack|outage|cyberattack", EventType::SecurityIncident),
    ("launch|release|platform|feature", EventType::ProductPlatform),
];

fn classify_event_type(title: &str) -> EventType {
    let lower = title.to_lowercase();
    for (pattern, event_type) in EVENT_TYPE_RULES {
        if let Ok(re) = Regex::new(pattern) {
            if re.is_match(&lower) {
                return *event_type;
            }
        }
    }
    EventType::Other
}

fn topic_hit_count(title: &str) -> (u32, f64) {
    let lower = title.to_lowercase();
    let mut hits = 0u32;
    let mut boost = 0.0;
    for (kw, bonus) in ENTITY_TITLE_KEYWORDS {
        if lower.contains(kw) {
            hits += 1;
            boost += bonus;
        }
    }
    (hits, boost)
}

/// Build a [`NewsItem`] from a raw provider item, running
/// canonicalization, entity/person/country/event-type/scope/sector
/// tagging, and scoring. `watchlist` supplies crypto/energy/tech alias
/// lists for entity matching.
pub fn annotate_item(raw: RawNewsItem, watchlist: &[(String, &'static str)]) -> NewsItem {
    let mut item = NewsItem::new(raw.title.clone(), raw.url, raw.source_domain);
    item.published_at_utc = Some(raw.published_at);
    item.content_text = Some(raw.snippet);
    item.event_type = Some(classify_event_type(&item.title));

    let title_lower = item.title.to_lowercase();
    let mut matched_entities = Vec::new();
    let mut best_entity_score = 0.0f64;
    for (alias, _category) in watchlist {
        let alias_lower = alias.to_lowercase();
        let is_short_upper = alias.len() <= 3 && alias.chars().all(|c| c.is_ascii_uppercase());
        let matched = if is_short_upper {
            let has_context = title_lower.contains("stock")
                || title_lower.contains("shares")
                || title_lower.contains("market")
                || title_lower.contains("price");
            has_context && title_lower.contains(&alias_lower)
        } else if alias.chars().all(|c| c.is_alphanumeric()) {
            Regex::new(&format!(r"\b{}\b", regex::escape(&alias_lower)))
                .map(|re| re.is_match(&title_lower))
                .unwrap_or(false)
        } else {
            title_lower.contains(&alias_lower)
        };
        if matched {
            matched_entities.push(alias.clone());
            best_entity_score = best_entity_score.max(20.0);
        }
    }
    item.entities = matched_entities;

    let snippet = item.content_text.clone().unwrap_or_default();
    item.person_event = person_impact::detect_person_event(&item.title, &snippet);

    let (scope, scope_score, signals) = sector_impact::infer_news_scope(&item.title, &snippet);
    item.news_scope = Some(scope);
    item.scope_score = scope_score;
    item.scope_signals = signals;
    item.sector_impacts = sector_impact::infer_sector_impacts(&item.title, &snippet);

    let (topic_hits, _boost) = topic_hit_count(&item.title);
    score_item(&mut item, best_entity_score, item.entities.len().saturating_sub(1) as u32, topic_hits);
    item
}

/// `fetch_news` — orchestrates the query fan-out, the timespan fallback
/// ladder, and the dedup/cap/score/rank pipeline. Never returns Err:
/// provider failures degrade to `notes`.
pub async fn fetch_news<P: NewsSearchProvider + ?Sized>(
    provider: &P,
    breaker: &CircuitBreaker,
    base_query: &str,
    watchlist: &[(String, &'static str)],
    timespan: &str,
    max_records: usize,
) -> (Vec<NewsItem>, EngineNotes, String) {
    let mut notes = EngineNotes::new();
    let is_long_span = matches!(timespan, "7d" | "30d");
    let min_needed = if is_long_span { MIN_NEWS_LONG } else { MIN_NEWS };

    let spans: Vec<&str> = if is_long_span {
        vec![timespan]
    } else {
        TIMESPAN_LADDER.to_vec()
    };

    let mut collected: Vec<NewsItem> = Vec::new();
    let mut used_timespan = timespan.to_string();

    let fetch_fut = async {
        for span in spans {
            if breaker.is_open("primary_news") {
                notes.note("primary news provider circuit open, skipping span");
                continue;
            }
            let mut queries = vec![base_query.to_string()];
            for (_alias, category) in watchlist.iter().take(MAX_QUERIES_PER_SPAN.saturating_sub(1)) {
                queries.push(format!("{base_query} {category}"));
            }
            queries.truncate(MAX_QUERIES_PER_SPAN);

            for query in &queries {
                match provider.search(query, span, max_records).await {
                    Ok(raw_items) => {
                        for raw in raw_items {
                            collected.push(annotate_item(raw, watchlist));
                        }
                    }
                    Err(e) if e.to_lowercase().contains("rate limit") => {
                        breaker.trip("primary_news");
                        notes.provider_error("primary_news", ProviderErrorKind::RateLimited, &e);
                    }
                    Err(e) => {
                        notes.provider_error("primary_news", ProviderErrorKind::NetworkError, &e);
                    }
                }
            }

            used_timespan = span.to_string();
            let deduped = dedup_clusters(collected.clone());
            if deduped.len() >= min_needed {
                break;
            }
        }

        // Step 4: primary under-delivered across the whole ladder —
        // pull extra per-ticker company news, then fall back to broad
        // syndication queries, each still bounded and breaker-aware.
        if dedup_clusters(collected.clone()).len() < min_needed {
            notes.note("primary news under minimum, pulling extra ticker company news");
            for (alias, _category) in watchlist.iter().take(NEWS_EXTRA_MAX_TICKERS) {
                if breaker.is_open("primary_news") {
                    break;
                }
                match provider.search(alias, &used_timespan, max_records).await {
                    Ok(raw_items) => {
                        for raw in raw_items {
                            collected.push(annotate_item(raw, watchlist));
                        }
                    }
                    Err(e) if e.to_lowercase().contains("rate limit") => {
                        breaker.trip("primary_news");
                        notes.provider_error("primary_news", ProviderErrorKind::RateLimited, &e);
                    }
                    Err(e) => {
                        notes.provider_error("primary_news", ProviderErrorKind::NetworkError, &e);
                    }
                }
            }
        }

        if dedup_clusters(collected.clone()).len() < min_needed {
            notes.note("still under minimum after ticker extras, pulling syndication feeds");
            for feed_query in EXTRA_SYNDICATION_QUERIES.iter().take(NEWS_EXTRA_MAX_FEEDS) {
                if breaker.is_open("primary_news") {
                    break;
                }
                match provider.search(feed_query, &used_timespan, max_records).await {
                    Ok(raw_items) => {
                        for raw in raw_items {
                            collected.push(annotate_item(raw, watchlist));
                        }
                    }
                    Err(e) if e.to_lowercase().contains("rate limit") => {
                        breaker.trip("primary_news");
                        notes.provider_error("primary_news", ProviderErrorKind::RateLimited, &e);
                    }
                    Err(e) => {
                        notes.provider_error("primary_news", ProviderErrorKind::NetworkError, &e);
                    }
                }
            }
        }
    };

    if timeout(FETCH_BUDGET_NEWS, fetch_fut).await.is_err() {
        notes.budget_exceeded("news_fetch");
    }

    let mut deduped = dedup_clusters(collected);
    deduped.sort_by(|a, b| b.final_rank_score.partial_cmp(&a.final_rank_score).unwrap());
    let capped = apply_domain_cap(deduped);
    let ranked: Vec<NewsItem> = capped.into_iter().take(max_records).collect();

    if ranked.len() < min_needed {
        notes.note("news_data_weak");
    }

    (ranked, notes, used_timespan)
}

fn event_category_for(item: &NewsItem) -> EventCategory {
    if item.person_event.is_some() {
        EventCategory::Personal
    } else if !item.sector_impacts.is_empty() {
        EventCategory::Sector
    } else if matches!(
        item.news_scope,
        Some(crate::models::news::NewsScope::Geopolitics) | Some(crate::models::news::NewsScope::Macro)
    ) {
        EventCategory::Regional
    } else {
        EventCategory::Company
    }
}

fn to_event_item(item: &NewsItem) -> EventItem {
    EventItem {
        cluster_id: item
            .dedup_cluster_id
            .clone()
            .unwrap_or_else(|| dedup_cluster_id(&item.canonical_url, &item.title)),
        category: event_category_for(item),
        headline: item.title.clone(),
        ts_utc: item.published_at_utc.unwrap_or_else(Utc::now),
        impacted_assets: item.entities.clone(),
        confidence: item.relevance_score,
    }
}

fn dedup_bucket(mut bucket: Vec<EventItem>, per_category_top_k: usize) -> Vec<EventItem> {
    bucket.sort_by(|a, b| b.ts_utc.cmp(&a.ts_utc));
    let mut deduped: Vec<EventItem> = Vec::new();
    'outer: for candidate in bucket {
        for kept in &deduped {
            if title_similarity(&kept.headline, &candidate.headline) >= TITLE_SIMILARITY_THRESHOLD {
                continue 'outer;
            }
        }
        deduped.push(candidate);
    }
    let mut domain_counts: HashMap<String, usize> = HashMap::new();
    deduped.retain(|item| {
        let domain = item.impacted_assets.first().cloned().unwrap_or_default();
        let count = domain_counts.entry(domain).or_insert(0);
        *count += 1;
        *count <= DOMAIN_SOFT_CAP
    });
    deduped.truncate(per_category_top_k);
    deduped
}

/// `build_event_feed` — buckets already-annotated news into the four
/// `EventCategory` lanes (regional/company/sector/personal) and applies
/// per-category Top-K under the 12s event-feed time budget.
pub async fn build_event_feed(items: &[NewsItem], per_category_top_k: usize) -> (EventFeed, EngineNotes) {
    let mut notes = EngineNotes::new();
    let mut feed = EventFeed::default();

    let build = async {
        let mut regional = Vec::new();
        let mut company = Vec::new();
        let mut sector = Vec::new();
        let mut personal = Vec::new();

        for item in items {
            let event_item = to_event_item(item);
            match event_item.category {
                EventCategory::Regional => regional.push(event_item),
                EventCategory::Company => company.push(event_item),
                EventCategory::Sector => sector.push(event_item),
                EventCategory::Personal => personal.push(event_item),
            }
        }

        feed.regional = dedup_bucket(regional, per_category_top_k);
        feed.company = dedup_bucket(company, per_category_top_k);
        feed.sector = dedup_bucket(sector, per_category_top_k);
        feed.personal = dedup_bucket(personal, per_category_top_k);
    };

    if timeout(FETCH_BUDGET_EVENTS, build).await.is_err() {
        notes.budget_exceeded("event_feed_build");
    }

    let total = feed.regional.len() + feed.company.len() + feed.sector.len() + feed.personal.len();
    if total > 40 {
        notes.note("event_feed_global_cap_applied");
        let excess = total - 40;
        let mut remaining = excess;
        for bucket in [&mut feed.regional, &mut feed.company, &mut feed.sector, &mut feed.personal] {
            if remaining == 0 {
                break;
            }
            let trim = remaining.min(bucket.len().saturating_sub(1));
            bucket.truncate(bucket.len() - trim);
            remaining -= trim;
        }
    }
    feed.notes = notes.as_slice().to_vec();

    (feed, notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tracking_params_but_keeps_path() {
        let canonical = canonicalize_url(
            "https://example.com/news/a?utm_source=x&id=5&fbclid=abc#frag",
        );
        assert_eq!(canonical, "https://example.com/news/a?id=5");
    }

    #[test]
    fn title_similarity_identical_is_one() {
        assert_eq!(title_similarity("Fed raises rates", "Fed raises rates"), 1.0);
    }

    #[test]
    fn title_similarity_disjoint_is_zero() {
        assert_eq!(title_similarity("Fed raises rates", "Oil prices spike"), 0.0);
    }

    #[test]
    fn domain_cap_drops_excess_items() {
        let items: Vec<NewsItem> = (0..8)
            .map(|i| {
                let mut item = NewsItem::new(
                    format!("Title {i}"),
                    format!("https://dup.com/{i}"),
                    "dup.com".to_string(),
                );
                item.final_rank_score = 100.0 - i as f64;
                item
            })
            .collect();
        let capped = apply_domain_cap(items);
        assert_eq!(capped.len(), DOMAIN_SOFT_CAP);
    }
}
