use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// First-match-wins event classification applied during tagging.
/// Order matters: `classify_event_type` tries these in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    EarningsGuidance,
    RegulationLegal,
    Mna,
    CapexInvestment,
    SanctionsGeopolitics,
    EnergySupplyOpec,
    MacroRatesInflation,
    CryptoMarketStructure,
    SecurityIncident,
    ProductPlatform,
    Other,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::EarningsGuidance => "EARNINGS_GUIDANCE",
            EventType::RegulationLegal => "REGULATION_LEGAL",
            EventType::Mna => "MNA",
            EventType::CapexInvestment => "CAPEX_INVESTMENT",
            EventType::SanctionsGeopolitics => "SANCTIONS_GEOPOLITICS",
            EventType::EnergySupplyOpec => "ENERGY_SUPPLY_OPEC",
            EventType::MacroRatesInflation => "MACRO_RATES_INFLATION",
            EventType::CryptoMarketStructure => "CRYPTO_MARKET_STRUCTURE",
            EventType::SecurityIncident => "SECURITY_INCIDENT",
            EventType::ProductPlatform => "PRODUCT_PLATFORM",
            EventType::Other => "OTHER",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NewsScope {
    Macro,
    Geopolitics,
    Company,
    Sector,
    Systemic,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stance {
    Hawkish,
    Dovish,
    RiskEscalate,
    RiskDeescalate,
    Neutral,
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonEvent {
    pub actor_name: Option<String>,
    pub actor_id: Option<String>,
    pub actor_group: Option<String>,
    pub statement_type: String,
    pub stance: Stance,
    pub impact_channel: Vec<String>,
    pub asset_class_bias: Vec<String>,
    pub expected_direction_short_term: String,
    /// 0..100
    pub impact_potential: u8,
    /// 0..100
    pub confidence: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SectorDirection {
    Up,
    Down,
    Neutral,
    Mixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectorImpact {
    pub sector: String,
    pub direction: SectorDirection,
    /// 0..100
    pub confidence: u8,
    pub rationale: String,
    /// 0..100
    pub impact_score: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventCategory {
    Regional,
    Company,
    Sector,
    Personal,
}

/// A single news article, enriched with every tag/score the news engine
/// (`services::news_engine`) attaches. `relevance_score`, `quality_score`,
/// `impact_potential`, `scope_score`, and every `sector_impacts[].impact_score`
/// live on a uniform 0..100 scale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub url: String,
    pub canonical_url: String,
    pub source_domain: String,
    pub description: Option<String>,
    pub content_text: Option<String>,
    pub published_at_utc: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub category: Option<String>,
    pub entities: Vec<String>,
    pub event_type: Option<EventType>,
    pub impact_channel: Vec<String>,
    pub asset_class_bias: Vec<String>,
    pub expected_direction_short_term: Option<String>,
    pub relevance_score: u8,
    pub quality_score: u8,
    pub dedup_cluster_id: Option<String>,
    pub other_sources: Vec<String>,
    pub short_summary: Option<String>,
    pub impact_potential: u8,
    pub person_event: Option<PersonEvent>,
    pub news_scope: Option<NewsScope>,
    pub scope_score: u8,
    pub scope_signals: Vec<String>,
    pub sector_impacts: Vec<SectorImpact>,
    pub max_sector_impact: u8,
    /// Event-study relevance gate (ported verbatim: items with `score < 6`
    /// never enter `compute_event_study`).
    pub score: u8,
    /// Numeric mirror of `source_tier`, used by the forecasting engine's
    /// credibility weighting.
    pub tier_score: f64,
    pub final_rank_score: f64,
}

impl NewsItem {
    pub fn new(title: String, url: String, source_domain: String) -> Self {
        let canonical_url = crate::services::news_engine::canonicalize_url(&url);
        Self {
            title,
            url,
            canonical_url,
            source_domain,
            description: None,
            content_text: None,
            published_at_utc: None,
            tags: Vec::new(),
            category: None,
            entities: Vec::new(),
            event_type: None,
            impact_channel: Vec::new(),
            asset_class_bias: Vec::new(),
            expected_direction_short_term: None,
            relevance_score: 0,
            quality_score: 0,
            dedup_cluster_id: None,
            other_sources: Vec::new(),
            short_summary: None,
            impact_potential: 0,
            person_event: None,
            news_scope: None,
            scope_score: 0,
            scope_signals: Vec::new(),
            sector_impacts: Vec::new(),
            max_sector_impact: 0,
            score: 0,
            tier_score: 0.6,
            final_rank_score: 0.0,
        }
    }
}

/// A clustered, enriched news item bucketed for the EventFeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventItem {
    pub cluster_id: String,
    pub category: EventCategory,
    pub headline: String,
    pub ts_utc: DateTime<Utc>,
    pub impacted_assets: Vec<String>,
    pub confidence: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EventFeed {
    pub regional: Vec<EventItem>,
    pub company: Vec<EventItem>,
    pub sector: Vec<EventItem>,
    pub personal: Vec<EventItem>,
    pub notes: Vec<String>,
}
