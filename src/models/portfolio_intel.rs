//! Portfolio engine types (spec.md §4.5 / component H): valuation,
//! risk metrics, news-impact attribution and the turnover-bounded
//! optimizer. Operates on top of the teacher's persisted
//! `Portfolio`/`Position` domain — see DESIGN.md for the
//! single-hardcoded-portfolio -> many-portfolios generalization.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataStatus {
    Ok,
    Missing,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingValuation {
    pub ticker: String,
    pub shares: f64,
    pub price: Option<f64>,
    pub value: Option<f64>,
    pub weight: f64,
    pub currency: String,
    pub data_status: DataStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Allocation {
    pub by_currency: std::collections::HashMap<String, f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskMetrics {
    pub hhi: f64,
    pub max_weight: f64,
    pub vol_30d: f64,
    pub var_95_1d: f64,
    pub usd_exposure: f64,
    pub fx_risk_up: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributionMethod {
    Direct,
    Entity,
    Title,
    Fuzzy,
    Sector,
}

impl AttributionMethod {
    /// `method_weight` table (spec.md §4.5).
    pub fn weight(self) -> f64 {
        match self {
            AttributionMethod::Direct => 1.0,
            AttributionMethod::Entity => 0.9,
            AttributionMethod::Title => 0.7,
            AttributionMethod::Fuzzy => 0.6,
            AttributionMethod::Sector => 0.4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolNewsImpact {
    pub ticker: String,
    pub cluster_id: String,
    pub headline: String,
    pub method: AttributionMethod,
    pub impact: f64,
    pub is_indirect: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Horizon {
    Daily,
    Weekly,
    Monthly,
}

impl Horizon {
    /// Base turnover cap before `coverage_ratio` scaling.
    pub fn turnover_cap(self) -> f64 {
        match self {
            Horizon::Daily => 0.05,
            Horizon::Weekly => 0.15,
            Horizon::Monthly => 0.30,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Horizon::Daily => "24h",
            Horizon::Weekly => "7d",
            Horizon::Monthly => "30d",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionDirection {
    Increase,
    Decrease,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerAction {
    pub ticker: String,
    pub direction: ActionDirection,
    pub delta_weight: f64,
    pub score: f64,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OptimizerMode {
    Active,
    Hold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerResult {
    pub horizon: Horizon,
    pub mode: OptimizerMode,
    pub actions: Vec<OptimizerAction>,
    pub hold_reason: Option<String>,
    pub turnover_cap: f64,
    pub coverage_ratio: f64,
}

/// Per-symbol scoring inputs the optimizer composes (spec.md §4.5):
/// momentum z-7d, direct/indirect news pressure, regime and
/// sector-rotation tilt, net of vol/concentration/fx/transaction-cost
/// penalties.
#[derive(Debug, Clone, Default)]
pub struct SymbolSignals {
    pub ticker: String,
    pub momentum_z7d: f64,
    pub news_direct: f64,
    pub news_indirect: f64,
    pub regime: f64,
    pub sector_rotation: f64,
    pub vol_penalty: f64,
    pub concentration_penalty: f64,
    pub fx_penalty: f64,
    pub transaction_cost_penalty: f64,
    pub current_weight: f64,
    pub is_crypto: bool,
}

impl SymbolSignals {
    pub fn score(&self) -> f64 {
        0.25 * self.momentum_z7d + 0.25 * self.news_direct + 0.15 * self.news_indirect
            + 0.15 * self.regime + 0.20 * self.sector_rotation
            - self.vol_penalty
            - self.concentration_penalty
            - self.fx_penalty
            - self.transaction_cost_penalty
    }
}

/// One point of historical portfolio value, date-keyed, already net of
/// deposits/withdrawals (component K).
#[derive(Debug, Clone)]
pub struct HistoricalDataPoint {
    pub date: String,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    LinearRegression,
    ExponentialSmoothing,
    MovingAverage,
    Ensemble,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: String,
    pub predicted_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence_level: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioForecast {
    pub current_value: f64,
    pub forecast_points: Vec<ForecastPoint>,
    pub methodology: ForecastMethod,
    pub confidence_level: f64,
    pub warnings: Vec<String>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Composite `/portfolio` response: valuation, risk, news-impact
/// attribution, per-horizon optimizer actions, and the optional
/// dollar-value projection from component K.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioIntel {
    pub holdings: Vec<HoldingValuation>,
    pub allocation: Allocation,
    pub risk: RiskMetrics,
    pub news_impact: Vec<SymbolNewsImpact>,
    pub optimizer: Vec<OptimizerResult>,
    pub value_forecast: Option<PortfolioForecast>,
}
