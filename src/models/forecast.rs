use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Single point in a portfolio dollar-value forecast time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: String,
    pub predicted_value: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub confidence_level: f64,
}

/// Complete portfolio value forecast (supplemental — §2 component K).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioForecast {
    pub portfolio_id: String,
    pub current_value: f64,
    pub forecast_points: Vec<ForecastPoint>,
    pub methodology: ForecastMethod,
    pub confidence_level: f64,
    pub warnings: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    LinearRegression,
    ExponentialSmoothing,
    MovingAverage,
    Ensemble,
}

impl ForecastMethod {
    pub fn description(&self) -> &'static str {
        match self {
            ForecastMethod::LinearRegression => {
                "Linear trend extrapolation based on historical performance"
            }
            ForecastMethod::ExponentialSmoothing => {
                "Exponential smoothing with trend and seasonality"
            }
            ForecastMethod::MovingAverage => "Simple moving average projection",
            ForecastMethod::Ensemble => "Weighted average of multiple forecasting methods",
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoricalDataPoint {
    pub date: String,
    pub value: f64,
}
