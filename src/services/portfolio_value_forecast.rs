//! Portfolio dollar-value forecasting (component K). Ported from the
//! teacher's `forecasting_service.rs`: linear regression, Holt's
//! double-exponential smoothing, moving average and an ensemble of the
//! three project a portfolio's total value forward from a historical
//! series, with growth capped at a sane monthly rate.
//!
//! The teacher's version reads a persisted `holding_snapshots`/
//! `cash_flows` history and adjusts for deposits/withdrawals before
//! fitting; this crate has no portfolio-snapshot persistence layer (the
//! portfolio domain here is read-only valuation over live quotes, not
//! an accounting ledger), so `generate_portfolio_forecast` takes the
//! already-adjusted `HistoricalDataPoint` series as input instead of
//! fetching and adjusting it itself. The fitting/capping math is
//! unchanged.
use chrono::{Duration, Utc};

use crate::errors::AppError;
use crate::models::portfolio_intel::{ForecastMethod, ForecastPoint, HistoricalDataPoint, PortfolioForecast};

pub fn generate_portfolio_forecast(
    history: &[HistoricalDataPoint],
    current_value: f64,
    days_ahead: i32,
    method: Option<ForecastMethod>,
) -> Result<PortfolioForecast, AppError> {
    if history.len() < 3 {
        return Err(AppError::Validation(format!(
            "Insufficient data for forecasting. Need at least 3 data points, got {}",
            history.len()
        )));
    }

    let forecast_method = method.unwrap_or(ForecastMethod::Ensemble);
    let mut forecast_points = match forecast_method {
        ForecastMethod::LinearRegression => linear_regression_forecast(history, days_ahead)?,
        ForecastMethod::ExponentialSmoothing => exponential_smoothing_forecast(history, days_ahead)?,
        ForecastMethod::MovingAverage => moving_average_forecast(history, days_ahead)?,
        ForecastMethod::Ensemble => ensemble_forecast(history, days_ahead)?,
    };

    let adjusted_baseline = history.last().map(|p| p.value).unwrap_or(0.0);
    scale_forecasts_to_real_value(&mut forecast_points, adjusted_baseline, current_value);
    apply_sanity_caps(&mut forecast_points, current_value, history.len());

    let warnings = generate_warnings(history, &forecast_points);

    Ok(PortfolioForecast {
        current_value,
        forecast_points,
        methodology: forecast_method,
        confidence_level: 0.95,
        warnings,
        generated_at: Utc::now(),
    })
}

fn scale_forecasts_to_real_value(points: &mut [ForecastPoint], adjusted_baseline: f64, current_value: f64) {
    if adjusted_baseline <= 0.0 {
        for point in points.iter_mut() {
            point.predicted_value = current_value;
            point.lower_bound = current_value * 0.8;
            point.upper_bound = current_value * 1.2;
        }
        return;
    }
    let scale = current_value / adjusted_baseline;
    for point in points.iter_mut() {
        point.predicted_value *= scale;
        point.lower_bound *= scale;
        point.upper_bound *= scale;
    }
}

fn parse_last_date(history: &[HistoricalDataPoint]) -> Result<chrono::NaiveDate, AppError> {
    chrono::NaiveDate::parse_from_str(&history.last().unwrap().date, "%Y-%m-%d")
        .map_err(|e| AppError::Validation(format!("Invalid date format: {}", e)))
}

fn linear_regression_forecast(data: &[HistoricalDataPoint], days_ahead: i32) -> Result<Vec<ForecastPoint>, AppError> {
    let n = data.len() as f64;
    let values: Vec<f64> = data.iter().map(|p| p.value).collect();

    let x_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let x = i as f64;
        numerator += (x - x_mean) * (y - y_mean);
        denominator += (x - x_mean) * (x - x_mean);
    }
    let slope = numerator / denominator;
    let intercept = y_mean - slope * x_mean;

    let mut sum_squared_residuals = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let predicted = slope * i as f64 + intercept;
        sum_squared_residuals += (y - predicted).powi(2);
    }
    let std_error = (sum_squared_residuals / (n - 2.0).max(1.0)).sqrt();

    let last_date = parse_last_date(data)?;
    let mut points = Vec::new();
    for day in 1..=days_ahead {
        let x = n + day as f64 - 1.0;
        let predicted_value = slope * x + intercept;
        let confidence_factor = 1.96 * std_error * (1.0 + (day as f64 / days_ahead as f64));
        points.push(ForecastPoint {
            date: (last_date + Duration::days(day as i64)).to_string(),
            predicted_value: predicted_value.max(0.0),
            lower_bound: (predicted_value - confidence_factor).max(0.0),
            upper_bound: predicted_value + confidence_factor,
            confidence_level: 0.95,
        });
    }
    Ok(points)
}

fn exponential_smoothing_forecast(data: &[HistoricalDataPoint], days_ahead: i32) -> Result<Vec<ForecastPoint>, AppError> {
    let values: Vec<f64> = data.iter().map(|p| p.value).collect();
    let alpha = 0.3;
    let beta = 0.1;

    let mut level = values[0];
    let mut trend = values[1] - values[0];
    for &value in &values[1..] {
        let prev_level = level;
        level = alpha * value + (1.0 - alpha) * (level + trend);
        trend = beta * (level - prev_level) + (1.0 - beta) * trend;
    }

    let mut residuals = Vec::new();
    let mut test_level = values[0];
    let mut test_trend = values[1] - values[0];
    for &value in &values[1..] {
        let forecast = test_level + test_trend;
        residuals.push(value - forecast);
        let prev_level = test_level;
        test_level = alpha * value + (1.0 - alpha) * (test_level + test_trend);
        test_trend = beta * (test_level - prev_level) + (1.0 - beta) * test_trend;
    }
    let std_dev = calculate_std_dev(&residuals);

    let last_date = parse_last_date(data)?;
    let mut points = Vec::new();
    for day in 1..=days_ahead {
        let predicted_value = level + trend * day as f64;
        let confidence_factor = 1.96 * std_dev * ((day as f64) / days_ahead as f64).sqrt();
        points.push(ForecastPoint {
            date: (last_date + Duration::days(day as i64)).to_string(),
            predicted_value: predicted_value.max(0.0),
            lower_bound: (predicted_value - confidence_factor).max(0.0),
            upper_bound: predicted_value + confidence_factor,
            confidence_level: 0.95,
        });
    }
    Ok(points)
}

fn moving_average_forecast(data: &[HistoricalDataPoint], days_ahead: i32) -> Result<Vec<ForecastPoint>, AppError> {
    let window_size = (data.len() / 3).max(3).min(10).min(data.len());
    let values: Vec<f64> = data.iter().map(|p| p.value).collect();

    let recent_avg: f64 = values.iter().rev().take(window_size).sum::<f64>() / window_size as f64;
    let first_window: f64 = values.iter().rev().skip(window_size).take(window_size).sum::<f64>()
        / window_size.max(1) as f64;
    let trend = (recent_avg - first_window) / window_size as f64;
    let volatility = calculate_std_dev(&values);

    let last_date = parse_last_date(data)?;
    let mut points = Vec::new();
    for day in 1..=days_ahead {
        let predicted_value = recent_avg + trend * day as f64;
        let confidence_factor = 1.96 * volatility * ((day as f64) / days_ahead as f64).sqrt();
        points.push(ForecastPoint {
            date: (last_date + Duration::days(day as i64)).to_string(),
            predicted_value: predicted_value.max(0.0),
            lower_bound: (predicted_value - confidence_factor).max(0.0),
            upper_bound: predicted_value + confidence_factor,
            confidence_level: 0.95,
        });
    }
    Ok(points)
}

fn ensemble_forecast(data: &[HistoricalDataPoint], days_ahead: i32) -> Result<Vec<ForecastPoint>, AppError> {
    let linear = linear_regression_forecast(data, days_ahead)?;
    let exponential = exponential_smoothing_forecast(data, days_ahead)?;
    let moving_avg = moving_average_forecast(data, days_ahead)?;

    let mut points = Vec::new();
    for i in 0..days_ahead as usize {
        let predicted_value =
            linear[i].predicted_value * 0.4 + exponential[i].predicted_value * 0.4 + moving_avg[i].predicted_value * 0.2;
        let lower_bound = linear[i].lower_bound.min(exponential[i].lower_bound).min(moving_avg[i].lower_bound);
        let upper_bound = linear[i].upper_bound.max(exponential[i].upper_bound).max(moving_avg[i].upper_bound);
        points.push(ForecastPoint {
            date: linear[i].date.clone(),
            predicted_value: predicted_value.max(0.0),
            lower_bound: lower_bound.max(0.0),
            upper_bound,
            confidence_level: 0.95,
        });
    }
    Ok(points)
}

fn apply_sanity_caps(points: &mut [ForecastPoint], current_value: f64, data_points: usize) {
    let max_monthly_return = if data_points < 10 { 0.08_f64 } else { 0.15_f64 };

    for (i, point) in points.iter_mut().enumerate() {
        let months = (i + 1) as f64 / 30.0;
        let max_reasonable = current_value * (1.0 + max_monthly_return).powf(months);
        let min_reasonable = current_value * (1.0 - 0.20_f64).powf(months);

        point.predicted_value = point.predicted_value.clamp(min_reasonable, max_reasonable);

        let max_upper = current_value * (1.0 + max_monthly_return * 2.0).powf(months);
        if point.upper_bound > max_upper {
            point.upper_bound = max_upper;
        }
        let min_lower = current_value * 0.2;
        if point.lower_bound < min_lower {
            point.lower_bound = min_lower;
        }
        if point.lower_bound > point.predicted_value {
            point.lower_bound = point.predicted_value * 0.8;
        }
        if point.upper_bound < point.predicted_value {
            point.upper_bound = point.predicted_value * 1.2;
        }
    }
}

fn generate_warnings(history: &[HistoricalDataPoint], forecast: &[ForecastPoint]) -> Vec<String> {
    let mut warnings = Vec::new();

    if history.len() < 30 {
        warnings.push(format!("Limited historical data ({} points). Forecasts may be less reliable.", history.len()));
    }
    if history.len() < 10 {
        warnings.push(
            "Very limited data (<10 points). Forecasts are capped at 8% monthly growth to prevent unrealistic projections."
                .to_string(),
        );
    }

    let values: Vec<f64> = history.iter().map(|p| p.value).collect();
    let volatility = calculate_std_dev(&values);
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    if mean > 0.0 && volatility / mean > 0.15 {
        warnings.push("High portfolio volatility detected. Confidence intervals are wider.".to_string());
    }

    if let (Some(first), Some(last)) = (forecast.first(), forecast.last()) {
        if first.predicted_value > 0.0 {
            let change = ((last.predicted_value - first.predicted_value) / first.predicted_value).abs();
            if change > 0.50 {
                warnings.push(
                    "Forecast projects significant change (>50%). This is based on extrapolation and should be viewed with caution."
                        .to_string(),
                );
            }
        }
    }

    warnings.push("Forecasts are statistical projections based on past data. They are not guarantees of future performance.".to_string());
    warnings
}

fn calculate_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(values: &[f64]) -> Vec<HistoricalDataPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| HistoricalDataPoint { date: format!("2026-01-{:02}", i + 1), value: *v })
            .collect()
    }

    #[test]
    fn rejects_fewer_than_three_points() {
        let history = series(&[100.0, 101.0]);
        assert!(generate_portfolio_forecast(&history, 101.0, 7, None).is_err());
    }

    #[test]
    fn ensemble_forecast_trends_with_rising_history() {
        let history = series(&[100.0, 102.0, 104.0, 106.0, 108.0, 110.0, 112.0, 114.0, 116.0, 118.0, 120.0]);
        let forecast = generate_portfolio_forecast(&history, 120.0, 5, Some(ForecastMethod::Ensemble)).unwrap();
        assert_eq!(forecast.forecast_points.len(), 5);
        assert!(forecast.forecast_points[4].predicted_value >= forecast.forecast_points[0].predicted_value * 0.9);
    }

    #[test]
    fn sanity_caps_bound_extreme_slopes() {
        let history = series(&[10.0, 20.0, 1000.0]);
        let forecast = generate_portfolio_forecast(&history, 1000.0, 30, Some(ForecastMethod::LinearRegression)).unwrap();
        let last = forecast.forecast_points.last().unwrap();
        assert!(last.predicted_value <= 1000.0 * (1.15_f64).powf(1.0));
    }
}
