use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::models::market_forecast::{Direction, Forecast, ForecastScore, Target, Timeframe};

pub async fn insert(pool: &PgPool, forecast: &Forecast) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO forecasts (id, ts_utc, tf, target, direction, raw_score, confidence,
                                 expires_at_utc, drivers, rationale_text)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(&forecast.id)
    .bind(forecast.ts_utc)
    .bind(forecast.tf.as_str())
    .bind(forecast.target.as_str())
    .bind(direction_str(forecast.direction))
    .bind(forecast.raw_score)
    .bind(forecast.confidence)
    .bind(forecast.expires_at_utc)
    .bind(&forecast.drivers)
    .bind(&forecast.rationale_text)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_latest(pool: &PgPool, tf: Timeframe, target: Target) -> Result<Option<ForecastRow>, sqlx::Error> {
    sqlx::query_as::<_, ForecastRow>(
        "SELECT id, ts_utc, tf, target, direction, raw_score, confidence,
                expires_at_utc, drivers, rationale_text
         FROM forecasts
         WHERE tf = $1 AND target = $2
         ORDER BY ts_utc DESC
         LIMIT 1",
    )
    .bind(tf.as_str())
    .bind(target.as_str())
    .fetch_optional(pool)
    .await
}

pub async fn fetch_expired_unscored(pool: &PgPool, now: DateTime<Utc>) -> Result<Vec<ForecastRow>, sqlx::Error> {
    sqlx::query_as::<_, ForecastRow>(
        "SELECT f.id, f.ts_utc, f.tf, f.target, f.direction, f.raw_score, f.confidence,
                f.expires_at_utc, f.drivers, f.rationale_text
         FROM forecasts f
         LEFT JOIN forecast_scores s ON s.forecast_id = f.id
         WHERE f.expires_at_utc <= $1 AND s.forecast_id IS NULL",
    )
    .bind(now)
    .fetch_all(pool)
    .await
}

pub async fn insert_score(pool: &PgPool, score: &ForecastScore) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO forecast_scores (forecast_id, realized_return, hit, brier_component, scored_at_utc)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(&score.forecast_id)
    .bind(score.realized_return)
    .bind(score.hit)
    .bind(score.brier_component)
    .bind(score.scored_at_utc)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn fetch_scores_since(pool: &PgPool, tf: Timeframe, since: DateTime<Utc>) -> Result<Vec<ForecastScore>, sqlx::Error> {
    sqlx::query_as::<_, ForecastScoreRow>(
        "SELECT s.forecast_id, s.realized_return, s.hit, s.brier_component, s.scored_at_utc
         FROM forecast_scores s
         JOIN forecasts f ON f.id = s.forecast_id
         WHERE f.tf = $1 AND s.scored_at_utc >= $2",
    )
    .bind(tf.as_str())
    .bind(since)
    .fetch_all(pool)
    .await
    .map(|rows| rows.into_iter().map(Into::into).collect())
}

fn direction_str(direction: Direction) -> &'static str {
    match direction {
        Direction::Up => "UP",
        Direction::Down => "DOWN",
        Direction::Neutral => "NEUTRAL",
    }
}

fn direction_from_str(s: &str) -> Direction {
    match s {
        "UP" => Direction::Up,
        "DOWN" => Direction::Down,
        _ => Direction::Neutral,
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ForecastRow {
    pub id: String,
    pub ts_utc: DateTime<Utc>,
    pub tf: String,
    pub target: String,
    pub direction: String,
    pub raw_score: f64,
    pub confidence: f64,
    pub expires_at_utc: DateTime<Utc>,
    pub drivers: Value,
    pub rationale_text: String,
}

impl ForecastRow {
    pub fn into_model(self) -> Option<Forecast> {
        Some(Forecast {
            id: self.id,
            ts_utc: self.ts_utc,
            tf: Timeframe::from_str_opt(&self.tf)?,
            target: match self.target.as_str() {
                "BTC" => Target::Btc,
                "ETH" => Target::Eth,
                "ALTS" => Target::Alts,
                "STABLES" => Target::Stables,
                _ => return None,
            },
            direction: direction_from_str(&self.direction),
            raw_score: self.raw_score,
            confidence: self.confidence,
            expires_at_utc: self.expires_at_utc,
            drivers: self.drivers,
            rationale_text: self.rationale_text,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct ForecastScoreRow {
    forecast_id: String,
    realized_return: f64,
    hit: bool,
    brier_component: f64,
    scored_at_utc: DateTime<Utc>,
}

impl From<ForecastScoreRow> for ForecastScore {
    fn from(row: ForecastScoreRow) -> Self {
        ForecastScore {
            forecast_id: row.forecast_id,
            realized_return: row.realized_return,
            hit: row.hit,
            brier_component: row.brier_component,
            scored_at_utc: row.scored_at_utc,
        }
    }
}
