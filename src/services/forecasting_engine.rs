//! Market-signal + news-signal fusion under hysteresis.
//!
//! Ported from `app/services/forecasting.py`. For each `(tf, target)`
//! pair: compute a market-signal score, a news-signal score, fuse them
//! with adaptive weights, apply hysteresis against the last emitted
//! forecast, gate emission, and calibrate confidence via a per-tf
//! logistic Platt fit.
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use crate::config::Settings;
use crate::models::event::EventCluster;
use crate::models::market::MarketSnapshot;
use crate::models::market_forecast::{Direction, FeatureContribution, Forecast, NewsClusterContribution, Target, Timeframe};

const MACRO_RISK_OFF_KEYWORDS: &[&str] = &["risk-off", "risk off", "flight to safety"];
const NEUTRAL_WEIGHT: f64 = 0.35;

/// One feature of the market signal: raw delta, direction sign for the
/// target, and the static weight from spec §4.2.
struct Feature {
    name: &'static str,
    value: f64,
    weight: f64,
}

fn target_direction_sign(target: Target, feature_name: &str) -> f64 {
    // STABLES inverts equity/risk features relative to the other
    // three targets (spec §4.2).
    if target == Target::Stables && matches!(feature_name, "qqq_delta" | "oil_delta" | "flow_score") {
        -1.0
    } else {
        1.0
    }
}

/// Weighted sum of clipped features, returns the score in `[-1, 1]`
/// plus the per-feature contribution breakdown for explainability.
pub fn market_signal(target: Target, snapshot: &MarketSnapshotInputs) -> (f64, Vec<FeatureContribution>) {
    let features = [
        Feature { name: "stable_dominance_delta", value: snapshot.stable_dominance_delta, weight: 0.15 },
        Feature { name: "dxy_delta", value: snapshot.dxy_delta, weight: 0.15 },
        Feature { name: "qqq_delta", value: snapshot.qqq_delta, weight: 0.15 },
        Feature { name: "oil_delta", value: snapshot.oil_delta, weight: 0.10 },
        Feature { name: "vix_level", value: snapshot.vix_level, weight: 0.10 },
        Feature { name: "btc_dominance_delta", value: snapshot.btc_dominance_delta, weight: 0.10 },
        Feature { name: "flow_score", value: snapshot.flow_score, weight: 0.10 },
        Feature { name: "funding_rate_z", value: snapshot.funding_rate_z, weight: 0.10 },
        Feature { name: "open_interest_delta", value: snapshot.open_interest_delta, weight: 0.05 },
        Feature { name: "macro_risk_off", value: if snapshot.macro_risk_off { 1.0 } else { 0.0 }, weight: 0.0 },
    ];

    let mut total = 0.0;
    let mut contributions = Vec::new();
    for feature in &features {
        let clipped = feature.value.clamp(-1.0, 1.0);
        let sign = target_direction_sign(target, feature.name);
        let contribution = clipped * feature.weight * sign;
        total += contribution;
        contributions.push(FeatureContribution {
            name: feature.name.to_string(),
            value: feature.value,
            weight: feature.weight,
            contribution,
        });
    }

    (total.clamp(-1.0, 1.0), contributions)
}

#[derive(Debug, Clone, Default)]
pub struct MarketSnapshotInputs {
    pub stable_dominance_delta: f64,
    pub dxy_delta: f64,
    pub qqq_delta: f64,
    pub oil_delta: f64,
    pub vix_level: f64,
    pub btc_dominance_delta: f64,
    pub flow_score: f64,
    pub funding_rate_z: f64,
    pub open_interest_delta: f64,
    pub macro_risk_off: bool,
}

impl MarketSnapshotInputs {
    /// Maps `MarketSnapshot.target` keys (as produced by
    /// `QuoteRouter::patch_snapshot`'s `SNAPSHOT_PATCH_MAP`) onto the
    /// named feature fields `market_signal` reads.
    ///
    /// `stable_dominance_delta`, `flow_score`, `funding_rate_z` and
    /// `open_interest_delta` have no quote-router equivalent (the
    /// router only serves spot price/change, not stablecoin dominance
    /// or derivatives-market data) and stay at their zero default.
    pub fn from_snapshots(snapshots: &[MarketSnapshot]) -> Self {
        let mut inputs = MarketSnapshotInputs::default();
        for snap in snapshots {
            let change = snap.change_pct_24h.unwrap_or(0.0) / 100.0;
            match snap.target.as_str() {
                "dxy" => inputs.dxy_delta = change,
                "qqq" | "nasdaq" => inputs.qqq_delta = change,
                "oil" => inputs.oil_delta = change,
                "btc" => inputs.btc_dominance_delta = change,
                "vix" => {
                    inputs.vix_level = ((snap.price - 20.0) / 20.0).clamp(-1.0, 1.0);
                    inputs.macro_risk_off = snap.price >= 30.0;
                }
                _ => {}
            }
        }
        inputs
    }
}

/// Aggregate active clusters (age < 3 × half-life) for `target` into a
/// news-signal score in `[-1, 1]`, keeping the top-3 |contribution|
/// clusters for explainability.
pub fn news_signal(
    target: Target,
    clusters: &[(EventCluster, f64)],
    half_life_hours: f64,
    now: DateTime<Utc>,
) -> (f64, Vec<NewsClusterContribution>) {
    let mut total = 0.0;
    let mut scored: Vec<(f64, NewsClusterContribution)> = Vec::new();

    for (cluster, relevance) in clusters {
        let age_hours = (now - cluster.ts_utc).num_minutes() as f64 / 60.0;
        if age_hours > 3.0 * half_life_hours || age_hours < 0.0 {
            continue;
        }
        let impact_norm = (cluster.impact / 100.0).clamp(0.0, 1.0);
        let cred_weight = cluster.credibility.clamp(0.0, 1.0);
        let decay = impact_norm * (-age_hours * 2f64.ln() / half_life_hours).exp() * cred_weight;

        let is_risk_off = MACRO_RISK_OFF_KEYWORDS.iter().any(|k| cluster.headline.to_lowercase().contains(k));
        let context_multiplier = if is_risk_off && cluster.direction < 0 {
            1.15
        } else if is_risk_off && cluster.direction > 0 {
            0.9
        } else {
            1.0
        };

        let contribution = if cluster.direction == 0 {
            decay * relevance * context_multiplier * NEUTRAL_WEIGHT
        } else {
            decay * relevance * context_multiplier * cluster.direction as f64
        };

        total += contribution;
        scored.push((
            contribution.abs(),
            NewsClusterContribution {
                cluster_id: cluster.cluster_id.clone(),
                headline: cluster.headline.clone(),
                contribution,
                tags: cluster.tags.clone(),
            },
        ));
    }

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap());
    let top3 = scored.into_iter().take(3).map(|(_, c)| c).collect();

    let _ = target;
    (total.clamp(-1.0, 1.0), top3)
}

/// Adaptive weight re-scaling: news weight scaled 0.75 on poor recent
/// calibration, 1.2 on strong calibration, renormalized against the
/// market weight.
pub fn adaptive_weights(base_market: f64, base_news: f64, recent_brier: Option<f64>, recent_hit_rate: Option<f64>) -> (f64, f64) {
    let mut news = base_news;
    if let (Some(brier), Some(hit_rate)) = (recent_brier, recent_hit_rate) {
        if brier >= 0.30 || hit_rate <= 0.45 {
            news *= 0.75;
        } else if brier <= 0.18 && hit_rate >= 0.55 {
            news *= 1.2;
        }
    }
    let total = base_market + news;
    if total <= 0.0 {
        (base_market, base_news)
    } else {
        (base_market / total, news / total)
    }
}

pub fn direction_for(raw_score: f64, neutral_band: f64) -> Direction {
    if raw_score.abs() < neutral_band {
        Direction::Neutral
    } else if raw_score > 0.0 {
        Direction::Up
    } else {
        Direction::Down
    }
}

/// Hysteresis: keeps the previous direction/score unless a major event
/// (impact ≥ 70) bypasses it, enough time has elapsed, or the
/// direction-flip magnitude clears `flip_hysteresis`.
pub fn apply_hysteresis(
    proposed_direction: Direction,
    proposed_raw: f64,
    previous: Option<(Direction, f64, DateTime<Utc>)>,
    now: DateTime<Utc>,
    min_hold_minutes: i64,
    flip_hysteresis: f64,
    major_event_in_window: bool,
) -> (Direction, f64) {
    let Some((prev_direction, prev_raw, prev_ts)) = previous else {
        return (proposed_direction, proposed_raw);
    };
    if major_event_in_window {
        return (proposed_direction, proposed_raw);
    }

    let elapsed_minutes = (now - prev_ts).num_minutes();
    let direction_flipped = proposed_direction != prev_direction;

    if direction_flipped && elapsed_minutes < min_hold_minutes {
        return (prev_direction, prev_raw);
    }
    if direction_flipped && (proposed_raw - prev_raw).abs() < flip_hysteresis {
        return (prev_direction, prev_raw);
    }
    (proposed_direction, proposed_raw)
}

/// Emission gating: emit only if no previous forecast, enough time
/// elapsed, direction changed, or confidence moved ≥ 0.10.
pub fn should_emit(
    previous: Option<(Direction, f64, DateTime<Utc>)>,
    direction: Direction,
    confidence: f64,
    now: DateTime<Utc>,
    tf_minutes: i64,
) -> bool {
    let Some((prev_direction, prev_confidence, prev_ts)) = previous else {
        return true;
    };
    let elapsed_minutes = (now - prev_ts).num_minutes();
    elapsed_minutes >= tf_minutes / 2
        || direction != prev_direction
        || (confidence - prev_confidence).abs() >= 0.10
}

/// Platt-calibrated confidence: `base = min_confidence + (1 - min_confidence) * min(1, |raw|)`,
/// refined by a logistic `sigma(a*|x| + b)` fitted with 200 SGD
/// iterations (lr 0.4, L2 0.01) over the last 7 days of
/// `(|raw_score|, hit)` pairs, skipped under 20 samples.
pub fn calibrate_confidence(raw_score: f64, min_confidence: f64, history: &[(f64, bool)]) -> f64 {
    let base = (min_confidence + (1.0 - min_confidence) * raw_score.abs().min(1.0)).clamp(min_confidence, 0.95);
    if history.len() < 20 {
        return base;
    }

    let (mut a, mut b) = (1.0f64, 0.0f64);
    let lr = 0.4;
    let l2 = 0.01;
    for _ in 0..200 {
        let mut grad_a = 0.0;
        let mut grad_b = 0.0;
        for (x, hit) in history {
            let y = if *hit { 1.0 } else { 0.0 };
            let z = a * x.abs() + b;
            let p = 1.0 / (1.0 + (-z).exp());
            let err = p - y;
            grad_a += err * x.abs();
            grad_b += err;
        }
        let n = history.len() as f64;
        grad_a = grad_a / n + l2 * a;
        grad_b = grad_b / n;
        a -= lr * grad_a;
        b -= lr * grad_b;
    }

    let z = a * raw_score.abs() + b;
    let calibrated = 1.0 / (1.0 + (-z).exp());
    calibrated.clamp(min_confidence, 0.95)
}

/// `score_expired_forecasts` — realized return / hit / Brier component
/// for one expired forecast. The original hardcodes `"BTC"` as the
/// reference asset for *every* target; preserved verbatim (DESIGN.md).
pub const EXPIRED_FORECAST_REFERENCE_ASSET: &str = "BTC";

pub fn score_expired(direction: Direction, confidence: f64, start_close: f64, end_close: f64, band: f64) -> (f64, bool, f64) {
    if start_close <= 0.0 {
        return (0.0, false, confidence.powi(2));
    }
    let realized_return = (end_close - start_close) / start_close;
    let hit = match direction {
        Direction::Up => realized_return > band,
        Direction::Down => realized_return < -band,
        Direction::Neutral => realized_return.abs() <= band,
    };
    let brier = (confidence - if hit { 1.0 } else { 0.0 }).powi(2);
    (realized_return, hit, brier)
}

pub fn build_forecast(
    settings: &Settings,
    tf: Timeframe,
    target: Target,
    raw_score: f64,
    confidence: f64,
    feature_contributions: Vec<FeatureContribution>,
    news_contributions: Vec<NewsClusterContribution>,
    now: DateTime<Utc>,
) -> Forecast {
    let direction = direction_for(raw_score, settings.neutral_band_pct());
    let rationale = format!(
        "{} over {}: raw_score={:.3}, confidence={:.2}, top drivers: {}",
        target.as_str(),
        tf.as_str(),
        raw_score,
        confidence,
        feature_contributions
            .iter()
            .map(|f| f.name.as_str())
            .take(3)
            .collect::<Vec<_>>()
            .join(", "),
    );
    Forecast {
        id: Uuid::new_v4().to_string(),
        ts_utc: now,
        tf,
        target,
        direction,
        raw_score,
        confidence,
        expires_at_utc: now + Duration::minutes(tf.minutes()),
        drivers: json!({
            "market_features": feature_contributions,
            "news_clusters": news_contributions,
        }),
        rationale_text: rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_neutral_within_band() {
        assert_eq!(direction_for(0.0005, 0.0015), Direction::Neutral);
    }

    #[test]
    fn hysteresis_keeps_previous_direction_within_hold_window() {
        let now = Utc::now();
        let previous = Some((Direction::Up, 0.30, now - Duration::minutes(20)));
        let (direction, raw) = apply_hysteresis(Direction::Down, -0.05, previous, now, 75, 0.12, false);
        assert_eq!(direction, Direction::Up);
        assert_eq!(raw, 0.30);
    }

    #[test]
    fn major_event_bypasses_hysteresis() {
        let now = Utc::now();
        let previous = Some((Direction::Up, 0.30, now - Duration::minutes(20)));
        let (direction, raw) = apply_hysteresis(Direction::Down, -0.40, previous, now, 75, 0.12, true);
        assert_eq!(direction, Direction::Down);
        assert_eq!(raw, -0.40);
    }

    #[test]
    fn emits_when_no_previous_forecast() {
        assert!(should_emit(None, Direction::Up, 0.6, Utc::now(), 60));
    }

    #[test]
    fn score_expired_hits_on_up_direction() {
        let (ret, hit, _) = score_expired(Direction::Up, 0.7, 100.0, 102.0, 0.0015);
        assert!(ret > 0.0);
        assert!(hit);
    }
}
