//! Portfolio engine (spec.md §4.5 / component H). Ported from
//! `app/services/portfolio_engine.py`'s valuation, risk, attribution
//! and optimizer stages, composed on top of the teacher's
//! `Portfolio`/`Position` domain rather than the original's single
//! hardcoded `DEFAULT_HOLDINGS` fixture (DESIGN.md).

use std::collections::HashMap;

use crate::models::event::EventCluster;
use crate::models::news::NewsItem;
use crate::models::portfolio_intel::{
    ActionDirection, Allocation, AttributionMethod, DataStatus, HoldingValuation, Horizon,
    OptimizerAction, OptimizerMode, OptimizerResult, RiskMetrics, SymbolNewsImpact, SymbolSignals,
};
use crate::models::Position;
use crate::services::news_engine::title_similarity;
use crate::services::quote_router::QuoteRouter;

const FUZZY_RATIO_THRESHOLD: f64 = 0.88;
const FUZZY_DROP_SYMBOL_COUNT: usize = 4;

/// Multi-word company names for the fuzzy attribution branch. A bare
/// ticker like "AAPL" can never clear a token-set Jaccard ratio against
/// a headline unless the headline spells the ticker out verbatim, in
/// which case the substring/entity branches already match first — the
/// fuzzy branch needs the longer-form name instead.
const TICKER_COMPANY_ALIASES: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc"),
    ("MSFT", "Microsoft Corporation"),
    ("GOOGL", "Alphabet Inc"),
    ("GOOG", "Alphabet Inc"),
    ("AMZN", "Amazon.com Inc"),
    ("TSLA", "Tesla Inc"),
    ("NVDA", "Nvidia Corporation"),
    ("META", "Meta Platforms"),
    ("NFLX", "Netflix Inc"),
    ("BTC", "Bitcoin"),
    ("ETH", "Ethereum"),
];

fn company_alias(ticker: &str) -> String {
    TICKER_COMPANY_ALIASES
        .iter()
        .find(|(t, _)| t.eq_ignore_ascii_case(ticker))
        .map(|(_, name)| name.to_lowercase())
        .unwrap_or_else(|| ticker.to_lowercase())
}
const MAX_WEIGHT_CAP: f64 = 0.30;
const MAX_CRYPTO_WEIGHT_CAP: f64 = 0.40;

/// §4.5 valuation: fetch each holding's price through the quote
/// router, convert to `base` via `USDTRY=X` when needed, mark
/// `data_status=missing` (but still include the row) when the price is
/// unavailable.
pub async fn value_holdings(
    router: &QuoteRouter,
    positions: &[Position],
    base: &str,
) -> (Vec<HoldingValuation>, Allocation) {
    let fx_rate = if base.eq_ignore_ascii_case("TRY") {
        router.get_quote("USDTRY=X").await.price
    } else {
        Some(1.0)
    };

    let mut rows = Vec::with_capacity(positions.len());
    let mut raw_values = Vec::with_capacity(positions.len());
    let mut total = 0.0;

    for position in positions {
        use bigdecimal::ToPrimitive;
        let shares = position.shares.to_f64().unwrap_or(0.0);
        let quote = router.get_quote(&position.ticker).await;
        let value = match (quote.price, fx_rate) {
            (Some(price), Some(fx)) if base.eq_ignore_ascii_case("TRY") => Some(price * shares * fx),
            (Some(price), _) => Some(price * shares),
            (None, _) => None,
        };
        if let Some(v) = value {
            total += v;
        }
        raw_values.push(value);
        rows.push(HoldingValuation {
            ticker: position.ticker.clone(),
            shares,
            price: quote.price,
            value,
            weight: 0.0,
            currency: base.to_string(),
            data_status: if quote.price.is_some() { DataStatus::Ok } else { DataStatus::Missing },
        });
    }

    let mut by_currency: HashMap<String, f64> = HashMap::new();
    if total > 0.0 {
        for (row, value) in rows.iter_mut().zip(raw_values.iter()) {
            row.weight = value.map(|v| v / total).unwrap_or(0.0);
        }
        *by_currency.entry("USD".to_string()).or_insert(0.0) += 1.0;
    }

    (rows, Allocation { by_currency })
}

/// §4.5 risk metrics: HHI, max weight, weighted `vol_30d`,
/// `var_95_1d = 1.65 * vol_30d`, FX-risk flag when USD exposure ≥ 0.50.
pub fn risk_metrics(holdings: &[HoldingValuation], per_symbol_vol_30d: &HashMap<String, f64>, usd_exposure: f64) -> RiskMetrics {
    let hhi: f64 = holdings.iter().map(|h| h.weight.powi(2)).sum();
    let max_weight = holdings.iter().map(|h| h.weight).fold(0.0, f64::max);

    let weighted_sum: f64 = holdings
        .iter()
        .filter_map(|h| per_symbol_vol_30d.get(&h.ticker).map(|v| v * h.weight))
        .sum();
    let weight_total: f64 = holdings
        .iter()
        .filter(|h| per_symbol_vol_30d.contains_key(&h.ticker))
        .map(|h| h.weight)
        .sum();

    let vol_30d = if weight_total > 0.0 {
        weighted_sum / weight_total
    } else if !per_symbol_vol_30d.is_empty() {
        per_symbol_vol_30d.values().sum::<f64>() / per_symbol_vol_30d.len() as f64
    } else {
        0.0
    };

    RiskMetrics {
        hhi,
        max_weight,
        vol_30d,
        var_95_1d: 1.65 * vol_30d,
        usd_exposure,
        fx_risk_up: usd_exposure >= 0.50,
    }
}

fn direction_sign(cluster: &EventCluster) -> f64 {
    cluster.direction as f64
}

fn low_signal(item: &NewsItem) -> bool {
    matches!(item.event_type, None | Some(crate::models::news::EventType::Other)) && item.impact_channel.is_empty()
}

/// §4.5 news-impact attribution: four direct methods in priority order
/// plus sector-indirect matches. `per_symbol_impact = relevance *
/// quality * recency * direction_sign * method_weight`, with
/// `low_signal` items downweighted ×0.25. If more than
/// `FUZZY_DROP_SYMBOL_COUNT` symbols match across the whole batch, all
/// fuzzy matches are dropped.
pub fn attribute_news_impact(
    items: &[(NewsItem, EventCluster)],
    tickers: &[String],
    sector_by_ticker: &HashMap<String, String>,
    now: chrono::DateTime<chrono::Utc>,
) -> Vec<SymbolNewsImpact> {
    let mut matched_symbols: std::collections::HashSet<String> = std::collections::HashSet::new();
    let mut raw: Vec<(SymbolNewsImpact, bool)> = Vec::new();

    for (item, cluster) in items {
        let age_hours = (now - item.published_at_utc.unwrap_or(now)).num_minutes() as f64 / 60.0;
        let recency = (1.0 - (age_hours / 72.0)).clamp(0.1, 1.0);
        let low = low_signal(item);
        let title_lower = item.title.to_lowercase();

        let mut direct_hit = false;
        for ticker in tickers {
            let ticker_lower = ticker.to_lowercase();
            let is_direct = item
                .entities
                .iter()
                .any(|e| e.eq_ignore_ascii_case(ticker))
                || regex_word_boundary(&title_lower, &ticker_lower);
            let method = if is_direct {
                direct_hit = true;
                Some(AttributionMethod::Direct)
            } else if item.entities.iter().any(|e| e.to_lowercase().contains(&ticker_lower)) {
                Some(AttributionMethod::Entity)
            } else if title_lower.contains(&ticker_lower) {
                Some(AttributionMethod::Title)
            } else if title_similarity(&title_lower, &company_alias(ticker)) >= FUZZY_RATIO_THRESHOLD {
                Some(AttributionMethod::Fuzzy)
            } else {
                None
            };

            if let Some(method) = method {
                matched_symbols.insert(ticker.clone());
                let mut impact = (item.relevance_score as f64 / 100.0)
                    * (item.quality_score as f64 / 100.0)
                    * recency
                    * direction_sign(cluster)
                    * method.weight();
                if low {
                    impact *= 0.25;
                }
                raw.push((
                    SymbolNewsImpact {
                        ticker: ticker.clone(),
                        cluster_id: cluster.cluster_id.clone(),
                        headline: item.title.clone(),
                        method,
                        impact,
                        is_indirect: false,
                    },
                    method == AttributionMethod::Fuzzy,
                ));
            }
        }
        let _ = direct_hit;

        for sector_impact in &item.sector_impacts {
            for (ticker, sector) in sector_by_ticker {
                if sector.eq_ignore_ascii_case(&sector_impact.sector) {
                    let mut impact = (item.relevance_score as f64 / 100.0)
                        * (item.quality_score as f64 / 100.0)
                        * recency
                        * (sector_impact.impact_score as f64 / 100.0)
                        * AttributionMethod::Sector.weight();
                    if matches!(sector_impact.direction, crate::models::news::SectorDirection::Down) {
                        impact = -impact;
                    }
                    if low {
                        impact *= 0.25;
                    }
                    raw.push((
                        SymbolNewsImpact {
                            ticker: ticker.clone(),
                            cluster_id: cluster.cluster_id.clone(),
                            headline: item.title.clone(),
                            method: AttributionMethod::Sector,
                            impact,
                            is_indirect: true,
                        },
                        false,
                    ));
                }
            }
        }
    }

    let drop_fuzzy = matched_symbols.len() > FUZZY_DROP_SYMBOL_COUNT;
    raw.into_iter()
        .filter(|(_, is_fuzzy)| !(*is_fuzzy && drop_fuzzy))
        .map(|(impact, _)| impact)
        .collect()
}

fn regex_word_boundary(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word == needle)
}

/// §4.5 optimizer: one horizon at a time. Applies the hold gate first;
/// otherwise scores every symbol, ranks increases/decreases, and caps
/// each `deltaWeight` at `min(turnover_cap/2, 0.03)`.
pub fn optimize(
    horizon: Horizon,
    signals: &[SymbolSignals],
    coverage_total: usize,
    coverage_ratio: f64,
    low_signal_ratio: f64,
) -> OptimizerResult {
    let turnover_cap = horizon.turnover_cap() * coverage_ratio.clamp(0.3, 1.0);

    if coverage_total == 0 {
        return hold(horizon, turnover_cap, coverage_ratio, "no_news_coverage");
    }
    if coverage_ratio < 0.20 {
        return hold(horizon, turnover_cap, coverage_ratio, "coverage_below_threshold");
    }
    if low_signal_ratio > 0.50 {
        return hold(horizon, turnover_cap, coverage_ratio, "low_signal_majority");
    }

    let mut scored: Vec<(&SymbolSignals, f64)> = signals.iter().map(|s| (s, s.score())).collect();
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let delta = (turnover_cap / 2.0).min(0.03);
    let mut actions = Vec::new();

    for (signal, score) in scored.iter().take(3) {
        if *score <= 0.0 {
            continue;
        }
        let cap = if signal.is_crypto { MAX_CRYPTO_WEIGHT_CAP } else { MAX_WEIGHT_CAP };
        if signal.current_weight + delta > cap {
            continue;
        }
        actions.push(OptimizerAction {
            ticker: signal.ticker.clone(),
            direction: ActionDirection::Increase,
            delta_weight: delta,
            score: *score,
            rationale: format!("composite score {:.3} favors increasing {}", score, signal.ticker),
        });
    }

    for (signal, score) in scored.iter().rev().take(3) {
        if *score >= 0.0 {
            continue;
        }
        actions.push(OptimizerAction {
            ticker: signal.ticker.clone(),
            direction: ActionDirection::Decrease,
            delta_weight: delta,
            score: *score,
            rationale: format!("composite score {:.3} favors decreasing {}", score, signal.ticker),
        });
    }

    OptimizerResult {
        horizon,
        mode: OptimizerMode::Active,
        actions,
        hold_reason: None,
        turnover_cap,
        coverage_ratio,
    }
}

fn hold(horizon: Horizon, turnover_cap: f64, coverage_ratio: f64, reason: &str) -> OptimizerResult {
    OptimizerResult {
        horizon,
        mode: OptimizerMode::Hold,
        actions: Vec::new(),
        hold_reason: Some(reason.to_string()),
        turnover_cap,
        coverage_ratio,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(ticker: &str, score_inputs: f64) -> SymbolSignals {
        SymbolSignals {
            ticker: ticker.to_string(),
            momentum_z7d: score_inputs,
            current_weight: 0.1,
            ..Default::default()
        }
    }

    #[test]
    fn hold_gate_triggers_on_zero_coverage() {
        let result = optimize(Horizon::Daily, &[signal("BTC", 0.5)], 0, 0.0, 0.0);
        assert_eq!(result.mode, OptimizerMode::Hold);
        assert!(result.actions.is_empty());
    }

    #[test]
    fn hold_gate_triggers_on_low_coverage_ratio() {
        let result = optimize(Horizon::Daily, &[signal("BTC", 0.5)], 5, 0.1, 0.1);
        assert_eq!(result.mode, OptimizerMode::Hold);
    }

    #[test]
    fn active_mode_scores_and_caps_turnover() {
        let signals = vec![signal("BTC", 0.9), signal("ETH", -0.9)];
        let result = optimize(Horizon::Daily, &signals, 10, 0.8, 0.1);
        assert_eq!(result.mode, OptimizerMode::Active);
        assert!(result.turnover_cap <= Horizon::Daily.turnover_cap());
        for action in &result.actions {
            assert!(action.delta_weight <= 0.03);
        }
    }

    #[test]
    fn risk_metrics_flags_fx_risk_above_threshold() {
        let holdings = vec![HoldingValuation {
            ticker: "AAPL".into(),
            shares: 10.0,
            price: Some(100.0),
            value: Some(1000.0),
            weight: 1.0,
            currency: "USD".into(),
            data_status: DataStatus::Ok,
        }];
        let metrics = risk_metrics(&holdings, &HashMap::new(), 0.6);
        assert!(metrics.fx_risk_up);
    }
}
