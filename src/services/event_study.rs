//! Pre/post price-reaction windows around a news event.
//!
//! Ported from `app/engine/event_study.py::compute_event_study`. Bars
//! are aligned to fixed-width buckets (the bar interval); an event's
//! "index 0" is the bucket containing its timestamp. `pre` looks back
//! one bucket, `post` looks forward across each requested timeframe.
//!
//! Deliberately preserves the original's `pre_post_ratio` quirk: when
//! the pre-window average is exactly zero, the ratio is hardcoded to
//! 1.0 rather than passed through the epsilon-guarded division — see
//! spec §9 and `DESIGN.md`.
use chrono::{DateTime, Utc};

use crate::models::event::PriceBar;
use crate::models::event_study::{CombinedMode, CombinedReaction, EventPoint, EventReactions, ReactionWindow};
use crate::models::market_forecast::Timeframe;
use crate::models::news::NewsItem;

const EPS: f64 = 1e-9;
/// Items below this relevance gate never enter `compute_event_study`.
const MIN_SCORE: u8 = 6;

/// Only items passing the event-study relevance gate ever enter
/// `compute_event_study` (spec §3 supplement).
pub fn passes_relevance_gate(item: &NewsItem) -> bool {
    item.score >= MIN_SCORE
}

fn aligned_index(bars: &[PriceBar], interval_minutes: i64, event_ts: DateTime<Utc>) -> Option<usize> {
    if bars.is_empty() {
        return None;
    }
    let start = bars[0].ts_utc;
    if event_ts < start {
        return None;
    }
    let elapsed_minutes = (event_ts - start).num_minutes();
    let idx = (elapsed_minutes / interval_minutes.max(1)) as usize;
    if idx < bars.len() {
        Some(idx)
    } else {
        None
    }
}

fn ret_pct(bars: &[PriceBar], from: usize, to: usize) -> Option<f64> {
    let (a, b) = (bars.get(from)?, bars.get(to)?);
    if a.close <= 0.0 {
        return None;
    }
    Some((b.close - a.close) / a.close * 100.0)
}

fn zscore_at(bars: &[PriceBar], idx: usize, window: usize) -> Option<f64> {
    if idx == 0 || idx >= bars.len() {
        return None;
    }
    let lo = idx.saturating_sub(window);
    let history: Vec<f64> = (lo..idx).filter_map(|i| ret_pct(bars, i, i + 1)).collect();
    if history.len() < 2 {
        return None;
    }
    let mean = history.iter().sum::<f64>() / history.len() as f64;
    let variance = history.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / history.len() as f64;
    let sigma = variance.sqrt();
    let current = ret_pct(bars, idx - 1, idx)?;
    if sigma <= EPS {
        None
    } else {
        Some((current - mean) / sigma)
    }
}

/// `pre_post_ratio` — verbatim preserved quirk: zero pre-average short
/// circuits to 1.0 instead of flowing through the epsilon-guarded
/// division.
pub fn pre_post_ratio(pre_avg: f64, post_avg: f64) -> f64 {
    if pre_avg == 0.0 {
        1.0
    } else {
        (post_avg + EPS) / (pre_avg + EPS)
    }
}

fn reactions_for_timeframe(bars: &[PriceBar], idx: usize, tf: Timeframe) -> (EventReactions, Vec<f64>, Vec<f64>) {
    let steps = (tf.minutes() / 15).max(1) as usize;
    let post_idx = (idx + steps).min(bars.len().saturating_sub(1));

    let pre_ret = if idx == 0 { Some(0.0) } else { ret_pct(bars, idx - 1, idx) };
    let post_ret = ret_pct(bars, idx, post_idx);
    let pre_z = if idx == 0 { Some(0.0) } else { zscore_at(bars, idx, 8) };
    let post_z = zscore_at(bars, post_idx.min(bars.len().saturating_sub(1)), 8);

    let mut post_map = std::collections::BTreeMap::new();
    post_map.insert(tf.as_str().to_string(), ReactionWindow { ret: post_ret, z: post_z });

    let around_ret = ret_pct(bars, idx.saturating_sub(steps), post_idx);
    let mut around_map = std::collections::BTreeMap::new();
    around_map.insert(tf.as_str().to_string(), ReactionWindow { ret: around_ret, z: None });

    let mut missing = Vec::new();
    if post_ret.is_none() {
        missing.push(format!("post.{} missing", tf.as_str()));
    }
    if around_ret.is_none() {
        missing.push(format!("around.{} missing", tf.as_str()));
    }

    let spark_pre: Vec<f64> = (idx.saturating_sub(4)..idx).filter_map(|i| bars.get(i).map(|b| b.close)).collect();
    let spark_post: Vec<f64> = (idx..(idx + 5).min(bars.len())).filter_map(|i| bars.get(i).map(|b| b.close)).collect();

    let data_status = if missing.is_empty() { "complete" } else { "partial" };

    let reactions = EventReactions {
        pre: ReactionWindow { ret: pre_ret, z: pre_z },
        post: post_map,
        around: around_map,
        pre_30m_ret: ret_pct(bars, idx.saturating_sub(2), idx),
        post_30m_ret: ret_pct(bars, idx, (idx + 2).min(bars.len().saturating_sub(1))),
        volume_z: bars.get(idx).map(|b| b.volume).unwrap_or(0.0),
        spark_pre,
        spark_post,
        data_status: data_status.to_string(),
        missing_fields: missing,
    };
    (reactions, vec![pre_ret.unwrap_or(0.0)], vec![post_ret.unwrap_or(0.0)])
}

fn combined_reaction(pre_avg: f64, post_avg: f64) -> CombinedReaction {
    let low_signal = pre_avg.abs() < 0.05 && post_avg.abs() < 0.05;
    let mode = if low_signal {
        CombinedMode::LowSignal
    } else if pre_avg >= 0.0 && post_avg >= 0.0 {
        CombinedMode::BothUp
    } else if pre_avg <= 0.0 && post_avg <= 0.0 {
        CombinedMode::BothDown
    } else {
        CombinedMode::Divergence
    };
    CombinedReaction {
        mode,
        severity: (pre_avg.abs() + post_avg.abs()) / 2.0,
    }
}

/// Build the event-study row for a single news item against one
/// asset's bar series, or `None` when the item fails the relevance
/// gate or has no aligned bar.
pub fn compute_event_study(item: &NewsItem, bars: &[PriceBar], timeframes: &[Timeframe]) -> Option<EventPoint> {
    if !passes_relevance_gate(item) {
        return None;
    }
    let event_ts = item.published_at_utc?;
    let idx = aligned_index(bars, 15, event_ts)?;

    let mut reactions = std::collections::BTreeMap::new();
    let mut all_pre = Vec::new();
    let mut all_post = Vec::new();
    for tf in timeframes {
        let (r, pre_vals, post_vals) = reactions_for_timeframe(bars, idx, *tf);
        all_pre.extend(pre_vals);
        all_post.extend(post_vals);
        reactions.insert(tf.as_str().to_string(), r);
    }

    let pre_avg = if all_pre.is_empty() { 0.0 } else { all_pre.iter().sum::<f64>() / all_pre.len() as f64 };
    let post_avg = if all_post.is_empty() { 0.0 } else { all_post.iter().sum::<f64>() / all_post.len() as f64 };
    let ratio = pre_post_ratio(pre_avg, post_avg);
    let combined = combined_reaction(pre_avg, post_avg);

    Some(EventPoint {
        id: item.dedup_cluster_id.clone().unwrap_or_else(|| item.canonical_url.clone()),
        title: item.title.clone(),
        ts_iso: event_ts.to_rfc3339(),
        timeframe: timeframes.first().map(|t| t.as_str().to_string()).unwrap_or_default(),
        volume_z: bars.get(idx).map(|b| b.volume).unwrap_or(0.0),
        pre_post_ratio: ratio,
        price_move_pct: post_avg,
        published_at_utc: event_ts.to_rfc3339(),
        published_at_tsi: event_ts.to_rfc3339(),
        scope: item.news_scope.map(|s| format!("{s:?}").to_uppercase()),
        sectors: item.sector_impacts.iter().map(|s| s.sector.clone()).collect(),
        reactions,
        combined,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(ts: DateTime<Utc>, close: f64) -> PriceBar {
        PriceBar { asset: "BTC".into(), ts_utc: ts, open: close, high: close, low: close, close, volume: 100.0 }
    }

    #[test]
    fn event_at_index_zero_has_zero_pre_return() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let bars = vec![bar(start, 100.0), bar(start + chrono::Duration::minutes(15), 101.0)];
        let event_ts = start + chrono::Duration::minutes(7);
        let idx = aligned_index(&bars, 15, event_ts).unwrap();
        assert_eq!(idx, 0);
        let (reactions, _, _) = reactions_for_timeframe(&bars, idx, Timeframe::M15);
        assert_eq!(reactions.pre.ret, Some(0.0));
        assert_eq!(reactions.post.get("15m").unwrap().ret, Some(1.0));
    }

    #[test]
    fn pre_post_ratio_zero_pre_avg_is_one() {
        assert_eq!(pre_post_ratio(0.0, 5.0), 1.0);
        assert_eq!(pre_post_ratio(0.0, -5.0), 1.0);
    }

    #[test]
    fn pre_post_ratio_nonzero_pre_uses_epsilon_division() {
        let ratio = pre_post_ratio(2.0, 2.0);
        assert!((ratio - 1.0).abs() < 1e-6);
    }
}
