//! Daily equity-movers panel. Ported from
//! `app/engine/movers.py::build_daily_equity_movers`: buckets every
//! `EventItem` in an `EventFeed` by the US-equity tickers it touches,
//! scores each bucket by recency-weighted confidence plus a small
//! catalyst-keyword boost, and keeps the top 3.
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::movers::{
    DailyEquityMoverEvidence, DailyEquityMoverItem, DailyEquityMovers, DailyEquityMoversDebug, MoverDirection,
};
use crate::models::news::{EventFeed, EventItem};

const CATALYST_RULES: &[(&str, u32, &[&str])] = &[
    ("REGULATORY", 12, &["regulation", "regulatory", "sanction", "export control", "tariff", "ban"]),
    ("EARNINGS", 10, &["earnings", "guidance", "results", "forecast", "outlook"]),
    ("M&A", 8, &["merger", "acquire", "acquisition", "deal", "buyout"]),
    ("ETF_FLOW", 6, &["flow", "inflow", "outflow", "etf"]),
    ("CYBER", 9, &["hack", "breach", "exploit", "ransomware"]),
];

const DIRECTION_POS_WORDS: &[&str] = &["approval", "approved", "beat", "beats", "contract", "order", "inflow", "upgrade"];
const DIRECTION_NEG_WORDS: &[&str] = &["ban", "sanction", "cut", "breach", "hack", "exploit", "outflow", "lawsuit", "fine"];

fn is_us_ticker(ticker: &str) -> bool {
    !ticker.is_empty()
        && ticker.len() <= 5
        && ticker.chars().all(|c| c.is_ascii_alphabetic())
        && ticker.chars().all(|c| c.is_ascii_uppercase())
}

fn recency_weight(ts: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = (now - ts).num_minutes() as f64 / 60.0;
    if hours <= 1.0 {
        1.0
    } else if hours <= 6.0 {
        0.8
    } else if hours <= 24.0 {
        0.6
    } else {
        0.4
    }
}

fn extract_catalysts(text: &str) -> Vec<(&'static str, u32)> {
    CATALYST_RULES
        .iter()
        .filter(|(_, _, keywords)| keywords.iter().any(|k| text.contains(k)))
        .map(|(label, weight, _)| (*label, *weight))
        .collect()
}

fn direction_from_text(text: &str) -> i32 {
    if DIRECTION_NEG_WORDS.iter().any(|k| text.contains(k)) {
        -1
    } else if DIRECTION_POS_WORDS.iter().any(|k| text.contains(k)) {
        1
    } else {
        0
    }
}

struct Bucket<'a> {
    events: Vec<&'a EventItem>,
    catalysts: HashMap<&'static str, u32>,
    direction_score: i32,
}

/// Builds the top-3 daily equity-movers panel from a `EventFeed`
/// already assembled by `services::news_engine::build_event_feed`.
pub fn build_daily_equity_movers(event_feed: &EventFeed, now: DateTime<Utc>) -> DailyEquityMovers {
    let mut candidates_seen = 0u32;
    let mut dropped_non_us = 0u32;
    let mut groups: HashMap<&str, Bucket> = HashMap::new();

    let all_events: Vec<&EventItem> = event_feed
        .regional
        .iter()
        .chain(event_feed.company.iter())
        .chain(event_feed.sector.iter())
        .chain(event_feed.personal.iter())
        .collect();

    for event in &all_events {
        for asset in &event.impacted_assets {
            if !is_us_ticker(asset) {
                dropped_non_us += 1;
                continue;
            }
            candidates_seen += 1;
            let text = event.headline.to_lowercase();
            let bucket = groups.entry(asset.as_str()).or_insert_with(|| Bucket {
                events: Vec::new(),
                catalysts: HashMap::new(),
                direction_score: 0,
            });
            bucket.events.push(event);
            for (label, weight) in extract_catalysts(&text) {
                let entry = bucket.catalysts.entry(label).or_insert(0);
                *entry = (*entry).max(weight);
            }
            bucket.direction_score += direction_from_text(&text);
        }
    }

    let mut items: Vec<DailyEquityMoverItem> = groups
        .into_iter()
        .map(|(ticker, bucket)| {
            let mut score_sum = 0.0;
            let mut max_confidence = 0u8;
            for event in &bucket.events {
                let weight = recency_weight(event.ts_utc, now);
                score_sum += event.confidence as f64 * weight;
                max_confidence = max_confidence.max(event.confidence);
            }

            let mut catalyst_items: Vec<(&str, u32)> = bucket.catalysts.into_iter().collect();
            catalyst_items.sort_by(|a, b| b.1.cmp(&a.1));
            let catalyst_boost: f64 = catalyst_items.iter().take(2).map(|(_, w)| *w as f64).sum();

            let move_score = (score_sum / bucket.events.len().max(1) as f64 + catalyst_boost)
                .round()
                .clamp(0.0, 100.0) as u8;
            let expected_move_band_pct = (1.0 + (move_score as f64 / 100.0) * 3.0 * 10.0).round() / 10.0;

            let direction = if bucket.direction_score > 0 {
                MoverDirection::Up
            } else if bucket.direction_score < 0 {
                MoverDirection::Down
            } else {
                MoverDirection::Neutral
            };

            let mut evidence: Vec<&EventItem> = bucket.events.clone();
            evidence.sort_by(|a, b| b.confidence.cmp(&a.confidence).then(b.ts_utc.cmp(&a.ts_utc)));
            let evidence = evidence
                .into_iter()
                .take(3)
                .map(|e| DailyEquityMoverEvidence {
                    event_id: e.cluster_id.clone(),
                    category: e.category,
                    confidence: e.confidence,
                })
                .collect();

            DailyEquityMoverItem {
                ticker: ticker.to_string(),
                expected_direction: direction,
                expected_move_band_pct,
                move_score,
                confidence: max_confidence,
                catalysts: catalyst_items.into_iter().take(2).map(|(l, _)| l.to_string()).collect(),
                evidence,
            }
        })
        .collect();

    items.sort_by(|a, b| b.move_score.cmp(&a.move_score).then(b.confidence.cmp(&a.confidence)).then(a.ticker.cmp(&b.ticker)));
    items.truncate(3);

    let reason_if_empty = if items.is_empty() {
        Some(if candidates_seen == 0 { "NO_US_TICKERS".to_string() } else { "DATA_LOW_SIGNAL".to_string() })
    } else {
        None
    };

    DailyEquityMovers {
        asof: now,
        items,
        debug: DailyEquityMoversDebug { candidates_seen, dropped_non_us, reason_if_empty },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::news::{EventCategory, EventItem};

    fn event(ticker: &str, headline: &str, confidence: u8, age_hours: i64, now: DateTime<Utc>) -> EventItem {
        EventItem {
            cluster_id: format!("cl-{ticker}-{headline}"),
            category: EventCategory::Company,
            headline: headline.to_string(),
            ts_utc: now - chrono::Duration::hours(age_hours),
            impacted_assets: vec![ticker.to_string()],
            confidence,
        }
    }

    #[test]
    fn ranks_highest_confidence_ticker_first() {
        let now = Utc::now();
        let mut feed = EventFeed::default();
        feed.company.push(event("AAPL", "Apple beats earnings guidance", 90, 1, now));
        feed.company.push(event("XYZ", "Minor update", 20, 20, now));
        let movers = build_daily_equity_movers(&feed, now);
        assert_eq!(movers.items[0].ticker, "AAPL");
    }

    #[test]
    fn drops_non_us_tickers() {
        let now = Utc::now();
        let mut feed = EventFeed::default();
        feed.company.push(event("XU100.IS", "BIST rallies", 50, 1, now));
        let movers = build_daily_equity_movers(&feed, now);
        assert!(movers.items.is_empty());
        assert_eq!(movers.debug.dropped_non_us, 1);
        assert_eq!(movers.debug.reason_if_empty.as_deref(), Some("NO_US_TICKERS"));
    }
}
