//! Scope and sector-impact tagging.
//!
//! Ported from `engine/sector_impact.py`: `infer_news_scope` detects a
//! macro/geopolitics/company/sector keyword class and escalates to
//! `SYSTEMIC` when signals compound; `infer_sector_impacts` applies the
//! per-sector rule table from [`crate::services::sector_config`] plus
//! the sector-giants override.
use crate::models::news::{NewsScope, SectorDirection, SectorImpact};
use crate::services::sector_config::{SECTOR_GIANTS, SECTOR_RULES};

const MACRO_KEYWORDS: &[&str] =
    &["inflation", "interest rate", "gdp", "central bank", "recession", "jobs report"];
const GEOPOLITICS_KEYWORDS: &[&str] =
    &["sanctions", "invasion", "ceasefire", "military", "war", "conflict", "treaty"];
const COMPANY_KEYWORDS: &[&str] = &["earnings", "ceo", "quarterly results", "merger", "acquisition"];

const UP_KEYWORDS: &[&str] = &["surge", "rally", "beat expectations", "growth", "record high", "expansion"];
const DOWN_KEYWORDS: &[&str] = &["plunge", "slump", "miss expectations", "decline", "record low", "contraction"];

/// `infer_news_scope` — returns the scope, a 0..100 `scope_score`, and
/// the signal list used to derive it. Compounding signals across two or
/// more classes escalate the scope to `SYSTEMIC`.
pub fn infer_news_scope(title: &str, body: &str) -> (NewsScope, u8, Vec<String>) {
    let text = format!("{title} {body}").to_lowercase();
    let mut signals = Vec::new();

    let macro_hit = MACRO_KEYWORDS.iter().any(|k| {
        if text.contains(k) {
            signals.push(format!("macro:{k}"));
            true
        } else {
            false
        }
    });
    let geo_hit = GEOPOLITICS_KEYWORDS.iter().any(|k| {
        if text.contains(k) {
            signals.push(format!("geopolitics:{k}"));
            true
        } else {
            false
        }
    });
    let company_hit = COMPANY_KEYWORDS.iter().any(|k| {
        if text.contains(k) {
            signals.push(format!("company:{k}"));
            true
        } else {
            false
        }
    });
    let sector_hit = SECTOR_RULES.iter().any(|rule| rule.required.iter().any(|k| text.contains(k)));

    let class_count = [macro_hit, geo_hit, company_hit, sector_hit].iter().filter(|h| **h).count();

    let scope = if class_count >= 2 {
        NewsScope::Systemic
    } else if geo_hit {
        NewsScope::Geopolitics
    } else if macro_hit {
        NewsScope::Macro
    } else if sector_hit {
        NewsScope::Sector
    } else if company_hit {
        NewsScope::Company
    } else {
        NewsScope::Unknown
    };

    let scope_score = match scope {
        NewsScope::Systemic => 90u8.saturating_add((signals.len() as u8).saturating_mul(2)).min(100),
        NewsScope::Geopolitics | NewsScope::Macro => 70,
        NewsScope::Sector => 55,
        NewsScope::Company => 40,
        NewsScope::Unknown => 10,
    };

    (scope, scope_score, signals)
}

/// `infer_sector_impacts` — up to 5 [`SectorImpact`] entries, ranked by
/// `impact_score` descending.
pub fn infer_sector_impacts(title: &str, body: &str) -> Vec<SectorImpact> {
    let text = format!("{title} {body}").to_lowercase();
    let mut impacts = Vec::new();

    for rule in SECTOR_RULES {
        if rule.exclude.iter().any(|k| text.contains(k)) {
            continue;
        }
        let required_hits = rule.required.iter().filter(|k| text.contains(*k)).count();
        if required_hits == 0 {
            continue;
        }
        let boost_hits = rule.boost.iter().filter(|k| text.contains(*k)).count();

        let direction = direction_for(&text);
        let confidence = (50 + required_hits * 15 + boost_hits * 5).min(100) as u8;
        let impact_score = (40 + required_hits * 20 + boost_hits * 5).min(100) as u8;

        impacts.push(SectorImpact {
            sector: rule.sector.to_string(),
            direction,
            confidence,
            rationale: format!("{} keyword hits matched sector rule for {}", required_hits, rule.sector),
            impact_score,
        });
    }

    for (name, sector) in SECTOR_GIANTS {
        if text.contains(name) && !impacts.iter().any(|i| i.sector == *sector) {
            impacts.push(SectorImpact {
                sector: sector.to_string(),
                direction: direction_for(&text),
                confidence: 60,
                rationale: format!("named flagship company '{name}' maps to sector {sector}"),
                impact_score: 55,
            });
        }
    }

    impacts.sort_by(|a, b| b.impact_score.cmp(&a.impact_score));
    impacts.truncate(5);
    impacts
}

fn direction_for(text: &str) -> SectorDirection {
    let up = UP_KEYWORDS.iter().any(|k| text.contains(k));
    let down = DOWN_KEYWORDS.iter().any(|k| text.contains(k));
    match (up, down) {
        (true, false) => SectorDirection::Up,
        (false, true) => SectorDirection::Down,
        (true, true) => SectorDirection::Mixed,
        (false, false) => SectorDirection::Neutral,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_geopolitics_scope() {
        let (scope, score, _) = infer_news_scope("Ceasefire talks begin amid ongoing conflict", "");
        assert_eq!(scope, NewsScope::Geopolitics);
        assert!(score >= 70);
    }

    #[test]
    fn compounding_signals_escalate_to_systemic() {
        let (scope, _, _) = infer_news_scope(
            "Inflation surges as sanctions escalate military conflict",
            "central bank warns of recession",
        );
        assert_eq!(scope, NewsScope::Systemic);
    }

    #[test]
    fn sector_giants_map_even_without_keywords() {
        let impacts = infer_sector_impacts("Nvidia announces new roadmap", "");
        assert!(impacts.iter().any(|i| i.sector == "TECHNOLOGY"));
    }

    #[test]
    fn caps_at_five_impacts() {
        let impacts = infer_sector_impacts(
            "oil gas opec barrel bank lender fda vaccine retail manufacturing blockchain token",
            "",
        );
        assert!(impacts.len() <= 5);
    }
}
