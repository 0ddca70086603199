//! Actor-group registry and stance detection.
//!
//! Ported from `engine/person_impact.py` + `engine/labels.py`: a static
//! table of six actor groups, accent-insensitive alias folding, a
//! stance-detection rule table, and the `impact_potential`/`confidence`
//! scoring formula in [`score_person_impact`].
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::models::news::{PersonEvent, Stance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorGroup {
    CentralBankHeads,
    EuOfficials,
    RegionalPowerLeaders,
    Regulators,
    EnergyMinisters,
    DefenseSecurity,
}

impl ActorGroup {
    pub fn as_str(self) -> &'static str {
        match self {
            ActorGroup::CentralBankHeads => "CENTRAL_BANK_HEADS",
            ActorGroup::EuOfficials => "EU_OFFICIALS",
            ActorGroup::RegionalPowerLeaders => "REGIONAL_POWER_LEADERS",
            ActorGroup::Regulators => "REGULATORS",
            ActorGroup::EnergyMinisters => "ENERGY_MINISTERS",
            ActorGroup::DefenseSecurity => "DEFENSE_SECURITY",
        }
    }

    /// Tiered boost applied during entity tagging (§4.1): central bank
    /// heads and EU officials carry the heaviest weight, regulators and
    /// regional leaders the next tier, energy/defense the lightest.
    fn weight(self) -> f64 {
        match self {
            ActorGroup::CentralBankHeads => 12.0,
            ActorGroup::EuOfficials => 12.0,
            ActorGroup::RegionalPowerLeaders => 10.0,
            ActorGroup::Regulators => 10.0,
            ActorGroup::EnergyMinisters => 8.0,
            ActorGroup::DefenseSecurity => 8.0,
        }
    }
}

const CENTRAL_BANK_HEADS: &[&str] =
    &["Jerome Powell", "Christine Lagarde", "Andrew Bailey", "Kazuo Ueda", "Philip Lane"];
const EU_OFFICIALS: &[&str] = &["Ursula von der Leyen", "Charles Michel", "Josep Borrell", "Mario Draghi"];
const REGIONAL_POWER_LEADERS: &[&str] =
    &["Vladimir Putin", "Xi Jinping", "Joe Biden", "Donald Trump", "Mohammed bin Salman"];
const REGULATORS: &[&str] = &["Gary Gensler", "Andrew Bailey", "Christopher Giancarlo"];
const ENERGY_MINISTERS: &[&str] = &["Abdulaziz bin Salman", "Dan Brouillette"];
const DEFENSE_SECURITY: &[&str] = &["Lloyd Austin", "Jens Stoltenberg"];

const GROUPS: &[(ActorGroup, &[&str])] = &[
    (ActorGroup::CentralBankHeads, CENTRAL_BANK_HEADS),
    (ActorGroup::EuOfficials, EU_OFFICIALS),
    (ActorGroup::RegionalPowerLeaders, REGIONAL_POWER_LEADERS),
    (ActorGroup::Regulators, REGULATORS),
    (ActorGroup::EnergyMinisters, ENERGY_MINISTERS),
    (ActorGroup::DefenseSecurity, DEFENSE_SECURITY),
];

/// Diacritic-strip + lowercase a person's name via NFKD decomposition,
/// matching the original's `unicodedata.normalize("NFKD", ...)` fold.
pub fn canonical_person_name(raw: &str) -> String {
    raw.nfkd()
        .filter(|c| !c.is_ascii_punctuation() && !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_combining_mark(c: char) -> bool {
    matches!(c as u32, 0x0300..=0x036F)
}

/// Truncated SHA-256 of the canonicalized name, stable across runs.
pub fn person_id(canonical_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_name.as_bytes());
    format!("{:x}", hasher.finalize())[..16].to_string()
}

fn find_actor(text_lower: &str) -> Option<(String, ActorGroup)> {
    for (group, members) in GROUPS {
        for name in *members {
            let canonical = canonical_person_name(name);
            if text_lower.contains(&canonical) {
                return Some((name.to_string(), *group));
            }
        }
    }
    None
}

const HAWKISH_KEYWORDS: &[&str] = &["raise rates", "tighten", "hike", "inflation fight", "hawkish"];
const DOVISH_KEYWORDS: &[&str] = &["cut rates", "ease", "stimulus", "dovish", "accommodative"];
const RISK_ESCALATE_KEYWORDS: &[&str] =
    &["sanctions", "invasion", "military strike", "conflict", "escalat", "war"];
const RISK_DEESCALATE_KEYWORDS: &[&str] = &["ceasefire", "peace talks", "de-escalat", "truce", "withdrawal"];

/// Stance rule table (§4.1 + §2-supplement). Conflicting keyword classes
/// collapse to `Stance::Unknown` rather than guessing a winner.
pub fn detect_stance(text_lower: &str) -> Stance {
    let hawkish = HAWKISH_KEYWORDS.iter().any(|k| text_lower.contains(k));
    let dovish = DOVISH_KEYWORDS.iter().any(|k| text_lower.contains(k));
    let escalate = RISK_ESCALATE_KEYWORDS.iter().any(|k| text_lower.contains(k));
    let deescalate = RISK_DEESCALATE_KEYWORDS.iter().any(|k| text_lower.contains(k));

    let monetary_hit = hawkish != dovish;
    let risk_hit = escalate != deescalate;

    match (monetary_hit, risk_hit) {
        (true, false) => {
            if hawkish {
                Stance::Hawkish
            } else {
                Stance::Dovish
            }
        }
        (false, true) => {
            if escalate {
                Stance::RiskEscalate
            } else {
                Stance::RiskDeescalate
            }
        }
        (false, false) => {
            if hawkish || dovish || escalate || deescalate {
                Stance::Unknown
            } else {
                Stance::Neutral
            }
        }
        (true, true) => Stance::Unknown,
    }
}

struct ImpactMapping {
    impact_channel: Vec<String>,
    asset_class_bias: Vec<String>,
    rationale: &'static str,
    expected_direction: &'static str,
}

/// `(actor_group, stance) -> impact_channel / asset_class_bias / rationale`.
fn map_impact(group: ActorGroup, stance: Stance) -> ImpactMapping {
    match (group, stance) {
        (ActorGroup::CentralBankHeads, Stance::Hawkish) => ImpactMapping {
            impact_channel: vec!["rates".into(), "fx".into()],
            asset_class_bias: vec!["bonds_down".into(), "usd_up".into()],
            rationale: "hawkish central bank commentary tends to lift short rates and the dollar",
            expected_direction: "DOWN",
        },
        (ActorGroup::CentralBankHeads, Stance::Dovish) => ImpactMapping {
            impact_channel: vec!["rates".into(), "equities".into()],
            asset_class_bias: vec!["equities_up".into(), "usd_down".into()],
            rationale: "dovish central bank commentary eases financial conditions",
            expected_direction: "UP",
        },
        (ActorGroup::RegionalPowerLeaders, Stance::RiskEscalate) | (ActorGroup::DefenseSecurity, Stance::RiskEscalate) => ImpactMapping {
            impact_channel: vec!["geopolitics".into(), "energy".into()],
            asset_class_bias: vec!["oil_up".into(), "risk_assets_down".into()],
            rationale: "geopolitical escalation from a regional power typically lifts energy prices and risk aversion",
            expected_direction: "DOWN",
        },
        (ActorGroup::RegionalPowerLeaders, Stance::RiskDeescalate) | (ActorGroup::DefenseSecurity, Stance::RiskDeescalate) => ImpactMapping {
            impact_channel: vec!["geopolitics".into()],
            asset_class_bias: vec!["risk_assets_up".into()],
            rationale: "de-escalation reduces the geopolitical risk premium",
            expected_direction: "UP",
        },
        (ActorGroup::EnergyMinisters, _) => ImpactMapping {
            impact_channel: vec!["energy".into()],
            asset_class_bias: vec!["oil_volatility".into()],
            rationale: "energy ministry commentary moves supply expectations",
            expected_direction: "NEUTRAL",
        },
        (ActorGroup::Regulators, _) => ImpactMapping {
            impact_channel: vec!["regulation".into()],
            asset_class_bias: vec!["crypto_volatility".into()],
            rationale: "regulatory commentary moves compliance-sensitive assets",
            expected_direction: "NEUTRAL",
        },
        (ActorGroup::EuOfficials, _) => ImpactMapping {
            impact_channel: vec!["policy".into(), "fx".into()],
            asset_class_bias: vec!["eur_volatility".into()],
            rationale: "EU official commentary moves euro-area policy expectations",
            expected_direction: "NEUTRAL",
        },
        _ => ImpactMapping {
            impact_channel: vec!["macro".into()],
            asset_class_bias: vec![],
            rationale: "ambiguous stance, no directional mapping applied",
            expected_direction: "NEUTRAL",
        },
    }
}

/// `impact_potential`/`confidence` via group weight + stance strength +
/// numeric-shock bonus + recency bonus − ambiguity penalty, both
/// clamped to 0..100.
pub fn score_person_impact(group: ActorGroup, stance: Stance, has_numeric_shock: bool, age_hours: f64) -> (u8, u8) {
    let group_weight = group.weight();
    let stance_strength = match stance {
        Stance::Unknown | Stance::Neutral => 0.3,
        _ => 1.0,
    };
    let shock_bonus = if has_numeric_shock { 10.0 } else { 0.0 };
    let recency_bonus = (10.0 * (-0.1 * age_hours).exp()).max(0.0);
    let ambiguity_penalty = if matches!(stance, Stance::Unknown) { 20.0 } else { 0.0 };

    let impact = (group_weight * stance_strength * 5.0 + shock_bonus + recency_bonus - ambiguity_penalty)
        .clamp(0.0, 100.0);
    let confidence = (group_weight * stance_strength * 6.0 - ambiguity_penalty).clamp(0.0, 100.0);

    (impact.round() as u8, confidence.round() as u8)
}

fn has_numeric_shock(text: &str) -> bool {
    text.chars().any(|c| c.is_ascii_digit()) && (text.contains('%') || text.contains("bps") || text.contains("basis point"))
}

/// Detect a single governing [`PersonEvent`] for a news item, or `None`
/// when no registered actor is mentioned. Only one `PersonEvent` is
/// attached per item (the first/strongest actor match), matching the
/// teacher's one-slot `NewsItem.person_event` field.
pub fn detect_person_event(title: &str, body: &str) -> Option<PersonEvent> {
    let combined = format!("{title} {body}").to_lowercase();
    let (actor_name, group) = find_actor(&combined)?;
    let stance = detect_stance(&combined);
    let mapping = map_impact(group, stance);
    let (impact_potential, confidence) = score_person_impact(group, stance, has_numeric_shock(&combined), 0.0);

    Some(PersonEvent {
        actor_name: Some(actor_name.clone()),
        actor_id: Some(person_id(&canonical_person_name(&actor_name))),
        actor_group: Some(group.as_str().to_string()),
        statement_type: "public_statement".to_string(),
        stance,
        impact_channel: mapping.impact_channel,
        asset_class_bias: mapping.asset_class_bias,
        expected_direction_short_term: mapping.expected_direction.to_string(),
        impact_potential,
        confidence,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_accented_names() {
        assert_eq!(canonical_person_name("Christine Lagarde"), "christine lagarde");
    }

    #[test]
    fn detects_hawkish_stance() {
        assert_eq!(detect_stance("the chair said it is time to raise rates further"), Stance::Hawkish);
    }

    #[test]
    fn conflicting_keywords_collapse_to_unknown() {
        assert_eq!(detect_stance("plans to raise rates while announcing stimulus"), Stance::Unknown);
    }

    #[test]
    fn detects_registered_actor() {
        let event = detect_person_event("Jerome Powell signals rate hike ahead", "policy rate increase expected");
        assert!(event.is_some());
        assert_eq!(event.unwrap().stance, Stance::Hawkish);
    }

    #[test]
    fn no_match_returns_none() {
        assert!(detect_person_event("Local bakery wins award", "").is_none());
    }
}
