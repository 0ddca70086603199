use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role a provider plays in a single debate round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebateRole {
    Primary,
    Challenger,
    Referee,
}

/// Frozen inputs a debate round is run against: the holdings snapshot,
/// the active forecasts, and the top event clusters, all as of the
/// moment the debate was requested. Hashed to `context_hash` for the
/// cooldown/cache key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateContext {
    pub portfolio_id: String,
    pub holdings: Value,
    pub forecasts: Value,
    pub top_events: Value,
    pub generated_at: DateTime<Utc>,
}

impl DebateContext {
    /// sha256 of the canonical JSON encoding of the fields that affect
    /// the debate's substance (excludes `generated_at`).
    pub fn context_hash(&self) -> String {
        use sha2::{Digest, Sha256};
        let canonical = serde_json::json!({
            "portfolio_id": self.portfolio_id,
            "holdings": self.holdings,
            "forecasts": self.forecasts,
            "top_events": self.top_events,
        });
        let bytes = serde_json::to_vec(&canonical).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateArgument {
    pub role: DebateRole,
    pub stance: String,
    pub thesis: String,
    pub supporting_points: Vec<String>,
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateScore {
    pub evidence_grounding: f64,
    pub internal_consistency: f64,
    pub actionability: f64,
    pub total: f64,
}

/// The verdict a referee pass (or the scoring rubric, when no referee
/// is configured) renders for a single round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateVerdict {
    pub winner: DebateRole,
    pub rationale: String,
    pub primary_score: DebateScore,
    pub challenger_score: DebateScore,
}

/// A single produced debate, cached under `context_hash` for the
/// cooldown window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebatePlan {
    pub portfolio_id: String,
    pub context_hash: String,
    pub primary: DebateArgument,
    pub challenger: DebateArgument,
    pub verdict: DebateVerdict,
    pub recommendation: String,
    pub generated_at: DateTime<Utc>,
    pub from_cache: bool,
}
