//! Debate engine (spec.md §4.6 / component I): builds a deterministic
//! context for a `(base, window, horizon)` triple, runs it past two LLM
//! providers in parallel, scores the resulting plans, and optionally
//! has a third "referee" provider break ties or judge a lone survivor.
//!
//! Ported from `app/services/debate_engine.py`. The LLM transport
//! mechanics (timeout, retry, JSON parsing) are the teacher's
//! `services/llm_service.rs` `LlmProvider` trait, generalized here from
//! one provider to named `primary`/`challenger`/`referee` roles. Cache
//! and single-flight state is an explicitly-scoped `DashMap` owned by
//! this engine instance, matching `quote_router.rs` (spec.md §9
//! "ambient module-level caches").

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Notify;
use tracing::warn;

use crate::errors::EngineNotes;
use crate::models::debate::{DebateArgument, DebateContext, DebatePlan, DebateRole, DebateScore, DebateVerdict};
use crate::services::llm_service::LlmProvider;

const CACHE_TTL_S: i64 = 21_600;
const COOLDOWN_S: i64 = 600;
pub const PROVIDER_TIMEOUT_S: u64 = 8;
pub const TOTAL_DEBATE_TIMEOUT_S: u64 = 10;
const TIE_THRESHOLD: f64 = 5.0;
const MAX_EXECUTIVE_SUMMARY: usize = 5;
const MAX_TRIM_SIGNALS: usize = 3;
const MAX_EVIDENCE_IDS_PER_SIGNAL: usize = 3;
const MIN_EVIDENCE_IDS_PER_SIGNAL: usize = 1;
const MAX_SECTOR_FOCUS: usize = 3;
const MAX_SCENARIO_ITEMS: usize = 3;

fn cache_key(base: &str, window: &str, horizon: &str, context_hash: &str) -> String {
    format!("{base}:{window}:{horizon}:{}", &context_hash[..context_hash.len().min(16)])
}

fn cooldown_key(base: &str, window: &str, horizon: &str) -> String {
    format!("{base}:{window}:{horizon}")
}

struct CacheEntry {
    plan: DebatePlan,
    expires_at: i64,
}

/// A single candidate plan an LLM provider returned, validated against
/// the strict JSON schema spec.md §4.6 describes.
#[derive(Debug, Clone, Deserialize)]
pub struct PlanSchema {
    #[serde(rename = "executiveSummary")]
    pub executive_summary: Vec<String>,
    #[serde(rename = "trimSignals")]
    pub trim_signals: Vec<TrimSignal>,
    #[serde(rename = "sectorFocus")]
    pub sector_focus: Vec<String>,
    pub scenarios: Scenarios,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrimSignal {
    pub symbol: String,
    pub rationale: String,
    #[serde(rename = "evidence_ids")]
    pub evidence_ids: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenarios {
    pub base: Vec<String>,
    pub risk: Vec<String>,
}

impl PlanSchema {
    /// Enforces the schema's list-length caps; truncates rather than
    /// rejecting so a slightly-over-generous provider still counts.
    fn clamp(mut self) -> Self {
        self.executive_summary.truncate(MAX_EXECUTIVE_SUMMARY);
        self.trim_signals.truncate(MAX_TRIM_SIGNALS);
        for signal in &mut self.trim_signals {
            signal.evidence_ids.truncate(MAX_EVIDENCE_IDS_PER_SIGNAL);
        }
        self.sector_focus.truncate(MAX_SECTOR_FOCUS);
        self.scenarios.base.truncate(MAX_SCENARIO_ITEMS);
        self.scenarios.risk.truncate(MAX_SCENARIO_ITEMS);
        self
    }

    fn evidence_ids_valid(&self, known_ids: &[String]) -> bool {
        self.trim_signals.iter().all(|s| {
            s.evidence_ids.len() >= MIN_EVIDENCE_IDS_PER_SIGNAL
                && s.evidence_ids.iter().all(|id| known_ids.contains(id))
        })
    }
}

fn constraint_compliance_score(plan: &PlanSchema, known_ids: &[String], turnover_cap: f64, hold_mode: bool) -> f64 {
    let mut score = 100.0;
    if hold_mode && !plan.trim_signals.is_empty() {
        score -= 40.0;
    }
    if !plan.evidence_ids_valid(known_ids) {
        score -= 30.0;
    }
    let implied_turnover = plan.trim_signals.len() as f64 * 0.03;
    if implied_turnover > turnover_cap {
        score -= 20.0;
    }
    score.max(0.0)
}

fn evidence_consistency_score(plan: &PlanSchema, known_ids: &[String]) -> f64 {
    if plan.trim_signals.is_empty() {
        return 80.0;
    }
    let total: usize = plan.trim_signals.iter().map(|s| s.evidence_ids.len()).sum();
    let valid: usize = plan
        .trim_signals
        .iter()
        .flat_map(|s| s.evidence_ids.iter())
        .filter(|id| known_ids.contains(id))
        .count();
    if total == 0 { 0.0 } else { (valid as f64 / total as f64) * 100.0 }
}

fn pointer_overlap_score(a: &PlanSchema, b: &PlanSchema) -> f64 {
    let ids_a: std::collections::HashSet<_> =
        a.trim_signals.iter().flat_map(|s| s.evidence_ids.iter().cloned()).collect();
    let ids_b: std::collections::HashSet<_> =
        b.trim_signals.iter().flat_map(|s| s.evidence_ids.iter().cloned()).collect();
    if ids_a.is_empty() && ids_b.is_empty() {
        return 100.0;
    }
    let overlap = ids_a.intersection(&ids_b).count();
    let union = ids_a.union(&ids_b).count();
    if union == 0 { 100.0 } else { (overlap as f64 / union as f64) * 100.0 }
}

fn turnover_preference_score(plan: &PlanSchema, turnover_cap: f64) -> f64 {
    let implied = plan.trim_signals.len() as f64 * 0.03;
    if turnover_cap <= 0.0 {
        return if plan.trim_signals.is_empty() { 100.0 } else { 0.0 };
    }
    (100.0 - (implied / turnover_cap * 100.0).min(100.0)).max(0.0)
}

fn score_plan(plan: &PlanSchema, other: &PlanSchema, known_ids: &[String], turnover_cap: f64, hold_mode: bool) -> DebateScore {
    let evidence_grounding = evidence_consistency_score(plan, known_ids);
    let internal_consistency = constraint_compliance_score(plan, known_ids, turnover_cap, hold_mode);
    let pointer_overlap = pointer_overlap_score(plan, other);
    let turnover_pref = turnover_preference_score(plan, turnover_cap);
    let total = 0.35 * internal_consistency + 0.30 * evidence_grounding + 0.20 * pointer_overlap + 0.15 * turnover_pref;
    DebateScore {
        evidence_grounding,
        internal_consistency,
        actionability: turnover_pref,
        total,
    }
}

fn build_prompt(context: &DebateContext, role: DebateRole) -> String {
    let stance = match role {
        DebateRole::Primary => "Argue for the plan you believe best serves the portfolio's stated constraints.",
        DebateRole::Challenger => "Argue for an alternative plan, actively looking for weaknesses in a conservative hold-steady approach.",
        DebateRole::Referee => "Judge which of two plans better serves the portfolio's constraints.",
    };
    format!(
        "{stance}\n\nContext (JSON):\n{}\n\nRespond ONLY with JSON matching: {{\"executiveSummary\": [string, max {MAX_EXECUTIVE_SUMMARY}], \"trimSignals\": [{{\"symbol\": string, \"rationale\": string, \"evidence_ids\": [string, 1-{MAX_EVIDENCE_IDS_PER_SIGNAL}]}}, max {MAX_TRIM_SIGNALS}], \"sectorFocus\": [string, max {MAX_SECTOR_FOCUS}], \"scenarios\": {{\"base\": [string, max {MAX_SCENARIO_ITEMS}], \"risk\": [string, max {MAX_SCENARIO_ITEMS}]}}}}",
        serde_json::to_string(context).unwrap_or_default(),
    )
}

fn parse_plan(raw: &str) -> Option<PlanSchema> {
    let trimmed = raw.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
    serde_json::from_str::<PlanSchema>(trimmed.trim()).ok().map(PlanSchema::clamp)
}

fn plan_to_argument(role: DebateRole, plan: &PlanSchema) -> DebateArgument {
    DebateArgument {
        role,
        stance: if matches!(role, DebateRole::Challenger) { "challenger".to_string() } else { "primary".to_string() },
        thesis: plan.executive_summary.first().cloned().unwrap_or_default(),
        supporting_points: plan.executive_summary.clone(),
        risks: plan.scenarios.risk.clone(),
    }
}

async fn call_with_timeout(provider: &dyn LlmProvider, prompt: String) -> Option<PlanSchema> {
    match tokio::time::timeout(Duration::from_secs(PROVIDER_TIMEOUT_S), provider.generate_completion(prompt)).await {
        Ok(Ok(text)) => parse_plan(&text),
        Ok(Err(e)) => {
            warn!("debate provider call failed: {e}");
            None
        }
        Err(_) => {
            warn!("debate provider call timed out");
            None
        }
    }
}

/// Tracks in-cache plans, the last-result-always key, per-key cooldown
/// timestamps, and a process-local single-flight map so concurrent
/// callers for the same key wait on one in-flight computation instead
/// of duplicating LLM spend.
pub struct DebateEngine {
    primary: Arc<dyn LlmProvider>,
    challenger: Arc<dyn LlmProvider>,
    referee: Option<Arc<dyn LlmProvider>>,
    cache: DashMap<String, CacheEntry>,
    last: DashMap<String, DebatePlan>,
    cooldowns: DashMap<String, i64>,
    in_flight: DashMap<String, Arc<Notify>>,
    in_flight_lock: Mutex<()>,
}

impl DebateEngine {
    pub fn new(primary: Arc<dyn LlmProvider>, challenger: Arc<dyn LlmProvider>, referee: Option<Arc<dyn LlmProvider>>) -> Self {
        Self {
            primary,
            challenger,
            referee,
            cache: DashMap::new(),
            last: DashMap::new(),
            cooldowns: DashMap::new(),
            in_flight: DashMap::new(),
            in_flight_lock: Mutex::new(()),
        }
    }

    pub fn last_result(&self, base: &str, window: &str, horizon: &str) -> Option<DebatePlan> {
        self.last.get(&cooldown_key(base, window, horizon)).map(|e| e.clone())
    }

    /// Runs (or returns a cached/single-flighted) debate for the given
    /// context. `force=true` bypasses the cooldown but never bypasses
    /// the TTL cache lookup for a still-fresh `context_hash`.
    pub async fn run(&self, base: &str, window: &str, horizon: &str, context: DebateContext, force: bool, notes: &mut EngineNotes) -> DebatePlan {
        let context_hash = context.context_hash();
        let key = cache_key(base, window, horizon, &context_hash);
        let cd_key = cooldown_key(base, window, horizon);
        let now = Utc::now().timestamp();

        if let Some(entry) = self.cache.get(&key) {
            if entry.expires_at > now {
                let mut plan = entry.plan.clone();
                plan.from_cache = true;
                return plan;
            }
        }

        if !force {
            if let Some(since) = self.cooldowns.get(&cd_key) {
                if now - *since < COOLDOWN_S {
                    if let Some(plan) = self.last.get(&cd_key) {
                        let mut plan = plan.clone();
                        plan.from_cache = true;
                        return plan;
                    }
                }
            }
        }

        let notify = {
            let _guard = self.in_flight_lock.lock();
            if let Some(existing) = self.in_flight.get(&key) {
                Some(existing.clone())
            } else {
                self.in_flight.insert(key.clone(), Arc::new(Notify::new()));
                None
            }
        };

        if let Some(notify) = notify {
            notify.notified().await;
            if let Some(entry) = self.cache.get(&key) {
                let mut plan = entry.plan.clone();
                plan.from_cache = true;
                return plan;
            }
        }

        let result = tokio::time::timeout(
            Duration::from_secs(TOTAL_DEBATE_TIMEOUT_S),
            self.compute(base, window, horizon, &context, &context_hash, notes),
        )
        .await;

        let plan = match result {
            Ok(plan) => plan,
            Err(_) => {
                notes.budget_exceeded("debate");
                self.fallback_plan(base, &context_hash)
            }
        };

        self.cache.insert(key.clone(), CacheEntry { plan: plan.clone(), expires_at: now + CACHE_TTL_S });
        self.last.insert(cd_key.clone(), plan.clone());
        self.cooldowns.insert(cd_key, now);
        if let Some((_, notify)) = self.in_flight.remove(&key) {
            notify.notify_waiters();
        }

        plan
    }

    fn fallback_plan(&self, portfolio_id: &str, context_hash: &str) -> DebatePlan {
        let empty = DebateArgument {
            role: DebateRole::Primary,
            stance: "unavailable".to_string(),
            thesis: "Debate could not complete within budget".to_string(),
            supporting_points: vec![],
            risks: vec![],
        };
        DebatePlan {
            portfolio_id: portfolio_id.to_string(),
            context_hash: context_hash.to_string(),
            primary: empty.clone(),
            challenger: empty,
            verdict: DebateVerdict {
                winner: DebateRole::Primary,
                rationale: "budget_exceeded".to_string(),
                primary_score: DebateScore { evidence_grounding: 0.0, internal_consistency: 0.0, actionability: 0.0, total: 0.0 },
                challenger_score: DebateScore { evidence_grounding: 0.0, internal_consistency: 0.0, actionability: 0.0, total: 0.0 },
            },
            recommendation: "hold".to_string(),
            generated_at: Utc::now(),
            from_cache: false,
        }
    }

    async fn compute(&self, portfolio_id: &str, _window: &str, horizon: &str, context: &DebateContext, context_hash: &str, notes: &mut EngineNotes) -> DebatePlan {
        let known_ids = evidence_ids(context);
        let turnover_cap = turnover_cap_for(horizon);
        let hold_mode = context
            .holdings
            .get("optimizer_mode")
            .and_then(Value::as_str)
            .map(|m| m.eq_ignore_ascii_case("hold"))
            .unwrap_or(false);

        let primary_prompt = build_prompt(context, DebateRole::Primary);
        let challenger_prompt = build_prompt(context, DebateRole::Challenger);

        let (primary_plan, challenger_plan) = tokio::join!(
            call_with_timeout(self.primary.as_ref(), primary_prompt),
            call_with_timeout(self.challenger.as_ref(), challenger_prompt),
        );

        match (primary_plan, challenger_plan) {
            (Some(p), Some(c)) => {
                let p_score = score_plan(&p, &c, &known_ids, turnover_cap, hold_mode);
                let c_score = score_plan(&c, &p, &known_ids, turnover_cap, hold_mode);
                let delta = (p_score.total - c_score.total).abs();

                let mut winner = if p_score.total >= c_score.total { DebateRole::Primary } else { DebateRole::Challenger };
                let mut rationale = format!("primary={:.1} challenger={:.1}", p_score.total, c_score.total);

                if delta < TIE_THRESHOLD {
                    if let Some(referee) = &self.referee {
                        notes.note("debate_referee_judge");
                        if let Some(verdict) = self.referee_judge(referee.as_ref(), context, &p, &c).await {
                            winner = verdict.0;
                            rationale = verdict.1;
                        } else {
                            notes.provider_error("referee", crate::errors::ProviderErrorKind::Timeout, "judge_pass_failed");
                        }
                    } else {
                        rationale = format!("tie within {TIE_THRESHOLD}: {rationale}");
                    }
                }

                let recommendation = match winner {
                    DebateRole::Primary => p.executive_summary.first().cloned().unwrap_or_default(),
                    _ => c.executive_summary.first().cloned().unwrap_or_default(),
                };

                DebatePlan {
                    portfolio_id: portfolio_id.to_string(),
                    context_hash: context_hash.to_string(),
                    primary: plan_to_argument(DebateRole::Primary, &p),
                    challenger: plan_to_argument(DebateRole::Challenger, &c),
                    verdict: DebateVerdict { winner, rationale, primary_score: p_score, challenger_score: c_score },
                    recommendation,
                    generated_at: Utc::now(),
                    from_cache: false,
                }
            }
            (Some(p), None) => {
                notes.provider_error("challenger", crate::errors::ProviderErrorKind::Schema, "invalid_plan");
                self.analyst_fallback(portfolio_id, context_hash, DebateRole::Primary, &p, &known_ids, turnover_cap, hold_mode, notes).await
            }
            (None, Some(c)) => {
                notes.provider_error("primary", crate::errors::ProviderErrorKind::Schema, "invalid_plan");
                self.analyst_fallback(portfolio_id, context_hash, DebateRole::Challenger, &c, &known_ids, turnover_cap, hold_mode, notes).await
            }
            (None, None) => {
                notes.provider_error("primary", crate::errors::ProviderErrorKind::Schema, "invalid_plan");
                notes.provider_error("challenger", crate::errors::ProviderErrorKind::Schema, "invalid_plan");
                self.fallback_plan(portfolio_id, context_hash)
            }
        }
    }

    /// Only one provider returned a usable plan: referee (if configured)
    /// runs in `analyst` mode, otherwise the lone plan wins by default.
    #[allow(clippy::too_many_arguments)]
    async fn analyst_fallback(
        &self,
        portfolio_id: &str,
        context_hash: &str,
        role: DebateRole,
        plan: &PlanSchema,
        known_ids: &[String],
        turnover_cap: f64,
        hold_mode: bool,
        notes: &mut EngineNotes,
    ) -> DebatePlan {
        if let Some(referee) = &self.referee {
            notes.note("debate_referee_analyst");
            let prompt = format!(
                "Only one plan is available. Assess whether it is reasonable given its constraints. Plan JSON:\n{}",
                serde_json::to_string(plan).unwrap_or_default()
            );
            let _ = call_with_timeout(referee.as_ref(), prompt).await;
        }
        let score = score_plan(plan, plan, known_ids, turnover_cap, hold_mode);
        let empty_score = DebateScore { evidence_grounding: 0.0, internal_consistency: 0.0, actionability: 0.0, total: 0.0 };
        let argument = plan_to_argument(role, plan);
        let (primary, challenger, primary_score, challenger_score) = if matches!(role, DebateRole::Primary) {
            (argument.clone(), argument, score.clone(), empty_score)
        } else {
            (argument.clone(), argument, empty_score, score.clone())
        };
        DebatePlan {
            portfolio_id: portfolio_id.to_string(),
            context_hash: context_hash.to_string(),
            primary,
            challenger,
            verdict: DebateVerdict { winner: role, rationale: "sole_surviving_provider".to_string(), primary_score, challenger_score },
            recommendation: plan.executive_summary.first().cloned().unwrap_or_default(),
            generated_at: Utc::now(),
            from_cache: false,
        }
    }

    async fn referee_judge(&self, referee: &dyn LlmProvider, context: &DebateContext, primary: &PlanSchema, challenger: &PlanSchema) -> Option<(DebateRole, String)> {
        let prompt = format!(
            "Two plans were proposed for the same portfolio. Pick the better one and say why in one sentence.\nContext: {}\nPlan A (primary): {}\nPlan B (challenger): {}\nRespond with JSON: {{\"winner\": \"primary\"|\"challenger\", \"rationale\": string}}",
            serde_json::to_string(context).unwrap_or_default(),
            serde_json::to_string(primary).unwrap_or_default(),
            serde_json::to_string(challenger).unwrap_or_default(),
        );
        let start = Instant::now();
        let text = tokio::time::timeout(Duration::from_secs(PROVIDER_TIMEOUT_S), referee.generate_completion(prompt)).await.ok()?.ok()?;
        let _ = start.elapsed();
        let trimmed = text.trim().trim_start_matches("```json").trim_start_matches("```").trim_end_matches("```");
        let verdict: RefereeVerdict = serde_json::from_str(trimmed.trim()).ok()?;
        let winner = if verdict.winner.eq_ignore_ascii_case("challenger") { DebateRole::Challenger } else { DebateRole::Primary };
        Some((winner, verdict.rationale))
    }
}

#[derive(Debug, Deserialize)]
struct RefereeVerdict {
    winner: String,
    rationale: String,
}

fn turnover_cap_for(horizon: &str) -> f64 {
    match horizon {
        "24h" => 0.05,
        "7d" => 0.15,
        "30d" => 0.30,
        _ => 0.15,
    }
}

/// Pulls the bounded evidence index's ids out of the context so the
/// scoring rubric can check `evidence_ids` referenced by a plan are
/// actually known.
fn evidence_ids(context: &DebateContext) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(arr) = context.top_events.get("evidence_index").and_then(Value::as_array) {
        for item in arr {
            if let Some(id) = item.get("id").and_then(Value::as_str) {
                ids.push(id.to_string());
            }
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan(ids: &[&str]) -> PlanSchema {
        PlanSchema {
            executive_summary: vec!["Hold steady".to_string()],
            trim_signals: vec![TrimSignal {
                symbol: "AAPL".to_string(),
                rationale: "earnings miss".to_string(),
                evidence_ids: ids.iter().map(|s| s.to_string()).collect(),
            }],
            sector_focus: vec!["tech".to_string()],
            scenarios: Scenarios { base: vec!["steady".to_string()], risk: vec!["volatility".to_string()] },
        }
    }

    #[test]
    fn clamp_truncates_over_length_lists() {
        let plan = PlanSchema {
            executive_summary: (0..10).map(|i| format!("point {i}")).collect(),
            trim_signals: vec![],
            sector_focus: vec![],
            scenarios: Scenarios { base: vec![], risk: vec![] },
        }
        .clamp();
        assert_eq!(plan.executive_summary.len(), MAX_EXECUTIVE_SUMMARY);
    }

    #[test]
    fn constraint_compliance_penalizes_hold_violation() {
        let plan = sample_plan(&["ev1"]);
        let known = vec!["ev1".to_string()];
        let compliant = constraint_compliance_score(&plan, &known, 0.15, false);
        let violating = constraint_compliance_score(&plan, &known, 0.15, true);
        assert!(violating < compliant);
    }

    #[test]
    fn unknown_evidence_ids_lower_consistency_score() {
        let known = vec!["ev1".to_string()];
        let valid = sample_plan(&["ev1"]);
        let invalid = sample_plan(&["ev999"]);
        assert!(evidence_consistency_score(&valid, &known) > evidence_consistency_score(&invalid, &known));
    }

    #[test]
    fn pointer_overlap_is_symmetric_and_bounded() {
        let a = sample_plan(&["ev1", "ev2"]);
        let b = sample_plan(&["ev2", "ev3"]);
        let score = pointer_overlap_score(&a, &b);
        assert!(score > 0.0 && score <= 100.0);
        assert_eq!(score, pointer_overlap_score(&b, &a));
    }

    #[test]
    fn cache_key_truncates_hash_to_16_chars() {
        let hash = "a".repeat(64);
        let key = cache_key("TRY", "7d", "30d", &hash);
        assert!(key.ends_with(&"a".repeat(16)));
    }
}
