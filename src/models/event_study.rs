use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct ReactionWindow {
    pub ret: Option<f64>,
    pub z: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventReactions {
    pub pre: ReactionWindow,
    pub post: std::collections::BTreeMap<String, ReactionWindow>,
    pub around: std::collections::BTreeMap<String, ReactionWindow>,
    pub pre_30m_ret: Option<f64>,
    pub post_30m_ret: Option<f64>,
    pub volume_z: f64,
    pub spark_pre: Vec<f64>,
    pub spark_post: Vec<f64>,
    pub data_status: String,
    pub missing_fields: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombinedMode {
    BothUp,
    BothDown,
    Divergence,
    LowSignal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CombinedReaction {
    pub mode: CombinedMode,
    pub severity: f64,
}

/// One row of the event-study table (spec §4.1 / §8 scenario 3). Ported
/// from `compute_event_study`, including its verbatim `pre_post_ratio`
/// quirk (spec §9): when the pre-window average is exactly zero the
/// ratio is hardcoded to 1.0 rather than computed through the
/// epsilon-guarded division.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPoint {
    pub id: String,
    pub title: String,
    pub ts_iso: String,
    pub timeframe: String,
    pub volume_z: f64,
    pub pre_post_ratio: f64,
    pub price_move_pct: f64,
    pub published_at_utc: String,
    pub published_at_tsi: String,
    pub scope: Option<String>,
    pub sectors: Vec<String>,
    pub reactions: std::collections::BTreeMap<String, EventReactions>,
    pub combined: CombinedReaction,
}
