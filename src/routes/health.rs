use axum::{extract::State, Json, Router, routing::get};
use serde::Serialize;
use tracing::info;

use crate::services::quote_router::RouterStats;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    providers: Vec<ProviderHealth>,
    router_stats: RouterStats,
}

#[derive(Debug, Serialize)]
struct ProviderHealth {
    name: &'static str,
    enabled: bool,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    info!("GET /health - liveness + provider map + router stats");
    let providers = state
        .quote_router
        .provider_enable_map()
        .into_iter()
        .map(|(name, enabled)| ProviderHealth { name, enabled })
        .collect();
    Json(HealthResponse {
        status: "ok",
        providers,
        router_stats: state.quote_router.stats(),
    })
}
