use std::sync::Arc;
use sqlx::PgPool;
use crate::external::price_provider::PriceProvider;
use crate::services::debate_engine::DebateEngine;
use crate::services::failure_cache::FailureCache;
use crate::services::pipeline::PipelineOrchestrator;
use crate::services::quote_router::QuoteRouter;
use crate::services::rate_limiter::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub price_provider: Arc<dyn PriceProvider>,
    pub failure_cache: FailureCache,
    pub rate_limiter: Arc<RateLimiter>,
    pub quote_router: Arc<QuoteRouter>,
    pub debate_engine: Arc<DebateEngine>,
    pub pipeline: Arc<PipelineOrchestrator>,
}