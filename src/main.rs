
mod db;
mod routes;
mod models;
mod errors;
mod app;
mod services;
mod external;
mod state;
mod jobs;
mod config;
mod logging;

use std::net::SocketAddr;
use std::sync::Arc;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use crate::external::finnhub::FinnhubProvider;
use crate::external::multi_provider::MultiProvider;
use crate::external::twelvedata::TwelveDataProvider;
use crate::external::yahoo::YahooProvider;
use crate::services::debate_engine::DebateEngine;
use crate::services::llm_service::{GeminiProvider, OpenAiProvider, OpenRouterProvider};
use crate::services::job_scheduler_service::JobSchedulerService;
use crate::services::pipeline::PipelineOrchestrator;
use crate::services::quote_router::{QuoteRouter, QuoteSource, TwelveDataQuoteSource, YahooQuoteSource};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    crate::logging::init_logging(crate::logging::LoggingConfig::from_env())?;

    let price_provider = Arc::new(MultiProvider::new(
        Box::new(YahooProvider::new()),
        Box::new(TwelveDataProvider::from_env()?),
    ));
    let failure_cache = crate::services::failure_cache::FailureCache::new();
    let rate_limiter = Arc::new(crate::services::rate_limiter::RateLimiter::new(4, 60));

    let quote_router = Arc::new(QuoteRouter::new(vec![
        (Arc::new(YahooQuoteSource(YahooProvider::new())) as Arc<dyn QuoteSource>, 60.0, true),
        (Arc::new(FinnhubProvider::from_env()) as Arc<dyn QuoteSource>, 60.0, true),
        (Arc::new(TwelveDataQuoteSource(TwelveDataProvider::from_env()?)) as Arc<dyn QuoteSource>, 8.0, true),
    ]));

    let primary: Arc<dyn crate::services::llm_service::LlmProvider> = match std::env::var("OPENAI_API_KEY") {
        Ok(key) => Arc::new(OpenAiProvider::new(key, 900, 0.7)),
        Err(_) => Arc::new(GeminiProvider::new(std::env::var("GEMINI_API_KEY").unwrap_or_default())),
    };
    let challenger: Arc<dyn crate::services::llm_service::LlmProvider> = match std::env::var("GEMINI_API_KEY") {
        Ok(key) => Arc::new(GeminiProvider::new(key)),
        Err(_) => Arc::new(OpenRouterProvider::new(
            std::env::var("OPENROUTER_API_KEY").unwrap_or_default(),
            std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| "openrouter/auto".to_string()),
        )),
    };
    let referee: Option<Arc<dyn crate::services::llm_service::LlmProvider>> = std::env::var("OPENROUTER_API_KEY")
        .ok()
        .map(|key| Arc::new(OpenRouterProvider::new(key, "openrouter/auto".to_string())) as Arc<dyn crate::services::llm_service::LlmProvider>);
    let debate_engine = Arc::new(DebateEngine::new(primary, challenger, referee));

    let pipeline = Arc::new(PipelineOrchestrator::new());

    let mut job_scheduler = JobSchedulerService::new(
        Arc::new(pool.clone()),
        price_provider.clone(),
        Arc::new(failure_cache.clone()),
        rate_limiter.clone(),
        quote_router.clone(),
    )
    .await?;
    job_scheduler.start().await?;

    let state = AppState { pool, price_provider, failure_cache, rate_limiter, quote_router, debate_engine, pipeline };

    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    let listener = TcpListener::bind(&addr).await.unwrap();
    tracing::info!("market-intel running at http://{}/", addr);
    axum::serve(listener, app)
        .await?;

    Ok(())
}
