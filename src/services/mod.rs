pub mod news_engine;
pub mod person_impact;
pub mod sector_impact;
pub mod sector_config;

pub mod failure_cache;
pub mod rate_limiter;
pub mod llm_service;
pub mod job_scheduler_service;

pub mod event_store;
pub mod event_study;
pub mod forecasting_engine;
pub mod quote_router;
pub mod portfolio_engine;
pub mod portfolio_value_forecast;
pub mod debate_engine;
pub mod pipeline;
pub mod movers;
