pub mod event_queries;
pub mod price_bar_queries;
pub mod event_impact_queries;
pub mod forecast_queries;
pub mod kv_store_queries;
