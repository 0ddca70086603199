//! Background Jobs Module
//!
//! This module contains implementations of background jobs that are scheduled
//! and executed by the job scheduler service. These jobs perform periodic
//! maintenance tasks, data updates, and calculations that run independently
//! of user requests.
//!
//! # Available Jobs
//!
//! - `news_ingest_job` - Refreshes news clusters feeding the event store
//! - `forecast_tick_job` - Recomputes market+news forecasts per timeframe
//! - `event_impact_job` - Scores realized event impact and expired forecasts
//! - `retention_purge_job` - Enforces retention windows and expires stale cache rows
//!
//! # Job Architecture
//!
//! Jobs in this module are designed to be:
//! - Idempotent: Can be safely re-run without side effects
//! - Fault-tolerant: Handle errors gracefully and log failures
//! - Efficient: Minimize database queries and API calls
//! - Observable: Provide detailed logging for monitoring
//!
//! Each job is registered with the job scheduler and executed on a defined schedule.

pub mod news_ingest_job;
pub mod forecast_tick_job;
pub mod event_impact_job;
pub mod retention_purge_job;
