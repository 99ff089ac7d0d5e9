//! Autonomous operations engine for a local-services marketplace.
//!
//! [`engine::OpsEngine`] ties together the monitors, the cron scheduler and
//! the mutation-event router; [`app::create_app`] exposes it to operators
//! over HTTP.

pub mod app;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod jobs;
pub mod middleware;
pub mod monitors;
pub mod routes;
pub mod services;
