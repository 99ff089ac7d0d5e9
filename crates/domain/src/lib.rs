//! Domain layer for the marketplace operations engine.
//!
//! This crate contains:
//! - Marketplace models (bookings, providers, users, flags, alerts, reports)
//! - The data-access facade traits the monitors are written against
//! - The outbound notification port
//! - Pure analytics used by the monitors (distance, growth, health score)

pub mod models;
pub mod services;
