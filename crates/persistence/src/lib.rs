//! Persistence layer for the marketplace operations engine.
//!
//! This crate contains:
//! - Database connection management
//! - Entity definitions (database row mappings)
//! - Repository implementations
//! - [`PgMarketplaceStore`], the PostgreSQL data access facade
//! - [`InMemoryStore`], an in-process facade with the same guarantees

pub mod db;
pub mod entities;
pub mod memory;
pub mod metrics;
pub mod repositories;
pub mod store;

pub use memory::InMemoryStore;
pub use store::PgMarketplaceStore;
