//! Shared utilities for the marketplace operations engine.
//!
//! This crate provides common functionality used across all other crates:
//! - Input normalization (phone numbers, search terms)
//! - Common validation logic
//! - Promotional code generation

pub mod codes;
pub mod validation;
