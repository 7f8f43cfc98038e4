// crates/quota-guard-config/src/lib.rs
// ============================================================================
// Module: Quota Guard Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for quota-guard.toml semantics.
// Dependencies: quota-guard-core, quota-guard-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `quota-guard-config` defines the configuration model for quota guard. It
//! provides strict, fail-closed validation and converts validated sections
//! into the immutable settings snapshots the decision engines take at
//! construction time.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
