// crates/quota-guard-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Quota Store
// Description: Durable ban store and download rate limiter using SQLite WAL.
// Purpose: Persist git abuse bans, notification claims, and download events.
// Dependencies: quota-guard-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed implementation of the
//! [`quota_guard_core::BanStore`] and [`quota_guard_core::DownloadRateLimiter`]
//! interfaces. Bans and notification claims are single-statement
//! compare-and-swap writes so concurrent evaluations for the same user and
//! scope agree on exactly one winner.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteQuotaStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
