// crates/quota-guard-core/src/core/mod.rs
// ============================================================================
// Module: Quota Guard Core Types
// Description: Runner, consumption, git abuse, and usage value types.
// Purpose: Provide the plain inputs and outputs of every quota guard decision.
// Dependencies: bigdecimal, serde, thiserror, time
// ============================================================================

//! ## Overview
//! Core types carry pre-computed facts into the decision engines. They hold
//! no references to persistence or global settings, so every engine can be
//! driven from tests with literal values.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod abuse;
pub mod consumption;
pub mod identifiers;
pub mod runner;
pub mod settings;
pub mod time;
pub mod usage;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use abuse::APPLICATION_DOWNLOADS_KEY;
pub use abuse::AbuseCheckContext;
pub use abuse::AbuseDecision;
pub use abuse::AbuseScope;
pub use abuse::BanNotification;
pub use abuse::NAMESPACE_DOWNLOADS_KEY;
pub use abuse::UserRecord;
pub use abuse::UserState;
pub use consumption::BuildRecord;
pub use consumption::BuildStatus;
pub use consumption::ConsumptionContext;
pub use identifiers::BuildId;
pub use identifiers::NamespaceId;
pub use identifiers::ProjectId;
pub use identifiers::UserId;
pub use runner::CostFactorError;
pub use runner::Runner;
pub use runner::RunnerMatcher;
pub use runner::RunnerType;
pub use runner::VisibilityLevel;
pub use settings::CostFactorSettings;
pub use settings::NEW_NAMESPACE_PUBLIC_PROJECT_FACTOR;
pub use settings::NewNamespacePublicRule;
pub use settings::OPEN_SOURCE_CONTRIBUTION_FACTOR;
pub use settings::PUBLIC_OPEN_SOURCE_PLAN_FACTOR;
pub use settings::QuotaGating;
pub use time::Timestamp;
pub use usage::MinutesUsage;
pub use usage::ReportLimit;
pub use usage::UsageReport;
pub use usage::UsageStatus;
