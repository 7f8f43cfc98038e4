// crates/quota-guard-core/src/lib.rs
// ============================================================================
// Module: Quota Guard Core Library
// Description: Public API surface for the quota guard decision engines.
// Purpose: Expose core types, collaborator interfaces, audit sinks, and engines.
// Dependencies: crate::{audit, core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Quota guard decides how many CI minutes a build costs, whether a project
//! may still use shared runners, and whether a user downloading many
//! repositories should be throttled and banned. Decisions are pure over
//! their inputs; persistence, notification, and logging are reached through
//! explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use audit::AuditSink;
pub use audit::ConsumptionAuditEvent;
pub use audit::FileAuditSink;
pub use audit::GitAbuseAuditEvent;
pub use audit::GitAbuseEventKind;
pub use audit::InMemoryAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use interfaces::BanError;
pub use interfaces::BanNotifier;
pub use interfaces::BanStore;
pub use interfaces::DirectoryError;
pub use interfaces::DownloadRateLimiter;
pub use interfaces::NotifyError;
pub use interfaces::ProjectRunnerState;
pub use interfaces::RateLimiterError;
pub use interfaces::RunnerStateError;
pub use interfaces::RunnerStateSource;
pub use interfaces::ThrottleRequest;
pub use interfaces::UserDirectory;
pub use runtime::BuildConsumption;
pub use runtime::ConsumptionCalculator;
pub use runtime::CostFactor;
pub use runtime::GitAbuseError;
pub use runtime::GitAbuseThrottle;
pub use runtime::InMemoryBanStore;
pub use runtime::InMemoryDownloadRateLimiter;
pub use runtime::InMemoryRunnerStateSource;
pub use runtime::InMemoryUserDirectory;
pub use runtime::PipelineConsumption;
pub use runtime::RecordingBanNotifier;
pub use runtime::RunnerAvailability;
pub use runtime::SharedBanStore;
pub use runtime::SharedDownloadRateLimiter;
pub use runtime::calculate;
pub use runtime::runners_available;
