// crates/quota-guard-core/src/runtime/mod.rs
// ============================================================================
// Module: Quota Guard Runtime
// Description: Cost factor, consumption, availability, and git abuse engines.
// Purpose: Execute quota guard decisions against injected collaborators.
// Dependencies: crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! Runtime modules implement the decision engines and in-memory collaborator
//! implementations. Engines receive settings and collaborators at
//! construction and read no ambient state.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod availability;
pub mod consumption;
pub mod cost_factor;
pub mod git_abuse;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use availability::RunnerAvailability;
pub use availability::runners_available;
pub use consumption::BuildConsumption;
pub use consumption::ConsumptionCalculator;
pub use consumption::PipelineConsumption;
pub use consumption::calculate;
pub use cost_factor::CostFactor;
pub use git_abuse::GitAbuseError;
pub use git_abuse::GitAbuseThrottle;
pub use store::InMemoryBanStore;
pub use store::InMemoryDownloadRateLimiter;
pub use store::InMemoryRunnerStateSource;
pub use store::InMemoryUserDirectory;
pub use store::RecordingBanNotifier;
pub use store::SharedBanStore;
pub use store::SharedDownloadRateLimiter;
