// crates/quota-guard-core/src/core/consumption.rs
// ============================================================================
// Module: Quota Guard Consumption Inputs
// Description: Per-build billing context and build records.
// Purpose: Carry pre-computed plan, visibility, and quota facts into the resolver.
// Dependencies: bigdecimal, serde, time
// ============================================================================

//! ## Overview
//! Plan, fork, and visibility facts are looked up once by the host and
//! frozen into a [`ConsumptionContext`]. The resolver branches on these
//! plain fields instead of walking project and namespace records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde::Serialize;
use time::Date;

use crate::core::identifiers::BuildId;
use crate::core::identifiers::ProjectId;
use crate::core::runner::RunnerMatcher;
use crate::core::runner::VisibilityLevel;

// ============================================================================
// SECTION: Consumption Context
// ============================================================================

/// Inputs for one billed unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionContext {
    /// Wall-clock duration in seconds.
    pub duration_seconds: u64,
    /// Visibility of the project running the build.
    pub project_visibility: VisibilityLevel,
    /// Namespace quota in minutes; `None` when unset.
    pub namespace_quota_minutes: Option<u64>,
    /// Instance-wide quota in minutes; `None` when unset.
    pub instance_quota_minutes: Option<u64>,
    /// Whether the project is a fork.
    pub is_fork: bool,
    /// Visibility of the fork source when the project is a fork.
    pub fork_source_visibility: Option<VisibilityLevel>,
    /// Whether the project's namespace is on the Open Source plan.
    pub namespace_has_open_source_plan: bool,
    /// Whether the fork source's namespace is on the Open Source plan.
    pub fork_source_has_open_source_plan: bool,
    /// Whether the build is a contribution to a flagged organization's project.
    pub is_gitlab_contribution: bool,
    /// Override factor for contributions; present only for contributions.
    pub contribution_cost_factor: Option<BigDecimal>,
    /// Creation date of the project's root namespace, when known.
    pub namespace_created_on: Option<Date>,
}

impl ConsumptionContext {
    /// Creates a context for a non-fork, non-contribution build with no plan
    /// discounts and no quotas configured.
    #[must_use]
    pub const fn new(duration_seconds: u64, project_visibility: VisibilityLevel) -> Self {
        Self {
            duration_seconds,
            project_visibility,
            namespace_quota_minutes: None,
            instance_quota_minutes: None,
            is_fork: false,
            fork_source_visibility: None,
            namespace_has_open_source_plan: false,
            fork_source_has_open_source_plan: false,
            is_gitlab_contribution: false,
            contribution_cost_factor: None,
            namespace_created_on: None,
        }
    }

    /// Returns a copy with the given quotas.
    #[must_use]
    pub fn with_quotas(
        mut self,
        namespace_quota_minutes: Option<u64>,
        instance_quota_minutes: Option<u64>,
    ) -> Self {
        self.namespace_quota_minutes = namespace_quota_minutes;
        self.instance_quota_minutes = instance_quota_minutes;
        self
    }

    /// Returns a copy marked as a fork of a source with the given visibility.
    #[must_use]
    pub fn with_fork_source(
        mut self,
        visibility: VisibilityLevel,
        has_open_source_plan: bool,
    ) -> Self {
        self.is_fork = true;
        self.fork_source_visibility = Some(visibility);
        self.fork_source_has_open_source_plan = has_open_source_plan;
        self
    }

    /// Returns a copy with the namespace Open Source plan flag set.
    #[must_use]
    pub fn with_open_source_plan(mut self, has_open_source_plan: bool) -> Self {
        self.namespace_has_open_source_plan = has_open_source_plan;
        self
    }

    /// Returns a copy marked as a contribution with the given override factor.
    #[must_use]
    pub fn with_contribution(mut self, cost_factor: BigDecimal) -> Self {
        self.is_gitlab_contribution = true;
        self.contribution_cost_factor = Some(cost_factor);
        self
    }

    /// Returns a copy with the namespace creation date set.
    #[must_use]
    pub fn with_namespace_created_on(mut self, created_on: Date) -> Self {
        self.namespace_created_on = Some(created_on);
        self
    }
}

// ============================================================================
// SECTION: Builds
// ============================================================================

/// CI build status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Created but not queued.
    Created,
    /// Waiting for a runner.
    Pending,
    /// Executing on a runner.
    Running,
    /// Finished successfully.
    Success,
    /// Finished with a failure.
    Failed,
    /// Canceled before completion.
    Canceled,
    /// Skipped by pipeline rules.
    Skipped,
    /// Waiting for a manual action.
    Manual,
}

impl BuildStatus {
    /// Returns true for terminal statuses.
    #[must_use]
    pub const fn is_completed(self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Canceled | Self::Skipped)
    }
}

/// One build of a pipeline as seen by the consumption calculator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    /// Build identifier.
    pub build_id: BuildId,
    /// Project the build belongs to.
    pub project_id: ProjectId,
    /// Build status.
    pub status: BuildStatus,
    /// Snapshot of the runner that picked the build, if any.
    pub runner: Option<RunnerMatcher>,
    /// Billing context; its duration is the build duration.
    pub context: ConsumptionContext,
}
