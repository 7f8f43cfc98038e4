// crates/quota-guard-core/src/runtime/availability.rs
// ============================================================================
// Module: Quota Guard Runner Availability
// Description: Shared runner quota gate for pending builds.
// Purpose: Decide whether a project can still be served by some runner.
// Dependencies: crate::interfaces
// ============================================================================

//! ## Overview
//! Only one combination blocks a build: shared runners enabled, namespace
//! over quota, and no active private runner. Everything else reports
//! available; reporting a total absence of runners belongs to runner
//! selection, not to this check.
//!
//! Runner state is loaded at most once per project for the lifetime of a
//! [`RunnerAvailability`]. Instances are scoped to one evaluation pass.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::ProjectId;
use crate::interfaces::ProjectRunnerState;
use crate::interfaces::RunnerStateError;
use crate::interfaces::RunnerStateSource;

// ============================================================================
// SECTION: Decision
// ============================================================================

/// Returns true unless shared runners are the only option and out of quota.
#[must_use]
pub const fn runners_available(state: &ProjectRunnerState) -> bool {
    !(state.shared_runners_enabled && state.namespace_over_quota && !state.private_runner_active)
}

// ============================================================================
// SECTION: Memoized Check
// ============================================================================

/// Runner availability check memoizing runner state per project.
#[derive(Debug)]
pub struct RunnerAvailability<S> {
    /// Runner state source.
    source: S,
    /// States loaded during this pass.
    loaded: BTreeMap<ProjectId, ProjectRunnerState>,
}

impl<S> RunnerAvailability<S>
where
    S: RunnerStateSource,
{
    /// Creates a check with an empty cache.
    #[must_use]
    pub const fn new(source: S) -> Self {
        Self {
            source,
            loaded: BTreeMap::new(),
        }
    }

    /// Returns whether runner capacity exists for the project.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerStateError`] when the state cannot be loaded. Failed
    /// loads are not cached.
    pub fn available(&mut self, project_id: ProjectId) -> Result<bool, RunnerStateError> {
        if let Some(state) = self.loaded.get(&project_id) {
            return Ok(runners_available(state));
        }
        let state = self.source.load(project_id)?;
        self.loaded.insert(project_id, state);
        Ok(runners_available(&state))
    }

    /// Consumes the check and returns its source.
    #[must_use]
    pub fn into_source(self) -> S {
        self.source
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions are permitted."
    )]

    use super::ProjectRunnerState;
    use super::runners_available;

    #[test]
    fn decision_table() {
        let rows = [
            (true, false, false, true),
            (true, false, true, true),
            (true, true, true, true),
            (true, true, false, false),
            (false, false, true, true),
            (false, true, true, true),
            (false, false, false, true),
            (false, true, false, true),
        ];
        for (shared, over, private, expected) in rows {
            let state = ProjectRunnerState {
                shared_runners_enabled: shared,
                namespace_over_quota: over,
                private_runner_active: private,
            };
            assert_eq!(
                runners_available(&state),
                expected,
                "shared {shared} over {over} private {private}"
            );
        }
    }
}
