// crates/quota-guard-core/src/runtime/cost_factor.rs
// ============================================================================
// Module: Quota Guard Cost Factor Resolver
// Description: Resolves the CI minutes multiplier for a runner and build context.
// Purpose: Decide how many quota minutes one wall-clock minute costs.
// Dependencies: bigdecimal, crate::core
// ============================================================================

//! ## Overview
//! The resolver applies an ordered rule list and returns on the first match:
//! contribution override, non-instance runners, quota gating, visibility
//! base factor, own-namespace Open Source plan, new-namespace public rule,
//! fork source rules. Only instance runners are ever charged.

// ============================================================================
// SECTION: Imports
// ============================================================================

use bigdecimal::BigDecimal;
use bigdecimal::Zero;

use crate::core::ConsumptionContext;
use crate::core::CostFactorError;
use crate::core::CostFactorSettings;
use crate::core::RunnerMatcher;
use crate::core::VisibilityLevel;
use crate::core::runner::ensure_non_negative;

// ============================================================================
// SECTION: Resolver
// ============================================================================

/// Cost factor resolver bound to one runner snapshot and settings snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostFactor {
    /// Runner snapshot.
    matcher: RunnerMatcher,
    /// Injected instance settings.
    settings: CostFactorSettings,
}

impl CostFactor {
    /// Creates a resolver for a runner snapshot.
    #[must_use]
    pub const fn new(matcher: RunnerMatcher, settings: CostFactorSettings) -> Self {
        Self {
            matcher,
            settings,
        }
    }

    /// Returns the runner snapshot.
    #[must_use]
    pub const fn matcher(&self) -> &RunnerMatcher {
        &self.matcher
    }

    /// Resolves the cost factor for a build context.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError::NegativeCostFactor`] when a contribution
    /// override is negative.
    pub fn for_context(&self, context: &ConsumptionContext) -> Result<BigDecimal, CostFactorError> {
        if let Some(factor) = contribution_override(context) {
            ensure_non_negative("contribution_cost_factor", factor)?;
            return Ok(factor.clone());
        }
        if !self.matcher.is_instance_type() {
            return Ok(BigDecimal::zero());
        }
        if !self
            .settings
            .quota_gating
            .charges(context.namespace_quota_minutes, context.instance_quota_minutes)
        {
            return Ok(BigDecimal::zero());
        }

        let base = self.for_visibility(context.project_visibility);
        let public = context.project_visibility.is_public();

        if context.namespace_has_open_source_plan {
            match context.project_visibility {
                VisibilityLevel::Public => {
                    return Ok(base.min(self.settings.public_open_source_plan_factor.clone()));
                }
                VisibilityLevel::Private => return Ok(base),
                // Internal projects fall through to the fork rules.
                VisibilityLevel::Internal => {}
            }
        }

        if public
            && base.is_zero()
            && let Some(rule) = &self.settings.new_namespace_public
            && rule.applies_to(context.namespace_created_on)
        {
            return Ok(rule.factor.clone());
        }

        if context.is_fork && context.fork_source_visibility.is_some_and(VisibilityLevel::is_public)
        {
            let public_factor = self.matcher.public_projects_cost_factor().clone();
            if context.fork_source_has_open_source_plan {
                return Ok(public_factor.min(self.settings.open_source_contribution_factor.clone()));
            }
            return Ok(public_factor);
        }

        Ok(base)
    }

    /// Returns the runner's factor for a visibility level; zero for non-instance runners.
    #[must_use]
    pub fn for_visibility(&self, visibility: VisibilityLevel) -> BigDecimal {
        if !self.matcher.is_instance_type() {
            return BigDecimal::zero();
        }
        if visibility.is_public() {
            self.matcher.public_projects_cost_factor().clone()
        } else {
            self.matcher.private_projects_cost_factor().clone()
        }
    }

    /// Returns true when the context is charged a positive factor.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError`] when the factor cannot be resolved.
    pub fn enabled(&self, context: &ConsumptionContext) -> Result<bool, CostFactorError> {
        Ok(self.for_context(context)? > BigDecimal::zero())
    }

    /// Returns true when the context is free.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError`] when the factor cannot be resolved.
    pub fn disabled(&self, context: &ConsumptionContext) -> Result<bool, CostFactorError> {
        Ok(!self.enabled(context)?)
    }

    /// Returns true when the contribution override decides the factor.
    #[must_use]
    pub const fn contribution_applied(context: &ConsumptionContext) -> bool {
        contribution_override(context).is_some()
    }
}

/// Returns the contribution override factor when it applies.
const fn contribution_override(context: &ConsumptionContext) -> Option<&BigDecimal> {
    if context.is_gitlab_contribution {
        context.contribution_cost_factor.as_ref()
    } else {
        None
    }
}
