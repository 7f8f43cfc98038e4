// crates/quota-guard-core/src/core/runner.rs
// ============================================================================
// Module: Quota Guard Runner Model
// Description: Runner types, project visibility, and immutable charging snapshots.
// Purpose: Capture the runner attributes the cost factor resolver depends on.
// Dependencies: bigdecimal, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Runner`] is the mutable settings record an administrator edits. The
//! cost factor resolver never sees it: it only accepts a [`RunnerMatcher`],
//! a validated snapshot taken once per evaluation so settings changing
//! mid-calculation cannot leak into a result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use bigdecimal::BigDecimal;
use bigdecimal::Zero;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Cost factor resolution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CostFactorError {
    /// A configured cost factor is negative.
    #[error("cost factor must be non-negative: {field} = {value}")]
    NegativeCostFactor {
        /// Name of the offending field.
        field: &'static str,
        /// Rendered offending value.
        value: String,
    },
    /// A visibility level outside the known set was supplied.
    #[error("invalid visibility level: {0}")]
    InvalidVisibilityLevel(i64),
    /// A setting value could not be parsed.
    #[error("invalid cost factor setting: {field} = {value}")]
    InvalidSetting {
        /// Name of the offending field.
        field: &'static str,
        /// Rendered offending value.
        value: String,
    },
}

/// Rejects negative decimals for the named field.
pub(crate) fn ensure_non_negative(
    field: &'static str,
    value: &BigDecimal,
) -> Result<(), CostFactorError> {
    if *value < BigDecimal::zero() {
        return Err(CostFactorError::NegativeCostFactor {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

// ============================================================================
// SECTION: Visibility
// ============================================================================

/// Project visibility level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityLevel {
    /// Visible to project members only.
    Private,
    /// Visible to any signed-in user.
    Internal,
    /// Visible to everyone.
    Public,
}

impl VisibilityLevel {
    /// Numeric level for private projects.
    pub const PRIVATE_LEVEL: i64 = 0;
    /// Numeric level for internal projects.
    pub const INTERNAL_LEVEL: i64 = 10;
    /// Numeric level for public projects.
    pub const PUBLIC_LEVEL: i64 = 20;

    /// Parses a stored numeric visibility level.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError::InvalidVisibilityLevel`] for unknown levels.
    pub const fn from_level(level: i64) -> Result<Self, CostFactorError> {
        match level {
            Self::PRIVATE_LEVEL => Ok(Self::Private),
            Self::INTERNAL_LEVEL => Ok(Self::Internal),
            Self::PUBLIC_LEVEL => Ok(Self::Public),
            other => Err(CostFactorError::InvalidVisibilityLevel(other)),
        }
    }

    /// Returns the numeric level.
    #[must_use]
    pub const fn level(self) -> i64 {
        match self {
            Self::Private => Self::PRIVATE_LEVEL,
            Self::Internal => Self::INTERNAL_LEVEL,
            Self::Public => Self::PUBLIC_LEVEL,
        }
    }

    /// Returns true for public visibility.
    #[must_use]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

// ============================================================================
// SECTION: Runners
// ============================================================================

/// Runner ownership scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerType {
    /// Shared across the whole installation.
    Instance,
    /// Owned by a group.
    Group,
    /// Owned by a single project.
    Project,
}

/// Mutable runner settings as edited by administrators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runner {
    /// Runner ownership scope.
    pub runner_type: RunnerType,
    /// Multiplier for public projects.
    pub public_projects_cost_factor: BigDecimal,
    /// Multiplier for private and internal projects.
    pub private_projects_cost_factor: BigDecimal,
}

impl Runner {
    /// Snapshots the current settings for one evaluation.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError::NegativeCostFactor`] when a factor is negative.
    pub fn matcher(&self) -> Result<RunnerMatcher, CostFactorError> {
        RunnerMatcher::new(
            self.runner_type,
            self.public_projects_cost_factor.clone(),
            self.private_projects_cost_factor.clone(),
        )
    }
}

/// Immutable view of a runner's charging attributes.
///
/// # Invariants
/// - Both cost factors are non-negative.
/// - Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerMatcher {
    /// Runner ownership scope.
    runner_type: RunnerType,
    /// Multiplier for public projects.
    public_projects_cost_factor: BigDecimal,
    /// Multiplier for private and internal projects.
    private_projects_cost_factor: BigDecimal,
}

impl RunnerMatcher {
    /// Creates a validated runner snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError::NegativeCostFactor`] when a factor is negative.
    pub fn new(
        runner_type: RunnerType,
        public_projects_cost_factor: BigDecimal,
        private_projects_cost_factor: BigDecimal,
    ) -> Result<Self, CostFactorError> {
        ensure_non_negative("public_projects_cost_factor", &public_projects_cost_factor)?;
        ensure_non_negative("private_projects_cost_factor", &private_projects_cost_factor)?;
        Ok(Self {
            runner_type,
            public_projects_cost_factor,
            private_projects_cost_factor,
        })
    }

    /// Returns the runner ownership scope.
    #[must_use]
    pub const fn runner_type(&self) -> RunnerType {
        self.runner_type
    }

    /// Returns true for instance-wide runners.
    #[must_use]
    pub const fn is_instance_type(&self) -> bool {
        matches!(self.runner_type, RunnerType::Instance)
    }

    /// Returns the public project multiplier.
    #[must_use]
    pub const fn public_projects_cost_factor(&self) -> &BigDecimal {
        &self.public_projects_cost_factor
    }

    /// Returns the private project multiplier.
    #[must_use]
    pub const fn private_projects_cost_factor(&self) -> &BigDecimal {
        &self.private_projects_cost_factor
    }
}
