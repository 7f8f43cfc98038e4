// crates/quota-guard-core/src/core/settings.rs
// ============================================================================
// Module: Quota Guard Settings Snapshots
// Description: Injected instance settings for cost factor resolution.
// Purpose: Replace ambient global settings with explicit, immutable inputs.
// Dependencies: bigdecimal, serde, time
// ============================================================================

//! ## Overview
//! [`CostFactorSettings`] is built once from configuration and passed to the
//! resolver at construction time. The resolver reads nothing else, which
//! keeps every rule testable without process-wide state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::Deserialize;
use serde::Serialize;
use time::Date;
use time::Month;

use crate::core::runner::CostFactorError;
use crate::core::runner::ensure_non_negative;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Ceiling applied to public projects in Open Source plan namespaces.
pub const PUBLIC_OPEN_SOURCE_PLAN_FACTOR: &str = "0.008";
/// Ceiling applied to forks contributing back to public Open Source projects.
pub const OPEN_SOURCE_CONTRIBUTION_FACTOR: &str = "0.005";
/// Factor charged to public projects of namespaces created after the release date.
pub const NEW_NAMESPACE_PUBLIC_PROJECT_FACTOR: &str = "0.008";
/// Year of the public project cost factor release date.
pub const PUBLIC_COST_FACTOR_RELEASE_YEAR: i32 = 2021;
/// Month of the public project cost factor release date.
pub const PUBLIC_COST_FACTOR_RELEASE_MONTH: Month = Month::July;
/// Day of the public project cost factor release date.
pub const PUBLIC_COST_FACTOR_RELEASE_DAY: u8 = 17;

// ============================================================================
// SECTION: Quota Gating
// ============================================================================

/// How namespace and instance quotas gate instance runner charging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaGating {
    /// An explicit namespace quota switches the instance-wide factor off;
    /// only an unset namespace quota with a positive instance quota charges.
    #[default]
    NamespaceSupersedes,
    /// The namespace quota, falling back to the instance quota when unset,
    /// must be positive for charging to apply.
    EffectiveLimit,
}

impl QuotaGating {
    /// Returns true when instance runner consumption is charged.
    #[must_use]
    pub const fn charges(self, namespace_quota: Option<u64>, instance_quota: Option<u64>) -> bool {
        match self {
            Self::NamespaceSupersedes => match (namespace_quota, instance_quota) {
                (None, Some(instance)) => instance > 0,
                (None, None) | (Some(_), _) => false,
            },
            Self::EffectiveLimit => match namespace_quota {
                Some(namespace) => namespace > 0,
                None => matches!(instance_quota, Some(instance) if instance > 0),
            },
        }
    }
}

// ============================================================================
// SECTION: Settings
// ============================================================================

/// Rule charging public projects of recently created namespaces.
///
/// # Invariants
/// - `factor` is non-negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNamespacePublicRule {
    /// Namespaces created on or after this date are affected.
    pub release_date: Date,
    /// Factor charged when the runner's public factor is zero.
    pub factor: BigDecimal,
}

impl NewNamespacePublicRule {
    /// Returns the rule with its historical release date and factor.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError`] if the built-in constants fail to parse.
    pub fn standard() -> Result<Self, CostFactorError> {
        let release_date = Date::from_calendar_date(
            PUBLIC_COST_FACTOR_RELEASE_YEAR,
            PUBLIC_COST_FACTOR_RELEASE_MONTH,
            PUBLIC_COST_FACTOR_RELEASE_DAY,
        )
        .map_err(|err| CostFactorError::InvalidSetting {
            field: "new_namespace_public_release_date",
            value: err.to_string(),
        })?;
        Ok(Self {
            release_date,
            factor: parse_constant(
                "new_namespace_public_factor",
                NEW_NAMESPACE_PUBLIC_PROJECT_FACTOR,
            )?,
        })
    }

    /// Returns true when a namespace created on `created_on` is covered.
    #[must_use]
    pub fn applies_to(&self, created_on: Option<Date>) -> bool {
        created_on.is_some_and(|date| date >= self.release_date)
    }
}

/// Instance settings consumed by the cost factor resolver.
///
/// # Invariants
/// - All factors are non-negative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostFactorSettings {
    /// Quota gating mode.
    pub quota_gating: QuotaGating,
    /// Ceiling for public projects in Open Source plan namespaces.
    pub public_open_source_plan_factor: BigDecimal,
    /// Ceiling for forks of public Open Source plan projects.
    pub open_source_contribution_factor: BigDecimal,
    /// Optional new-namespace public project rule.
    pub new_namespace_public: Option<NewNamespacePublicRule>,
}

impl CostFactorSettings {
    /// Creates validated settings.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError::NegativeCostFactor`] when a factor is negative.
    pub fn new(
        quota_gating: QuotaGating,
        public_open_source_plan_factor: BigDecimal,
        open_source_contribution_factor: BigDecimal,
        new_namespace_public: Option<NewNamespacePublicRule>,
    ) -> Result<Self, CostFactorError> {
        ensure_non_negative("public_open_source_plan_factor", &public_open_source_plan_factor)?;
        ensure_non_negative("open_source_contribution_factor", &open_source_contribution_factor)?;
        if let Some(rule) = &new_namespace_public {
            ensure_non_negative("new_namespace_public_factor", &rule.factor)?;
        }
        Ok(Self {
            quota_gating,
            public_open_source_plan_factor,
            open_source_contribution_factor,
            new_namespace_public,
        })
    }

    /// Returns settings with the default gating, default ceilings, and no
    /// new-namespace rule.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError`] if the built-in constants fail to parse.
    pub fn standard() -> Result<Self, CostFactorError> {
        Self::new(
            QuotaGating::default(),
            parse_constant("public_open_source_plan_factor", PUBLIC_OPEN_SOURCE_PLAN_FACTOR)?,
            parse_constant("open_source_contribution_factor", OPEN_SOURCE_CONTRIBUTION_FACTOR)?,
            None,
        )
    }

    /// Returns a copy with a different gating mode.
    #[must_use]
    pub fn with_quota_gating(mut self, quota_gating: QuotaGating) -> Self {
        self.quota_gating = quota_gating;
        self
    }

    /// Returns a copy with the new-namespace public rule set.
    #[must_use]
    pub fn with_new_namespace_public(mut self, rule: NewNamespacePublicRule) -> Self {
        self.new_namespace_public = Some(rule);
        self
    }
}

/// Parses a built-in decimal constant.
fn parse_constant(field: &'static str, value: &str) -> Result<BigDecimal, CostFactorError> {
    BigDecimal::from_str(value).map_err(|_| CostFactorError::InvalidSetting {
        field,
        value: value.to_string(),
    })
}
