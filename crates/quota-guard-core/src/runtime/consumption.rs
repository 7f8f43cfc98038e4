// crates/quota-guard-core/src/runtime/consumption.rs
// ============================================================================
// Module: Quota Guard Consumption Calculator
// Description: Converts build durations and cost factors into billed minutes.
// Purpose: Provide per-build and per-pipeline consumption with exact decimals.
// Dependencies: bigdecimal, crate::{audit, core}
// ============================================================================

//! ## Overview
//! Billed minutes are `duration_seconds * cost_factor / 60`, rounded half-up
//! to two decimals. Pipelines sum the rounded per-build amounts of completed
//! builds. Every resolved build is reported to the audit sink with its
//! factor and whether the contribution override applied.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use bigdecimal::BigDecimal;
use bigdecimal::RoundingMode;
use bigdecimal::Zero;

use crate::audit::AuditSink;
use crate::audit::ConsumptionAuditEvent;
use crate::audit::ConsumptionAuditEventParams;
use crate::core::BuildId;
use crate::core::BuildRecord;
use crate::core::CostFactorError;
use crate::core::CostFactorSettings;
use crate::core::ProjectId;
use crate::runtime::cost_factor::CostFactor;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Seconds per billed minute.
const SECONDS_PER_MINUTE: u64 = 60;
/// Decimal places kept in billed minutes.
const CONSUMPTION_SCALE: i64 = 2;

// ============================================================================
// SECTION: Calculation
// ============================================================================

/// Returns billed minutes for a duration and cost factor.
#[must_use]
pub fn calculate(duration_seconds: u64, cost_factor: &BigDecimal) -> BigDecimal {
    let scaled = BigDecimal::from(duration_seconds) * cost_factor;
    let minutes = scaled / BigDecimal::from(SECONDS_PER_MINUTE);
    minutes.with_scale_round(CONSUMPTION_SCALE, RoundingMode::HalfUp)
}

// ============================================================================
// SECTION: Build Consumption
// ============================================================================

/// Consumption of one build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildConsumption {
    /// Build identifier.
    pub build_id: BuildId,
    /// Project identifier.
    pub project_id: ProjectId,
    /// Billed duration in seconds.
    pub duration_seconds: u64,
    /// Resolved cost factor.
    pub cost_factor: BigDecimal,
    /// Whether the contribution override decided the factor.
    pub gitlab_contribution: bool,
    /// Billed minutes.
    pub amount: BigDecimal,
}

impl BuildConsumption {
    /// Resolves the consumption of one build.
    ///
    /// Builds without a runner are free.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError`] when the cost factor cannot be resolved.
    pub fn new(build: &BuildRecord, settings: &CostFactorSettings) -> Result<Self, CostFactorError> {
        let context = &build.context;
        let cost_factor = match &build.runner {
            Some(matcher) => {
                CostFactor::new(matcher.clone(), settings.clone()).for_context(context)?
            }
            None => BigDecimal::zero(),
        };
        let gitlab_contribution =
            build.runner.is_some() && CostFactor::contribution_applied(context);
        let amount = calculate(context.duration_seconds, &cost_factor);
        Ok(Self {
            build_id: build.build_id,
            project_id: build.project_id,
            duration_seconds: context.duration_seconds,
            cost_factor,
            gitlab_contribution,
            amount,
        })
    }

    /// Returns the audit event describing this consumption.
    #[must_use]
    pub fn audit_event(&self) -> ConsumptionAuditEvent {
        ConsumptionAuditEvent::new(ConsumptionAuditEventParams {
            build_id: Some(self.build_id),
            project_id: Some(self.project_id),
            duration_seconds: self.duration_seconds,
            cost_factor: self.cost_factor.to_string(),
            gitlab_contribution: self.gitlab_contribution,
            consumption: self.amount.to_string(),
        })
    }
}

// ============================================================================
// SECTION: Pipeline Consumption
// ============================================================================

/// Consumption of the completed builds of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PipelineConsumption {
    /// Per-build consumption of the billed builds.
    pub builds: Vec<BuildConsumption>,
}

impl PipelineConsumption {
    /// Resolves the consumption of every completed build that ran on a runner.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError`] when any build's cost factor cannot be resolved.
    pub fn new(
        builds: &[BuildRecord],
        settings: &CostFactorSettings,
    ) -> Result<Self, CostFactorError> {
        let builds = builds
            .iter()
            .filter(|build| build.status.is_completed() && build.runner.is_some())
            .map(|build| BuildConsumption::new(build, settings))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            builds,
        })
    }

    /// Returns the sum of the per-build billed minutes.
    #[must_use]
    pub fn amount(&self) -> BigDecimal {
        self.builds
            .iter()
            .fold(BigDecimal::zero(), |total, build| total + &build.amount)
            .with_scale_round(CONSUMPTION_SCALE, RoundingMode::HalfUp)
    }
}

// ============================================================================
// SECTION: Calculator
// ============================================================================

/// Consumption calculator that reports every resolved build to an audit sink.
#[derive(Clone)]
pub struct ConsumptionCalculator {
    /// Injected instance settings.
    settings: CostFactorSettings,
    /// Audit sink for consumption events.
    audit: Arc<dyn AuditSink>,
}

impl ConsumptionCalculator {
    /// Creates a calculator.
    #[must_use]
    pub fn new(settings: CostFactorSettings, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            settings,
            audit,
        }
    }

    /// Returns the injected settings.
    #[must_use]
    pub const fn settings(&self) -> &CostFactorSettings {
        &self.settings
    }

    /// Resolves and records the consumption of one build.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError`] when the cost factor cannot be resolved.
    pub fn build(&self, build: &BuildRecord) -> Result<BuildConsumption, CostFactorError> {
        let consumption = BuildConsumption::new(build, &self.settings)?;
        self.audit.record_consumption(&consumption.audit_event());
        Ok(consumption)
    }

    /// Resolves and records the consumption of a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`CostFactorError`] when any build's cost factor cannot be resolved.
    pub fn pipeline(&self, builds: &[BuildRecord]) -> Result<PipelineConsumption, CostFactorError> {
        let consumption = PipelineConsumption::new(builds, &self.settings)?;
        for build in &consumption.builds {
            self.audit.record_consumption(&build.audit_event());
        }
        Ok(consumption)
    }
}
