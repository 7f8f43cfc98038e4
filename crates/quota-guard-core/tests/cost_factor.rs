// crates/quota-guard-core/tests/cost_factor.rs
// ============================================================================
// Module: Cost Factor Resolver Tests
// Description: Rule-order and decision-table coverage for the cost factor resolver.
// Purpose: Pin quota gating, plan discounts, fork rules, and contribution overrides.
// Dependencies: quota-guard-core, bigdecimal, time
// ============================================================================
//! ## Overview
//! Exercises both quota gating modes. The namespace-supersedes table is the
//! default; the effective-limit tables mirror the production rows before and
//! after the public project cost factor release date.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::str::FromStr;

use bigdecimal::BigDecimal;
use quota_guard_core::ConsumptionContext;
use quota_guard_core::CostFactor;
use quota_guard_core::CostFactorError;
use quota_guard_core::CostFactorSettings;
use quota_guard_core::NewNamespacePublicRule;
use quota_guard_core::QuotaGating;
use quota_guard_core::Runner;
use quota_guard_core::RunnerMatcher;
use quota_guard_core::RunnerType;
use quota_guard_core::VisibilityLevel;
use quota_guard_core::calculate;
use time::Date;
use time::Month;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

fn matcher(runner_type: RunnerType, public: &str, private: &str) -> RunnerMatcher {
    RunnerMatcher::new(runner_type, dec(public), dec(private)).unwrap()
}

fn resolver(runner_type: RunnerType, public: &str, private: &str) -> CostFactor {
    CostFactor::new(matcher(runner_type, public, private), CostFactorSettings::standard().unwrap())
}

fn production_resolver(runner_type: RunnerType, public: &str, private: &str) -> CostFactor {
    let settings = CostFactorSettings::standard()
        .unwrap()
        .with_quota_gating(QuotaGating::EffectiveLimit)
        .with_new_namespace_public(NewNamespacePublicRule::standard().unwrap());
    CostFactor::new(matcher(runner_type, public, private), settings)
}

fn level(value: i64) -> VisibilityLevel {
    VisibilityLevel::from_level(value).unwrap()
}

const PRIVATE: i64 = VisibilityLevel::PRIVATE_LEVEL;
const INTERNAL: i64 = VisibilityLevel::INTERNAL_LEVEL;
const PUBLIC: i64 = VisibilityLevel::PUBLIC_LEVEL;

// ============================================================================
// SECTION: Default Gating
// ============================================================================

#[test]
fn non_instance_runners_are_free() {
    for runner_type in [RunnerType::Group, RunnerType::Project] {
        for visibility in [PRIVATE, INTERNAL, PUBLIC] {
            let context = ConsumptionContext::new(600, level(visibility))
                .with_quotas(None, Some(400))
                .with_open_source_plan(true);
            let factor = resolver(runner_type, "3", "3").for_context(&context).unwrap();
            assert_eq!(factor, dec("0"), "{runner_type:?} {visibility}");
        }
    }
}

#[test]
fn public_project_on_instance_runner_uses_public_factor() {
    let context =
        ConsumptionContext::new(120, VisibilityLevel::Public).with_quotas(None, Some(400));
    let factor = resolver(RunnerType::Instance, "1.0", "1.0").for_context(&context).unwrap();
    assert_eq!(factor, dec("1.0"));
    assert_eq!(calculate(120, &factor), dec("2.0"));
}

#[test]
fn private_project_on_instance_runner_uses_private_factor() {
    let context =
        ConsumptionContext::new(120, VisibilityLevel::Private).with_quotas(None, Some(400));
    let factor = resolver(RunnerType::Instance, "1.0", "2.0").for_context(&context).unwrap();
    assert_eq!(calculate(120, &factor), dec("4.0"));
}

#[test]
fn namespace_quota_supersedes_instance_gating() {
    let cases = [
        (None, Some(400), "1.5"),
        (None, Some(0), "0"),
        (None, None, "0"),
        (Some(0), Some(400), "0"),
        (Some(0), None, "0"),
        (Some(400), Some(400), "0"),
        (Some(400), None, "0"),
    ];
    for (namespace, instance, expected) in cases {
        let context =
            ConsumptionContext::new(60, VisibilityLevel::Private).with_quotas(namespace, instance);
        let factor = resolver(RunnerType::Instance, "1", "1.5").for_context(&context).unwrap();
        assert_eq!(factor, dec(expected), "namespace {namespace:?} instance {instance:?}");
    }
}

#[test]
fn contribution_override_wins_over_everything() {
    let context = ConsumptionContext::new(60, VisibilityLevel::Public)
        .with_quotas(Some(0), None)
        .with_open_source_plan(true)
        .with_fork_source(VisibilityLevel::Public, true)
        .with_contribution(dec("0.25"));
    for runner_type in [RunnerType::Instance, RunnerType::Group, RunnerType::Project] {
        let cost_factor = resolver(runner_type, "2", "2");
        let factor = cost_factor.for_context(&context).unwrap();
        assert_eq!(factor, dec("0.25"));
        assert_eq!(calculate(60, &factor), dec("0.25"));
        assert!(CostFactor::contribution_applied(&context));
    }
}

#[test]
fn contribution_flag_without_override_falls_through() {
    let mut context =
        ConsumptionContext::new(60, VisibilityLevel::Private).with_quotas(None, Some(400));
    context.is_gitlab_contribution = true;
    assert!(!CostFactor::contribution_applied(&context));
    let factor = resolver(RunnerType::Instance, "1", "3").for_context(&context).unwrap();
    assert_eq!(factor, dec("3"));
}

#[test]
fn negative_contribution_override_is_rejected() {
    let context = ConsumptionContext::new(60, VisibilityLevel::Public).with_contribution(dec("-1"));
    let err = resolver(RunnerType::Instance, "1", "1").for_context(&context).unwrap_err();
    assert!(matches!(err, CostFactorError::NegativeCostFactor { field: "contribution_cost_factor", .. }));
}

#[test]
fn open_source_plan_caps_public_projects() {
    let public = ConsumptionContext::new(60, VisibilityLevel::Public)
        .with_quotas(None, Some(400))
        .with_open_source_plan(true);
    let cost_factor = resolver(RunnerType::Instance, "2", "3");
    assert_eq!(cost_factor.for_context(&public).unwrap(), dec("0.008"));

    let cheap = resolver(RunnerType::Instance, "0.001", "3");
    assert_eq!(cheap.for_context(&public).unwrap(), dec("0.001"));

    let private = ConsumptionContext::new(60, VisibilityLevel::Private)
        .with_quotas(None, Some(400))
        .with_open_source_plan(true);
    assert_eq!(cost_factor.for_context(&private).unwrap(), dec("3"));
}

#[test]
fn fork_of_public_open_source_project_is_capped() {
    let context = ConsumptionContext::new(60, VisibilityLevel::Public)
        .with_quotas(None, Some(400))
        .with_fork_source(VisibilityLevel::Public, true);
    let factor = resolver(RunnerType::Instance, "2.0", "4").for_context(&context).unwrap();
    assert_eq!(factor, dec("0.005"));
}

#[test]
fn fork_rules_follow_source_visibility() {
    let cost_factor = resolver(RunnerType::Instance, "2", "4");

    let public_source = ConsumptionContext::new(60, VisibilityLevel::Private)
        .with_quotas(None, Some(400))
        .with_fork_source(VisibilityLevel::Public, false);
    assert_eq!(cost_factor.for_context(&public_source).unwrap(), dec("2"));

    let private_source = ConsumptionContext::new(60, VisibilityLevel::Private)
        .with_quotas(None, Some(400))
        .with_fork_source(VisibilityLevel::Private, true);
    assert_eq!(cost_factor.for_context(&private_source).unwrap(), dec("4"));
}

#[test]
fn own_namespace_plan_is_checked_before_fork_rules() {
    let context = ConsumptionContext::new(60, VisibilityLevel::Private)
        .with_quotas(None, Some(400))
        .with_open_source_plan(true)
        .with_fork_source(VisibilityLevel::Public, true);
    let factor = resolver(RunnerType::Instance, "2", "4").for_context(&context).unwrap();
    assert_eq!(factor, dec("4"));
}

#[test]
fn internal_open_source_fork_reaches_fork_rules() {
    let cost_factor = resolver(RunnerType::Instance, "2", "5");

    let fork = ConsumptionContext::new(60, VisibilityLevel::Internal)
        .with_quotas(None, Some(400))
        .with_open_source_plan(true)
        .with_fork_source(VisibilityLevel::Public, true);
    assert_eq!(cost_factor.for_context(&fork).unwrap(), dec("0.005"));

    let not_fork = ConsumptionContext::new(60, VisibilityLevel::Internal)
        .with_quotas(None, Some(400))
        .with_open_source_plan(true);
    assert_eq!(cost_factor.for_context(&not_fork).unwrap(), dec("5"));
}

#[test]
fn enabled_and_disabled_follow_the_factor() {
    let charged =
        ConsumptionContext::new(60, VisibilityLevel::Private).with_quotas(None, Some(400));
    let free = ConsumptionContext::new(60, VisibilityLevel::Private).with_quotas(Some(0), None);
    let cost_factor = resolver(RunnerType::Instance, "0", "0.5");
    assert!(cost_factor.enabled(&charged).unwrap());
    assert!(!cost_factor.disabled(&charged).unwrap());
    assert!(!cost_factor.enabled(&free).unwrap());
    assert!(cost_factor.disabled(&free).unwrap());
}

// ============================================================================
// SECTION: Visibility
// ============================================================================

#[test]
fn for_visibility_table() {
    let rows = [
        (RunnerType::Project, PRIVATE, "1", "1", "0"),
        (RunnerType::Project, INTERNAL, "1", "1", "0"),
        (RunnerType::Project, PUBLIC, "1", "1", "0"),
        (RunnerType::Group, PRIVATE, "1", "1", "0"),
        (RunnerType::Group, INTERNAL, "1", "1", "0"),
        (RunnerType::Group, PUBLIC, "1", "1", "0"),
        (RunnerType::Instance, PUBLIC, "1", "5", "1"),
        (RunnerType::Instance, INTERNAL, "1", "5", "5"),
        (RunnerType::Instance, PRIVATE, "1", "5", "5"),
    ];
    for (runner_type, visibility, public, private, expected) in rows {
        let factor = resolver(runner_type, public, private).for_visibility(level(visibility));
        assert_eq!(factor, dec(expected), "{runner_type:?} {visibility}");
    }
}

#[test]
fn invalid_visibility_level_is_rejected() {
    assert_eq!(
        VisibilityLevel::from_level(123),
        Err(CostFactorError::InvalidVisibilityLevel(123))
    );
}

#[test]
fn negative_runner_factors_are_rejected() {
    let runner = Runner {
        runner_type: RunnerType::Instance,
        public_projects_cost_factor: dec("-0.5"),
        private_projects_cost_factor: dec("1"),
    };
    assert!(matches!(
        runner.matcher(),
        Err(CostFactorError::NegativeCostFactor { field: "public_projects_cost_factor", .. })
    ));
}

#[test]
fn matcher_snapshot_ignores_later_runner_edits() {
    let mut runner = Runner {
        runner_type: RunnerType::Instance,
        public_projects_cost_factor: dec("1"),
        private_projects_cost_factor: dec("1"),
    };
    let cost_factor =
        CostFactor::new(runner.matcher().unwrap(), CostFactorSettings::standard().unwrap());
    runner.private_projects_cost_factor = dec("9");
    assert_eq!(cost_factor.for_visibility(VisibilityLevel::Private), dec("1"));
}

// ============================================================================
// SECTION: Effective Limit Gating
// ============================================================================

type Row = (RunnerType, i64, &'static str, &'static str, Option<u64>, Option<u64>, &'static str);

fn shared_rows() -> Vec<Row> {
    vec![
        (RunnerType::Project, PRIVATE, "1", "1", None, Some(400), "0"),
        (RunnerType::Project, INTERNAL, "1", "1", None, Some(400), "0"),
        (RunnerType::Project, PUBLIC, "1", "1", None, Some(400), "0"),
        (RunnerType::Project, PUBLIC, "1", "1", Some(0), Some(0), "0"),
        (RunnerType::Project, PUBLIC, "1", "1", None, None, "0"),
        (RunnerType::Group, PRIVATE, "1", "1", None, Some(400), "0"),
        (RunnerType::Group, INTERNAL, "1", "1", None, Some(400), "0"),
        (RunnerType::Group, PUBLIC, "1", "1", None, Some(400), "0"),
        (RunnerType::Group, PUBLIC, "1", "1", Some(0), Some(0), "0"),
        (RunnerType::Group, PUBLIC, "1", "1", None, None, "0"),
        (RunnerType::Instance, PUBLIC, "0", "5", None, None, "0"),
        (RunnerType::Instance, PUBLIC, "0", "5", None, Some(0), "0"),
        (RunnerType::Instance, PUBLIC, "0", "5", Some(0), Some(400), "0"),
        (RunnerType::Instance, PUBLIC, "2", "5", Some(400), Some(0), "2"),
        (RunnerType::Instance, PUBLIC, "2", "5", None, Some(400), "2"),
        (RunnerType::Instance, PUBLIC, "2", "5", None, Some(0), "0"),
        (RunnerType::Instance, INTERNAL, "0", "5", None, Some(400), "5"),
        (RunnerType::Instance, INTERNAL, "0", "5", None, None, "0"),
        (RunnerType::Instance, INTERNAL, "0", "5", None, Some(0), "0"),
        (RunnerType::Instance, INTERNAL, "0", "5", Some(0), Some(400), "0"),
        (RunnerType::Instance, INTERNAL, "0", "5", Some(400), Some(0), "5"),
        (RunnerType::Instance, INTERNAL, "0", "0", Some(400), Some(0), "0"),
        (RunnerType::Instance, PRIVATE, "0", "5", None, Some(400), "5"),
        (RunnerType::Instance, PRIVATE, "0", "5", None, None, "0"),
        (RunnerType::Instance, PRIVATE, "0", "5", None, Some(0), "0"),
        (RunnerType::Instance, PRIVATE, "0", "5", Some(0), Some(400), "0"),
        (RunnerType::Instance, PRIVATE, "0", "5", Some(400), Some(0), "5"),
        (RunnerType::Instance, PRIVATE, "0", "0", Some(400), Some(0), "0"),
    ]
}

fn assert_rows(rows: &[Row], created_on: Date) {
    for (runner_type, visibility, public, private, namespace, instance, expected) in rows {
        let context = ConsumptionContext::new(60, level(*visibility))
            .with_quotas(*namespace, *instance)
            .with_namespace_created_on(created_on);
        let factor =
            production_resolver(*runner_type, public, private).for_context(&context).unwrap();
        assert_eq!(
            factor,
            dec(expected),
            "{runner_type:?} visibility {visibility} public {public} private {private} namespace {namespace:?} instance {instance:?}"
        );
    }
}

#[test]
fn effective_limit_before_release_date() {
    let mut rows = shared_rows();
    rows.push((RunnerType::Instance, PUBLIC, "0", "5", None, Some(400), "0"));
    rows.push((RunnerType::Instance, PUBLIC, "0", "5", Some(400), Some(0), "0"));
    assert_rows(&rows, Date::from_calendar_date(2021, Month::July, 16).unwrap());
}

#[test]
fn effective_limit_after_release_date() {
    let mut rows = shared_rows();
    rows.push((RunnerType::Instance, PUBLIC, "0", "5", None, Some(400), "0.008"));
    rows.push((RunnerType::Instance, PUBLIC, "0", "5", Some(400), Some(0), "0.008"));
    assert_rows(&rows, Date::from_calendar_date(2021, Month::July, 17).unwrap());
}

#[test]
fn new_namespace_rule_requires_known_creation_date() {
    let context =
        ConsumptionContext::new(60, VisibilityLevel::Public).with_quotas(None, Some(400));
    let factor =
        production_resolver(RunnerType::Instance, "0", "5").for_context(&context).unwrap();
    assert_eq!(factor, dec("0"));
}
