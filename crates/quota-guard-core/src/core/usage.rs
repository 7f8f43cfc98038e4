// crates/quota-guard-core/src/core/usage.rs
// ============================================================================
// Module: Quota Guard Minutes Usage Reports
// Description: Monthly and purchased CI minutes reports for a namespace.
// Purpose: Summarize consumed minutes against monthly and purchased limits.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Minutes are consumed from the monthly allowance first and overflow into
//! purchased minutes. [`MinutesUsage`] holds the namespace facts once and
//! derives both reports and their percentages from them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Reports
// ============================================================================

/// Limit shown on a usage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "minutes", rename_all = "snake_case")]
pub enum ReportLimit {
    /// A finite limit in minutes.
    Minutes(u64),
    /// Quota is disabled but usage is tracked.
    Unlimited,
    /// The namespace cannot carry a quota.
    NotSupported,
}

/// Quota status of a usage report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageStatus {
    /// Quota enforcement is off.
    Disabled,
    /// Usage is below the limit.
    UnderQuota,
    /// Usage reached the limit.
    OverQuota,
}

/// One usage report line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageReport {
    /// Minutes used against this limit.
    pub used: u64,
    /// Applicable limit.
    pub limit: ReportLimit,
    /// Quota status.
    pub status: UsageStatus,
}

// ============================================================================
// SECTION: Minutes Usage
// ============================================================================

/// CI minutes facts for one namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinutesUsage {
    /// Whether a positive quota applies to the namespace.
    pub quota_enabled: bool,
    /// Whether the namespace is a root namespace.
    pub root_namespace: bool,
    /// Whether any project in the namespace has shared runners enabled.
    pub any_project_with_shared_runners: bool,
    /// Monthly allowance in minutes.
    pub monthly_limit: u64,
    /// Purchased minutes; 0 when none were purchased.
    pub purchased_limit: u64,
    /// Minutes used this period.
    pub minutes_used: u64,
}

impl MinutesUsage {
    /// Returns true when shared runner usage is shown at all.
    #[must_use]
    pub const fn display_shared_runners_data(&self) -> bool {
        self.root_namespace && self.any_project_with_shared_runners
    }

    /// Returns the monthly allowance report.
    #[must_use]
    pub const fn monthly_minutes_report(&self) -> UsageReport {
        if !self.quota_enabled {
            let limit = if self.display_shared_runners_data() {
                ReportLimit::Unlimited
            } else {
                ReportLimit::NotSupported
            };
            return UsageReport {
                used: self.minutes_used,
                limit,
                status: UsageStatus::Disabled,
            };
        }
        let status = if self.minutes_used >= self.monthly_limit {
            UsageStatus::OverQuota
        } else {
            UsageStatus::UnderQuota
        };
        UsageReport {
            used: self.minutes_used,
            limit: ReportLimit::Minutes(self.monthly_limit),
            status,
        }
    }

    /// Returns the purchased minutes report.
    #[must_use]
    pub const fn purchased_minutes_report(&self) -> UsageReport {
        let status = if self.purchased_minutes_used_up() {
            UsageStatus::OverQuota
        } else {
            UsageStatus::UnderQuota
        };
        UsageReport {
            used: self.purchased_minutes_used(),
            limit: ReportLimit::Minutes(self.purchased_limit),
            status,
        }
    }

    /// Returns the share of the monthly allowance used, in whole percent.
    ///
    /// Capped at 100 once purchased minutes exist, since overflow is
    /// reported against the purchased allowance.
    #[must_use]
    pub fn monthly_percent_used(&self) -> u64 {
        if !self.quota_enabled || self.monthly_limit == 0 {
            return 0;
        }
        let percent = percent_of(self.minutes_used, self.monthly_limit);
        if self.purchased_limit == 0 { percent } else { percent.min(100) }
    }

    /// Returns the share of purchased minutes used, in whole percent.
    #[must_use]
    pub fn purchased_percent_used(&self) -> u64 {
        if !self.quota_enabled || self.purchased_limit == 0 {
            return 0;
        }
        percent_of(self.purchased_minutes_used(), self.purchased_limit)
    }

    /// Minutes drawn from the purchased allowance.
    const fn purchased_minutes_used(&self) -> u64 {
        if self.purchased_limit == 0 {
            return 0;
        }
        self.minutes_used.saturating_sub(self.monthly_limit)
    }

    /// True when monthly and purchased minutes are both exhausted.
    const fn purchased_minutes_used_up(&self) -> bool {
        self.quota_enabled
            && self.purchased_limit > 0
            && self.minutes_used >= self.monthly_limit.saturating_add(self.purchased_limit)
    }
}

/// Integer percentage of `used` against a non-zero `limit`.
fn percent_of(used: u64, limit: u64) -> u64 {
    used.saturating_mul(100) / limit
}

// ============================================================================
// SECTION: Tests
// ============================================================================
