// crates/quota-guard-core/src/core/abuse.rs
// ============================================================================
// Module: Quota Guard Git Abuse Types
// Description: Scopes, check contexts, users, and notifications for git abuse throttling.
// Purpose: Provide the value types exchanged with git abuse collaborators.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A git abuse check is evaluated per (user, scope). The scope is either the
//! whole instance or one namespace; rate limiter keys and admin sets are
//! derived from it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::NamespaceId;
use crate::core::identifiers::ProjectId;
use crate::core::identifiers::UserId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Scope
// ============================================================================

/// Rate limiter key for instance-wide unique project downloads.
pub const APPLICATION_DOWNLOADS_KEY: &str = "unique_project_downloads_for_application";
/// Rate limiter key for namespace unique project downloads.
pub const NAMESPACE_DOWNLOADS_KEY: &str = "unique_project_downloads_for_namespace";

/// Scope a throttle and ban applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "namespace_id", rename_all = "snake_case")]
pub enum AbuseScope {
    /// The whole instance.
    Instance,
    /// A single top-level namespace.
    Namespace(NamespaceId),
}

impl AbuseScope {
    /// Returns the rate limiter key for this scope.
    #[must_use]
    pub const fn rate_limit_key(self) -> &'static str {
        match self {
            Self::Instance => APPLICATION_DOWNLOADS_KEY,
            Self::Namespace(_) => NAMESPACE_DOWNLOADS_KEY,
        }
    }

    /// Returns a stable storage label (`instance` or `namespace:<id>`).
    #[must_use]
    pub fn storage_label(self) -> String {
        self.to_string()
    }
}

impl fmt::Display for AbuseScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Instance => f.write_str("instance"),
            Self::Namespace(id) => write!(f, "namespace:{id}"),
        }
    }
}

// ============================================================================
// SECTION: Users
// ============================================================================

/// Account state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserState {
    /// Active account.
    Active,
    /// Deactivated account.
    Deactivated,
    /// Blocked account.
    Blocked,
}

/// User record as seen by the throttle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// User identifier.
    pub id: UserId,
    /// Username.
    pub username: String,
    /// Account state.
    pub state: UserState,
    /// Whether the user is an instance administrator.
    pub instance_admin: bool,
}

impl UserRecord {
    /// Returns true for active accounts.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self.state, UserState::Active)
    }
}

// ============================================================================
// SECTION: Check Context
// ============================================================================

/// Inputs for one git abuse throttle evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbuseCheckContext {
    /// User performing the download.
    pub user_id: UserId,
    /// Throttle scope.
    pub scope: AbuseScope,
    /// Project being downloaded.
    pub resource_id: ProjectId,
    /// Distinct downloads allowed within the interval before throttling.
    pub threshold: u32,
    /// Sliding window length in seconds.
    pub interval_seconds: u64,
    /// Usernames exempt from throttling.
    pub allowlisted_usernames: BTreeSet<String>,
    /// Users notified in addition to scope admins.
    pub alertlist_user_ids: BTreeSet<UserId>,
    /// Whether throttled users are banned.
    pub auto_ban_enabled: bool,
    /// Time of the download.
    pub observed_at: Timestamp,
}

/// Result of a git abuse throttle evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbuseDecision {
    /// Whether the user is banned in the scope as of this evaluation.
    pub banned: bool,
}

// ============================================================================
// SECTION: Notifications
// ============================================================================

/// Ban notification queued for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BanNotification {
    /// Recipient (admin or alertlisted user).
    pub admin_id: UserId,
    /// User that exceeded the threshold.
    pub user_id: UserId,
    /// Configured threshold.
    pub threshold: u32,
    /// Configured interval in seconds.
    pub interval_seconds: u64,
    /// Whether auto-ban was enabled for the scope.
    pub auto_ban_enabled: bool,
    /// Scope that was exceeded.
    pub scope: AbuseScope,
}

// ============================================================================
// SECTION: Tests
// ============================================================================
