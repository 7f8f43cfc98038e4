// crates/quota-guard-core/src/interfaces/mod.rs
// ============================================================================
// Module: Quota Guard Interfaces
// Description: Collaborator contracts for runner state, rate limiting, bans, users, and notifications.
// Purpose: Define the seams the decision engines call into.
// Dependencies: crate::core, serde, thiserror
// ============================================================================

//! ## Overview
//! The decision engines never touch persistence directly. Every lookup and
//! side effect goes through one of these traits, so hosts can back them with
//! `SQLite`, an in-memory map, or their own services. Collaborator failures
//! are surfaced unchanged to the engine's caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::AbuseScope;
use crate::core::BanNotification;
use crate::core::ProjectId;
use crate::core::Timestamp;
use crate::core::UserId;
use crate::core::UserRecord;

// ============================================================================
// SECTION: Runner State
// ============================================================================

/// Runner and quota facts for one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectRunnerState {
    /// Whether shared runners are enabled for the project.
    pub shared_runners_enabled: bool,
    /// Whether the project's namespace has used up its minutes.
    pub namespace_over_quota: bool,
    /// Whether an online project or group runner can pick up builds.
    pub private_runner_active: bool,
}

/// Runner state lookup errors.
#[derive(Debug, Error)]
pub enum RunnerStateError {
    /// The project is unknown to the source.
    #[error("unknown project: {0}")]
    UnknownProject(ProjectId),
    /// The source reported an error.
    #[error("runner state source error: {0}")]
    Source(String),
}

/// Source of runner and quota facts per project.
pub trait RunnerStateSource {
    /// Loads the runner state of a project.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerStateError`] when the state cannot be loaded.
    fn load(&self, project_id: ProjectId) -> Result<ProjectRunnerState, RunnerStateError>;
}

// ============================================================================
// SECTION: Download Rate Limiter
// ============================================================================

/// Parameters shared by the peek and record limiter calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleRequest {
    /// Rate limiter key derived from the scope.
    pub key: &'static str,
    /// User performing the download.
    pub user_id: UserId,
    /// Throttle scope.
    pub scope: AbuseScope,
    /// Project being downloaded.
    pub resource_id: ProjectId,
    /// Distinct resources allowed before throttling.
    pub threshold: u32,
    /// Sliding window length in seconds.
    pub interval_seconds: u64,
    /// Time of the download.
    pub observed_at: Timestamp,
}

/// Rate limiter errors.
#[derive(Debug, Error)]
pub enum RateLimiterError {
    /// The limiter backend failed.
    #[error("rate limiter error: {0}")]
    Backend(String),
    /// The request parameters were rejected.
    #[error("invalid rate limiter request: {0}")]
    Invalid(String),
}

/// Sliding-window counter of distinct resources per (user, scope).
///
/// A user is throttled when the number of distinct resources recorded in
/// the window reaches the threshold.
pub trait DownloadRateLimiter {
    /// Reports whether the user was already throttled before this download,
    /// without recording it.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimiterError`] when the limiter cannot be consulted.
    fn check_only(&self, request: &ThrottleRequest) -> Result<bool, RateLimiterError>;

    /// Records the download and reports whether the user is throttled.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimiterError`] when the download cannot be recorded.
    fn check_and_record(&self, request: &ThrottleRequest) -> Result<bool, RateLimiterError>;
}

// ============================================================================
// SECTION: Ban Store
// ============================================================================

/// Ban persistence errors.
#[derive(Debug, Error)]
pub enum BanError {
    /// The user is already banned in the scope.
    #[error("user {user_id} already banned in {scope}")]
    AlreadyBanned {
        /// Banned user.
        user_id: UserId,
        /// Ban scope.
        scope: AbuseScope,
    },
    /// The store reported an error.
    #[error("ban store error: {0}")]
    Store(String),
}

/// Persistent ban state and notification claims.
pub trait BanStore {
    /// Bans a user in a scope.
    ///
    /// # Errors
    ///
    /// Returns [`BanError::AlreadyBanned`] when the ban already exists and
    /// [`BanError::Store`] when persistence fails.
    fn ban(&self, user_id: UserId, scope: AbuseScope, at: Timestamp) -> Result<(), BanError>;

    /// Returns true when the user is banned in the scope.
    ///
    /// # Errors
    ///
    /// Returns [`BanError::Store`] when persistence fails.
    fn is_banned(&self, user_id: UserId, scope: AbuseScope) -> Result<bool, BanError>;

    /// Atomically claims the right to notify about a burst.
    ///
    /// Succeeds when no claim for (user, scope) exists within
    /// `interval_seconds` before `at`, recording `at` as the new claim.
    ///
    /// # Errors
    ///
    /// Returns [`BanError::Store`] when persistence fails.
    fn claim_notification(
        &self,
        user_id: UserId,
        scope: AbuseScope,
        at: Timestamp,
        interval_seconds: u64,
    ) -> Result<bool, BanError>;
}

// ============================================================================
// SECTION: User Directory
// ============================================================================

/// User directory errors.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// The directory reported an error.
    #[error("user directory error: {0}")]
    Directory(String),
}

/// Lookup of users and scope administrators.
pub trait UserDirectory {
    /// Returns a user by id.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the lookup fails.
    fn user(&self, user_id: UserId) -> Result<Option<UserRecord>, DirectoryError>;

    /// Returns the administrators of a scope: instance admins for the
    /// instance scope, owners for a namespace scope.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the lookup fails.
    fn scope_admins(&self, scope: AbuseScope) -> Result<Vec<UserRecord>, DirectoryError>;
}

// ============================================================================
// SECTION: Notifier
// ============================================================================

/// Notification queue errors.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The queue rejected the notification.
    #[error("notification enqueue failed: {0}")]
    Enqueue(String),
}

/// Asynchronous ban notification queue.
pub trait BanNotifier {
    /// Enqueues one notification for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`NotifyError`] when the notification cannot be queued.
    fn enqueue_ban_notification(&self, notification: &BanNotification) -> Result<(), NotifyError>;
}
