// crates/quota-guard-core/src/runtime/store.rs
// ============================================================================
// Module: Quota Guard In-Memory Collaborators
// Description: In-memory rate limiter, ban store, user directory, notifier, and runner state.
// Purpose: Provide deterministic collaborator implementations without external deps.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! In-memory implementations of the collaborator traits for tests and
//! single-process hosts. State lives behind `Arc<Mutex<..>>`, so clones share
//! it. The mutex is a process-local compare-and-swap only; multi-process
//! deployments need the `SQLite` store.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

use crate::core::AbuseScope;
use crate::core::BanNotification;
use crate::core::ProjectId;
use crate::core::Timestamp;
use crate::core::UserId;
use crate::core::UserRecord;
use crate::interfaces::BanError;
use crate::interfaces::BanNotifier;
use crate::interfaces::BanStore;
use crate::interfaces::DirectoryError;
use crate::interfaces::DownloadRateLimiter;
use crate::interfaces::NotifyError;
use crate::interfaces::ProjectRunnerState;
use crate::interfaces::RateLimiterError;
use crate::interfaces::RunnerStateError;
use crate::interfaces::RunnerStateSource;
use crate::interfaces::ThrottleRequest;
use crate::interfaces::UserDirectory;

// ============================================================================
// SECTION: Rate Limiter
// ============================================================================

/// Rate limiter bucket key: (limiter key, user, scope).
type BucketKey = (&'static str, UserId, AbuseScope);

/// One recorded download.
#[derive(Debug, Clone, Copy)]
struct DownloadEvent {
    /// Downloaded project.
    resource_id: ProjectId,
    /// Download time.
    observed_at: Timestamp,
}

/// Recorded downloads for one bucket and the window they were recorded under.
#[derive(Debug, Default)]
struct DownloadBucket {
    /// Window length of the latest record.
    interval_seconds: u64,
    /// Downloads still inside the window.
    events: Vec<DownloadEvent>,
}

/// In-memory sliding-window distinct download counter.
///
/// Buckets whose downloads have all left their window are dropped on the
/// next record.
#[derive(Debug, Default, Clone)]
pub struct InMemoryDownloadRateLimiter {
    /// Recorded downloads per bucket.
    buckets: Arc<Mutex<BTreeMap<BucketKey, DownloadBucket>>>,
}

impl InMemoryDownloadRateLimiter {
    /// Creates an empty limiter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of buckets currently holding downloads.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimiterError::Backend`] when the mutex is poisoned.
    pub fn bucket_count(&self) -> Result<usize, RateLimiterError> {
        let guard = self
            .buckets
            .lock()
            .map_err(|_| RateLimiterError::Backend("rate limiter mutex poisoned".to_string()))?;
        Ok(guard.len())
    }
}

/// Counts distinct resources recorded after `window_start`.
fn distinct_in_window(events: &[DownloadEvent], window_start: Timestamp) -> usize {
    events
        .iter()
        .filter(|event| event.observed_at > window_start)
        .map(|event| event.resource_id)
        .collect::<BTreeSet<ProjectId>>()
        .len()
}

/// Returns true when `count` reaches the request threshold.
fn reaches_threshold(count: usize, request: &ThrottleRequest) -> bool {
    count >= usize::try_from(request.threshold).unwrap_or(usize::MAX)
}

impl DownloadRateLimiter for InMemoryDownloadRateLimiter {
    fn check_only(&self, request: &ThrottleRequest) -> Result<bool, RateLimiterError> {
        let guard = self
            .buckets
            .lock()
            .map_err(|_| RateLimiterError::Backend("rate limiter mutex poisoned".to_string()))?;
        let window_start = request.observed_at.window_start(request.interval_seconds);
        let key = (request.key, request.user_id, request.scope);
        let count =
            guard.get(&key).map_or(0, |bucket| distinct_in_window(&bucket.events, window_start));
        drop(guard);
        Ok(reaches_threshold(count, request))
    }

    fn check_and_record(&self, request: &ThrottleRequest) -> Result<bool, RateLimiterError> {
        let mut guard = self
            .buckets
            .lock()
            .map_err(|_| RateLimiterError::Backend("rate limiter mutex poisoned".to_string()))?;
        guard.retain(|_, bucket| {
            let start = request.observed_at.window_start(bucket.interval_seconds);
            bucket.events.retain(|event| event.observed_at > start);
            !bucket.events.is_empty()
        });
        let window_start = request.observed_at.window_start(request.interval_seconds);
        let bucket = guard.entry((request.key, request.user_id, request.scope)).or_default();
        bucket.interval_seconds = request.interval_seconds;
        bucket.events.retain(|event| event.observed_at > window_start);
        bucket.events.push(DownloadEvent {
            resource_id: request.resource_id,
            observed_at: request.observed_at,
        });
        let count = distinct_in_window(&bucket.events, window_start);
        drop(guard);
        Ok(reaches_threshold(count, request))
    }
}

// ============================================================================
// SECTION: Ban Store
// ============================================================================

/// In-memory ban store with per-(user, scope) notification claims.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBanStore {
    /// Ban times per (user, scope).
    bans: Arc<Mutex<BTreeMap<(UserId, AbuseScope), Timestamp>>>,
    /// Last notification claim per (user, scope).
    claims: Arc<Mutex<BTreeMap<(UserId, AbuseScope), Timestamp>>>,
}

impl InMemoryBanStore {
    /// Creates an empty ban store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifts a ban. Returns true when a ban existed.
    ///
    /// # Errors
    ///
    /// Returns [`BanError::Store`] when the store mutex is poisoned.
    pub fn unban(&self, user_id: UserId, scope: AbuseScope) -> Result<bool, BanError> {
        let mut guard =
            self.bans.lock().map_err(|_| BanError::Store("ban store mutex poisoned".to_string()))?;
        Ok(guard.remove(&(user_id, scope)).is_some())
    }
}

impl BanStore for InMemoryBanStore {
    fn ban(&self, user_id: UserId, scope: AbuseScope, at: Timestamp) -> Result<(), BanError> {
        let mut guard =
            self.bans.lock().map_err(|_| BanError::Store("ban store mutex poisoned".to_string()))?;
        if guard.contains_key(&(user_id, scope)) {
            return Err(BanError::AlreadyBanned {
                user_id,
                scope,
            });
        }
        guard.insert((user_id, scope), at);
        drop(guard);
        Ok(())
    }

    fn is_banned(&self, user_id: UserId, scope: AbuseScope) -> Result<bool, BanError> {
        let guard =
            self.bans.lock().map_err(|_| BanError::Store("ban store mutex poisoned".to_string()))?;
        Ok(guard.contains_key(&(user_id, scope)))
    }

    fn claim_notification(
        &self,
        user_id: UserId,
        scope: AbuseScope,
        at: Timestamp,
        interval_seconds: u64,
    ) -> Result<bool, BanError> {
        let mut guard = self
            .claims
            .lock()
            .map_err(|_| BanError::Store("notification claim mutex poisoned".to_string()))?;
        let window_start = at.window_start(interval_seconds);
        if let Some(last) = guard.get(&(user_id, scope))
            && *last > window_start
        {
            return Ok(false);
        }
        guard.insert((user_id, scope), at);
        drop(guard);
        Ok(true)
    }
}

// ============================================================================
// SECTION: User Directory
// ============================================================================

/// In-memory user directory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryUserDirectory {
    /// Users by id.
    users: Arc<Mutex<BTreeMap<UserId, UserRecord>>>,
    /// Namespace owners by scope.
    owners: Arc<Mutex<BTreeMap<AbuseScope, BTreeSet<UserId>>>>,
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the directory mutex is poisoned.
    pub fn insert_user(&self, user: UserRecord) -> Result<(), DirectoryError> {
        self.users
            .lock()
            .map_err(|_| DirectoryError::Directory("user directory mutex poisoned".to_string()))?
            .insert(user.id, user);
        Ok(())
    }

    /// Registers a user as an owner of a scope.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] when the directory mutex is poisoned.
    pub fn add_owner(&self, scope: AbuseScope, user_id: UserId) -> Result<(), DirectoryError> {
        self.owners
            .lock()
            .map_err(|_| DirectoryError::Directory("user directory mutex poisoned".to_string()))?
            .entry(scope)
            .or_default()
            .insert(user_id);
        Ok(())
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn user(&self, user_id: UserId) -> Result<Option<UserRecord>, DirectoryError> {
        let guard = self
            .users
            .lock()
            .map_err(|_| DirectoryError::Directory("user directory mutex poisoned".to_string()))?;
        Ok(guard.get(&user_id).cloned())
    }

    fn scope_admins(&self, scope: AbuseScope) -> Result<Vec<UserRecord>, DirectoryError> {
        let users = self
            .users
            .lock()
            .map_err(|_| DirectoryError::Directory("user directory mutex poisoned".to_string()))?;
        let admins: Vec<UserRecord> = match scope {
            AbuseScope::Instance => {
                users.values().filter(|user| user.instance_admin).cloned().collect()
            }
            AbuseScope::Namespace(_) => {
                let owners = self.owners.lock().map_err(|_| {
                    DirectoryError::Directory("user directory mutex poisoned".to_string())
                })?;
                owners
                    .get(&scope)
                    .map(|ids| ids.iter().filter_map(|id| users.get(id).cloned()).collect())
                    .unwrap_or_default()
            }
        };
        drop(users);
        Ok(admins)
    }
}

// ============================================================================
// SECTION: Notifier
// ============================================================================

/// Notifier that keeps queued notifications in memory.
#[derive(Debug, Default, Clone)]
pub struct RecordingBanNotifier {
    /// Queued notifications in enqueue order.
    queued: Arc<Mutex<Vec<BanNotification>>>,
}

impl RecordingBanNotifier {
    /// Creates an empty notifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the queued notifications.
    #[must_use]
    pub fn notifications(&self) -> Vec<BanNotification> {
        self.queued.lock().map(|queued| queued.clone()).unwrap_or_default()
    }
}

impl BanNotifier for RecordingBanNotifier {
    fn enqueue_ban_notification(&self, notification: &BanNotification) -> Result<(), NotifyError> {
        self.queued
            .lock()
            .map_err(|_| NotifyError::Enqueue("notifier mutex poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}

// ============================================================================
// SECTION: Runner State
// ============================================================================

/// In-memory runner state source that counts loads.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRunnerStateSource {
    /// Runner state per project.
    states: BTreeMap<ProjectId, ProjectRunnerState>,
    /// Number of successful and failed loads.
    loads: Arc<AtomicUsize>,
}

impl InMemoryRunnerStateSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy with the state of a project set.
    #[must_use]
    pub fn with_project(mut self, project_id: ProjectId, state: ProjectRunnerState) -> Self {
        self.states.insert(project_id, state);
        self
    }

    /// Returns the number of loads issued so far.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl RunnerStateSource for InMemoryRunnerStateSource {
    fn load(&self, project_id: ProjectId) -> Result<ProjectRunnerState, RunnerStateError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        self.states.get(&project_id).copied().ok_or(RunnerStateError::UnknownProject(project_id))
    }
}

// ============================================================================
// SECTION: Shared Wrappers
// ============================================================================

/// Shared rate limiter backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedDownloadRateLimiter {
    /// Inner limiter implementation.
    inner: Arc<dyn DownloadRateLimiter + Send + Sync>,
}

impl SharedDownloadRateLimiter {
    /// Wraps a rate limiter in a shared, clonable wrapper.
    #[must_use]
    pub fn from_limiter(limiter: impl DownloadRateLimiter + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(limiter),
        }
    }

    /// Wraps an existing shared limiter.
    #[must_use]
    pub const fn new(limiter: Arc<dyn DownloadRateLimiter + Send + Sync>) -> Self {
        Self {
            inner: limiter,
        }
    }
}

impl DownloadRateLimiter for SharedDownloadRateLimiter {
    fn check_only(&self, request: &ThrottleRequest) -> Result<bool, RateLimiterError> {
        self.inner.check_only(request)
    }

    fn check_and_record(&self, request: &ThrottleRequest) -> Result<bool, RateLimiterError> {
        self.inner.check_and_record(request)
    }
}

/// Shared ban store backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedBanStore {
    /// Inner ban store implementation.
    inner: Arc<dyn BanStore + Send + Sync>,
}

impl SharedBanStore {
    /// Wraps a ban store in a shared, clonable wrapper.
    #[must_use]
    pub fn from_store(store: impl BanStore + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wraps an existing shared store.
    #[must_use]
    pub const fn new(store: Arc<dyn BanStore + Send + Sync>) -> Self {
        Self {
            inner: store,
        }
    }
}

impl BanStore for SharedBanStore {
    fn ban(&self, user_id: UserId, scope: AbuseScope, at: Timestamp) -> Result<(), BanError> {
        self.inner.ban(user_id, scope, at)
    }

    fn is_banned(&self, user_id: UserId, scope: AbuseScope) -> Result<bool, BanError> {
        self.inner.is_banned(user_id, scope)
    }

    fn claim_notification(
        &self,
        user_id: UserId,
        scope: AbuseScope,
        at: Timestamp,
        interval_seconds: u64,
    ) -> Result<bool, BanError> {
        self.inner.claim_notification(user_id, scope, at, interval_seconds)
    }
}
