// crates/quota-guard-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Quota Store Tests
// Description: Validate SQLite BanStore and DownloadRateLimiter behavior.
// Purpose: Ensure durable bans, single-winner claims, and window counting.
// Dependencies: quota-guard-store-sqlite, quota-guard-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed quota store, including reopen
//! durability, schema version checks, and a full throttle run over the
//! durable collaborators.

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
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use quota_guard_core::AbuseCheckContext;
use quota_guard_core::AbuseScope;
use quota_guard_core::BanError;
use quota_guard_core::BanStore;
use quota_guard_core::DownloadRateLimiter;
use quota_guard_core::GitAbuseThrottle;
use quota_guard_core::InMemoryAuditSink;
use quota_guard_core::InMemoryUserDirectory;
use quota_guard_core::NamespaceId;
use quota_guard_core::ProjectId;
use quota_guard_core::RecordingBanNotifier;
use quota_guard_core::SharedBanStore;
use quota_guard_core::SharedDownloadRateLimiter;
use quota_guard_core::ThrottleRequest;
use quota_guard_core::Timestamp;
use quota_guard_core::UserId;
use quota_guard_core::UserRecord;
use quota_guard_core::UserState;
use quota_guard_store_sqlite::SqliteQuotaStore;
use quota_guard_store_sqlite::SqliteStoreConfig;
use quota_guard_store_sqlite::SqliteStoreError;
use quota_guard_store_sqlite::SqliteSyncMode;
use rusqlite::Connection;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open(dir: &TempDir) -> SqliteQuotaStore {
    SqliteQuotaStore::new(&SqliteStoreConfig::new(dir.path().join("quota.sqlite"))).unwrap()
}

fn user(id: u64) -> UserId {
    UserId::from_raw(id).unwrap()
}

fn at_second(second: i64) -> Timestamp {
    Timestamp::from_unix_millis(second * 1_000)
}

fn request(scope: AbuseScope, resource: u64, second: i64) -> ThrottleRequest {
    ThrottleRequest {
        key: scope.rate_limit_key(),
        user_id: user(1),
        scope,
        resource_id: ProjectId::from_raw(resource).unwrap(),
        threshold: 3,
        interval_seconds: 60,
        observed_at: at_second(second),
    }
}

fn namespace(id: u64) -> AbuseScope {
    AbuseScope::Namespace(NamespaceId::from_raw(id).unwrap())
}

// ============================================================================
// SECTION: Ban Store
// ============================================================================

#[test]
fn second_ban_reports_already_banned() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    assert!(!store.is_banned(user(1), AbuseScope::Instance).unwrap());
    store.ban(user(1), AbuseScope::Instance, at_second(5)).unwrap();
    let err = store.ban(user(1), AbuseScope::Instance, at_second(6)).unwrap_err();
    assert!(matches!(
        err,
        BanError::AlreadyBanned { user_id, scope: AbuseScope::Instance } if user_id == user(1)
    ));
    assert!(store.is_banned(user(1), AbuseScope::Instance).unwrap());
    assert_eq!(store.banned_at(user(1), AbuseScope::Instance).unwrap(), Some(at_second(5)));
}

#[test]
fn bans_are_scoped() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    store.ban(user(1), namespace(10), at_second(1)).unwrap();
    assert!(store.is_banned(user(1), namespace(10)).unwrap());
    assert!(!store.is_banned(user(1), namespace(11)).unwrap());
    assert!(!store.is_banned(user(1), AbuseScope::Instance).unwrap());
    store.ban(user(1), AbuseScope::Instance, at_second(1)).unwrap();
}

#[test]
fn unban_allows_a_new_ban() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    store.ban(user(1), AbuseScope::Instance, at_second(1)).unwrap();
    assert!(store.unban(user(1), AbuseScope::Instance).unwrap());
    assert!(!store.unban(user(1), AbuseScope::Instance).unwrap());
    assert!(!store.is_banned(user(1), AbuseScope::Instance).unwrap());
    store.ban(user(1), AbuseScope::Instance, at_second(2)).unwrap();
}

#[test]
fn concurrent_bans_have_one_winner() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            thread::spawn(move || store.ban(user(1), AbuseScope::Instance, at_second(1)).is_ok())
        })
        .collect();
    let winners = handles.into_iter().map(|handle| handle.join().unwrap()).filter(|ok| *ok).count();
    assert_eq!(winners, 1);
}

#[test]
fn notification_claim_succeeds_once_per_window() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let scope = AbuseScope::Instance;

    assert!(store.claim_notification(user(1), scope, at_second(100), 60).unwrap());
    assert!(!store.claim_notification(user(1), scope, at_second(100), 60).unwrap());
    assert!(!store.claim_notification(user(1), scope, at_second(159), 60).unwrap());
    assert!(store.claim_notification(user(2), scope, at_second(120), 60).unwrap());
    assert!(store.claim_notification(user(1), namespace(10), at_second(120), 60).unwrap());
    assert!(store.claim_notification(user(1), scope, at_second(160), 60).unwrap());
    assert!(!store.claim_notification(user(1), scope, at_second(200), 60).unwrap());
}

// ============================================================================
// SECTION: Download Rate Limiter
// ============================================================================

#[test]
fn peek_excludes_the_current_download() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let scope = AbuseScope::Instance;

    for (resource, second) in [(1, 0), (2, 1)] {
        let req = request(scope, resource, second);
        assert!(!store.check_only(&req).unwrap());
        assert!(!store.check_and_record(&req).unwrap());
    }
    let third = request(scope, 3, 2);
    assert!(!store.check_only(&third).unwrap());
    assert!(store.check_and_record(&third).unwrap());

    let fourth = request(scope, 4, 3);
    assert!(store.check_only(&fourth).unwrap());
    assert!(store.check_and_record(&fourth).unwrap());
}

#[test]
fn repeat_resources_count_once() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let scope = AbuseScope::Instance;

    for second in 0..10 {
        assert!(!store.check_and_record(&request(scope, 1, second)).unwrap());
    }
    assert!(!store.check_and_record(&request(scope, 2, 10)).unwrap());
    assert!(store.check_and_record(&request(scope, 3, 11)).unwrap());
}

#[test]
fn events_expire_outside_the_window() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let scope = AbuseScope::Instance;

    store.check_and_record(&request(scope, 1, 0)).unwrap();
    store.check_and_record(&request(scope, 2, 30)).unwrap();
    // Window (0s, 60s] drops the first download.
    assert!(!store.check_and_record(&request(scope, 3, 60)).unwrap());
    assert!(store.check_and_record(&request(scope, 4, 61)).unwrap());
}

#[test]
fn scopes_and_users_are_counted_separately() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    store.check_and_record(&request(namespace(10), 1, 0)).unwrap();
    store.check_and_record(&request(namespace(10), 2, 0)).unwrap();
    assert!(!store.check_and_record(&request(namespace(11), 3, 0)).unwrap());
    assert!(!store.check_and_record(&request(AbuseScope::Instance, 3, 0)).unwrap());

    let mut other_user = request(namespace(10), 3, 0);
    other_user.user_id = user(2);
    assert!(!store.check_and_record(&other_user).unwrap());
    assert!(store.check_and_record(&request(namespace(10), 3, 0)).unwrap());
}

proptest! {
    #[test]
    fn record_matches_distinct_count(resources in proptest::collection::vec(1u64..8, 1..20)) {
        let dir = TempDir::new().unwrap();
        let store = open(&dir);
        let mut seen = BTreeSet::new();
        for (offset, resource) in resources.iter().enumerate() {
            let second = i64::try_from(offset).unwrap();
            seen.insert(*resource);
            let throttled = store
                .check_and_record(&request(AbuseScope::Instance, *resource, second))
                .unwrap();
            prop_assert_eq!(throttled, seen.len() >= 3);
        }
    }
}

// ============================================================================
// SECTION: Durability
// ============================================================================

#[test]
fn state_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let store = open(&dir);
        store.ban(user(1), AbuseScope::Instance, at_second(1)).unwrap();
        store.check_and_record(&request(AbuseScope::Instance, 1, 0)).unwrap();
        store.check_and_record(&request(AbuseScope::Instance, 2, 0)).unwrap();
        store.claim_notification(user(1), AbuseScope::Instance, at_second(1), 60).unwrap();
    }
    let store = open(&dir);
    assert!(store.is_banned(user(1), AbuseScope::Instance).unwrap());
    assert!(store.check_and_record(&request(AbuseScope::Instance, 3, 1)).unwrap());
    assert!(!store.claim_notification(user(1), AbuseScope::Instance, at_second(2), 60).unwrap());
}

#[test]
fn rejects_unknown_schema_version() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("quota.sqlite");
    drop(SqliteQuotaStore::new(&SqliteStoreConfig::new(&path)).unwrap());
    Connection::open(&path).unwrap().execute("UPDATE store_meta SET version = 99", []).unwrap();

    let Err(err) = SqliteQuotaStore::new(&SqliteStoreConfig::new(&path)) else {
        panic!("expected version mismatch");
    };
    assert!(matches!(err, SqliteStoreError::VersionMismatch(_)));
}

#[test]
fn rejects_directory_path() {
    let dir = TempDir::new().unwrap();
    let Err(err) = SqliteQuotaStore::new(&SqliteStoreConfig::new(dir.path())) else {
        panic!("expected invalid path");
    };
    assert!(matches!(err, SqliteStoreError::Invalid(_)));
}

#[test]
fn honors_sync_mode_config() {
    let dir = TempDir::new().unwrap();
    let mut config = SqliteStoreConfig::new(dir.path().join("nested").join("quota.sqlite"));
    config.sync_mode = SqliteSyncMode::Normal;
    let store = SqliteQuotaStore::new(&config).unwrap();
    store.ban(user(1), AbuseScope::Instance, at_second(1)).unwrap();
    assert!(dir.path().join("nested").join("quota.sqlite").exists());
}

// ============================================================================
// SECTION: Throttle Integration
// ============================================================================

#[test]
fn throttle_bans_through_durable_store() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let users = InMemoryUserDirectory::new();
    for (id, name, admin) in [(1, "alice", false), (2, "admin", true)] {
        users
            .insert_user(UserRecord {
                id: user(id),
                username: name.to_string(),
                state: UserState::Active,
                instance_admin: admin,
            })
            .unwrap();
    }
    let notifier = RecordingBanNotifier::new();
    let throttle = GitAbuseThrottle::new(
        SharedDownloadRateLimiter::from_limiter(store.clone()),
        SharedBanStore::from_store(store.clone()),
        users,
        notifier.clone(),
        Arc::new(InMemoryAuditSink::new()),
    );

    let mut banned = Vec::new();
    for resource in 1..=4 {
        let context = AbuseCheckContext {
            user_id: user(1),
            scope: AbuseScope::Instance,
            resource_id: ProjectId::from_raw(resource).unwrap(),
            threshold: 3,
            interval_seconds: 60,
            allowlisted_usernames: BTreeSet::new(),
            alertlist_user_ids: BTreeSet::new(),
            auto_ban_enabled: true,
            observed_at: at_second(i64::try_from(resource).unwrap()),
        };
        banned.push(throttle.execute(&context).unwrap().banned);
    }
    assert_eq!(banned, vec![false, false, true, true]);
    assert!(store.is_banned(user(1), AbuseScope::Instance).unwrap());
    let recipients: Vec<u64> =
        notifier.notifications().iter().map(|note| note.admin_id.get()).collect();
    assert_eq!(recipients, vec![2]);
}
