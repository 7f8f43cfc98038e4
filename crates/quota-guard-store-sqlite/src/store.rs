// crates/quota-guard-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Quota Store
// Description: Durable BanStore and DownloadRateLimiter backed by SQLite WAL.
// Purpose: Persist bans, notification claims, and download events.
// Dependencies: quota-guard-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! [`SqliteQuotaStore`] keeps three tables behind one mutex-guarded
//! connection:
//!
//! - `bans`: one row per (user, scope). The primary key is the
//!   compare-and-swap; a conflicting insert reports
//!   [`BanError::AlreadyBanned`].
//! - `ban_notifications`: the last notification claim per (user, scope). A
//!   claim is a conditional upsert that only succeeds once per window.
//! - `download_events`: raw download observations. Throttle decisions count
//!   distinct resources strictly inside the sliding window.
//!
//! Database contents are treated as untrusted and decoded with checked
//! conversions.

// ============================================================================//
// SECTION: Imports
// ============================================================================//

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use quota_guard_core::AbuseScope;
use quota_guard_core::BanError;
use quota_guard_core::BanStore;
use quota_guard_core::DownloadRateLimiter;
use quota_guard_core::RateLimiterError;
use quota_guard_core::ThrottleRequest;
use quota_guard_core::Timestamp;
use quota_guard_core::UserId;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::TransactionBehavior;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================//
// SECTION: Constants
// ============================================================================//

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================//
// SECTION: Config
// ============================================================================//

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` quota store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Returns a config for `path` with default pragmas.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================//
// SECTION: Errors
// ============================================================================//

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store input.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<rusqlite::Error> for SqliteStoreError {
    fn from(error: rusqlite::Error) -> Self {
        Self::Db(error.to_string())
    }
}

impl From<SqliteStoreError> for BanError {
    fn from(error: SqliteStoreError) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<SqliteStoreError> for RateLimiterError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            other => Self::Backend(other.to_string()),
        }
    }
}

// ============================================================================//
// SECTION: Store
// ============================================================================//

/// `SQLite`-backed ban store and download rate limiter.
#[derive(Clone)]
pub struct SqliteQuotaStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteQuotaStore {
    /// Opens an `SQLite`-backed quota store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: &SqliteStoreConfig) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Lifts a ban, allowing a later throttle to ban the user again.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the delete fails.
    pub fn unban(&self, user_id: UserId, scope: AbuseScope) -> Result<bool, SqliteStoreError> {
        let user = sql_id(user_id.get())?;
        let removed = self.lock()?.execute(
            "DELETE FROM bans WHERE user_id = ?1 AND scope = ?2",
            params![user, scope.storage_label()],
        )?;
        Ok(removed > 0)
    }

    /// Returns the time a ban was recorded, if any.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the lookup fails.
    pub fn banned_at(
        &self,
        user_id: UserId,
        scope: AbuseScope,
    ) -> Result<Option<Timestamp>, SqliteStoreError> {
        let user = sql_id(user_id.get())?;
        let banned_at: Option<i64> = self
            .lock()?
            .query_row(
                "SELECT banned_at FROM bans WHERE user_id = ?1 AND scope = ?2",
                params![user, scope.storage_label()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(banned_at.map(Timestamp::from_unix_millis))
    }

    /// Acquires the connection guard.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Records a ban unless one already exists.
    fn insert_ban(
        &self,
        user_id: UserId,
        scope: AbuseScope,
        at: Timestamp,
    ) -> Result<bool, SqliteStoreError> {
        let user = sql_id(user_id.get())?;
        let inserted = self.lock()?.execute(
            "INSERT INTO bans (user_id, scope, banned_at) VALUES (?1, ?2, ?3) ON \
             CONFLICT(user_id, scope) DO NOTHING",
            params![user, scope.storage_label(), at.as_unix_millis()],
        )?;
        Ok(inserted == 1)
    }

    /// Returns whether a ban row exists.
    fn ban_exists(&self, user_id: UserId, scope: AbuseScope) -> Result<bool, SqliteStoreError> {
        Ok(self.banned_at(user_id, scope)?.is_some())
    }

    /// Claims the notification slot for the window ending at `at`.
    fn claim(
        &self,
        user_id: UserId,
        scope: AbuseScope,
        at: Timestamp,
        interval_seconds: u64,
    ) -> Result<bool, SqliteStoreError> {
        let user = sql_id(user_id.get())?;
        let window_start = at.window_start(interval_seconds);
        let changed = self.lock()?.execute(
            "INSERT INTO ban_notifications (user_id, scope, claimed_at) VALUES (?1, ?2, ?3) ON \
             CONFLICT(user_id, scope) DO UPDATE SET claimed_at = excluded.claimed_at WHERE \
             ban_notifications.claimed_at <= ?4",
            params![user, scope.storage_label(), at.as_unix_millis(), window_start.as_unix_millis()],
        )?;
        Ok(changed == 1)
    }

    /// Counts distinct resources already recorded inside the window.
    fn count_recorded(&self, request: &ThrottleRequest) -> Result<i64, SqliteStoreError> {
        let user = sql_id(request.user_id.get())?;
        let window_start = request.observed_at.window_start(request.interval_seconds);
        let count = self.lock()?.query_row(
            "SELECT COUNT(DISTINCT resource_id) FROM download_events WHERE throttle_key = ?1 AND \
             user_id = ?2 AND scope = ?3 AND observed_at > ?4",
            params![
                request.key,
                user,
                request.scope.storage_label(),
                window_start.as_unix_millis()
            ],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Prunes expired events, records this download, and counts the window.
    fn record_and_count(&self, request: &ThrottleRequest) -> Result<i64, SqliteStoreError> {
        let user = sql_id(request.user_id.get())?;
        let resource = sql_id(request.resource_id.get())?;
        let scope = request.scope.storage_label();
        let window_start = request.observed_at.window_start(request.interval_seconds);
        let mut guard = self.lock()?;
        let tx = guard.transaction_with_behavior(TransactionBehavior::Immediate)?;
        tx.execute(
            "DELETE FROM download_events WHERE throttle_key = ?1 AND user_id = ?2 AND scope = ?3 \
             AND observed_at <= ?4",
            params![request.key, user, scope, window_start.as_unix_millis()],
        )?;
        tx.execute(
            "INSERT INTO download_events (throttle_key, user_id, scope, resource_id, observed_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![request.key, user, scope, resource, request.observed_at.as_unix_millis()],
        )?;
        let count: i64 = tx.query_row(
            "SELECT COUNT(DISTINCT resource_id) FROM download_events WHERE throttle_key = ?1 AND \
             user_id = ?2 AND scope = ?3 AND observed_at > ?4",
            params![request.key, user, scope, window_start.as_unix_millis()],
            |row| row.get(0),
        )?;
        tx.commit()?;
        drop(guard);
        Ok(count)
    }
}

impl BanStore for SqliteQuotaStore {
    fn ban(&self, user_id: UserId, scope: AbuseScope, at: Timestamp) -> Result<(), BanError> {
        if self.insert_ban(user_id, scope, at)? {
            Ok(())
        } else {
            Err(BanError::AlreadyBanned {
                user_id,
                scope,
            })
        }
    }

    fn is_banned(&self, user_id: UserId, scope: AbuseScope) -> Result<bool, BanError> {
        Ok(self.ban_exists(user_id, scope)?)
    }

    fn claim_notification(
        &self,
        user_id: UserId,
        scope: AbuseScope,
        at: Timestamp,
        interval_seconds: u64,
    ) -> Result<bool, BanError> {
        Ok(self.claim(user_id, scope, at, interval_seconds)?)
    }
}

impl DownloadRateLimiter for SqliteQuotaStore {
    fn check_only(&self, request: &ThrottleRequest) -> Result<bool, RateLimiterError> {
        let count = self.count_recorded(request)?;
        Ok(count >= i64::from(request.threshold))
    }

    fn check_and_record(&self, request: &ThrottleRequest) -> Result<bool, RateLimiterError> {
        let count = self.record_and_count(request)?;
        Ok(count >= i64::from(request.threshold))
    }
}

// ============================================================================//
// SECTION: Helpers
// ============================================================================//

/// Converts an identifier to its `SQLite` integer form.
fn sql_id(raw: u64) -> Result<i64, SqliteStoreError> {
    i64::try_from(raw)
        .map_err(|_| SqliteStoreError::Invalid(format!("identifier out of range: {raw}")))
}

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.exists() && path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with secure defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies `SQLite` pragmas required for durability.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteStoreConfig,
) -> Result<(), SqliteStoreError> {
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))?;
    connection.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

/// Initializes the `SQLite` schema or validates existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS bans (
                    user_id INTEGER NOT NULL,
                    scope TEXT NOT NULL,
                    banned_at INTEGER NOT NULL,
                    PRIMARY KEY (user_id, scope)
                );
                CREATE TABLE IF NOT EXISTS ban_notifications (
                    user_id INTEGER NOT NULL,
                    scope TEXT NOT NULL,
                    claimed_at INTEGER NOT NULL,
                    PRIMARY KEY (user_id, scope)
                );
                CREATE TABLE IF NOT EXISTS download_events (
                    throttle_key TEXT NOT NULL,
                    user_id INTEGER NOT NULL,
                    scope TEXT NOT NULL,
                    resource_id INTEGER NOT NULL,
                    observed_at INTEGER NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_download_events_window
                    ON download_events (throttle_key, user_id, scope, observed_at);",
            )?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}
