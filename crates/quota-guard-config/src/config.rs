// crates/quota-guard-config/src/config.rs
// ============================================================================
// Module: Quota Guard Configuration
// Description: Configuration loading and validation for quota guard.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: quota-guard-core, quota-guard-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing or invalid configuration fails closed. Validated sections convert
//! into [`CostFactorSettings`], per-scope [`AbuseCheckContext`] values, a
//! [`SqliteStoreConfig`], and an [`AuditSink`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use quota_guard_core::AbuseCheckContext;
use quota_guard_core::AbuseScope;
use quota_guard_core::AuditSink;
use quota_guard_core::ConsumptionContext;
use quota_guard_core::CostFactorSettings;
use quota_guard_core::FileAuditSink;
use quota_guard_core::NewNamespacePublicRule;
use quota_guard_core::NoopAuditSink;
use quota_guard_core::OPEN_SOURCE_CONTRIBUTION_FACTOR;
use quota_guard_core::PUBLIC_OPEN_SOURCE_PLAN_FACTOR;
use quota_guard_core::ProjectId;
use quota_guard_core::QuotaGating;
use quota_guard_core::StderrAuditSink;
use quota_guard_core::Timestamp;
use quota_guard_core::UserId;
use quota_guard_core::VisibilityLevel;
use quota_guard_store_sqlite::SqliteStoreConfig;
use quota_guard_store_sqlite::SqliteStoreMode;
use quota_guard_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "quota-guard.toml";
/// Environment variable used to override the config path.
pub(crate) const CONFIG_ENV_VAR: &str = "QUOTA_GUARD_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum distinct downloads threshold.
pub const MAX_DOWNLOADS_LIMIT: u32 = 10_000;
/// Maximum throttle window (ten days).
pub const MAX_DOWNLOADS_PERIOD_SECONDS: u64 = 10 * 24 * 60 * 60;
/// Maximum number of allowlisted usernames per scope.
pub const MAX_ALLOWLIST_ENTRIES: usize = 100;
/// Maximum number of alertlisted users per scope.
pub const MAX_ALERTLIST_ENTRIES: usize = 100;
/// Maximum username length.
pub(crate) const MAX_USERNAME_LENGTH: usize = 255;
/// Maximum number of namespace override entries.
pub(crate) const MAX_NAMESPACE_OVERRIDES: usize = 4096;
/// Maximum length of a decimal factor string.
pub(crate) const MAX_FACTOR_LENGTH: usize = 64;
/// Calendar date format for release dates.
const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Quota guard configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QuotaGuardConfig {
    /// Cost factor resolver configuration.
    #[serde(default)]
    pub cost_factor: CostFactorConfig,
    /// Git abuse throttle configuration.
    #[serde(default)]
    pub git_abuse: GitAbuseConfig,
    /// Ban and download event store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Audit event sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl QuotaGuardConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is the explicit argument, then `QUOTA_GUARD_CONFIG`, then
    /// `quota-guard.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.cost_factor.validate()?;
        self.git_abuse.validate()?;
        self.store.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Cost Factor
// ============================================================================

/// Cost factor resolver configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CostFactorConfig {
    /// Instance-wide shared runner minutes quota (`None` when unset).
    #[serde(default)]
    pub instance_quota_minutes: Option<u64>,
    /// How namespace and instance quotas gate charging.
    #[serde(default)]
    pub quota_gating: QuotaGating,
    /// Ceiling for public projects in Open Source plan namespaces.
    #[serde(default = "default_public_open_source_plan_factor")]
    pub public_open_source_plan_factor: String,
    /// Ceiling for forks contributing to public Open Source plan projects.
    #[serde(default = "default_open_source_contribution_factor")]
    pub open_source_contribution_factor: String,
    /// Optional new-namespace public project rule.
    #[serde(default)]
    pub new_namespace_public: Option<NewNamespacePublicConfig>,
}

impl Default for CostFactorConfig {
    fn default() -> Self {
        Self {
            instance_quota_minutes: None,
            quota_gating: QuotaGating::default(),
            public_open_source_plan_factor: default_public_open_source_plan_factor(),
            open_source_contribution_factor: default_open_source_contribution_factor(),
            new_namespace_public: None,
        }
    }
}

impl CostFactorConfig {
    /// Builds the validated settings snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for malformed or negative factors and
    /// malformed release dates.
    pub fn settings(&self) -> Result<CostFactorSettings, ConfigError> {
        let rule = self
            .new_namespace_public
            .as_ref()
            .map(NewNamespacePublicConfig::rule)
            .transpose()?;
        CostFactorSettings::new(
            self.quota_gating,
            parse_factor(
                "cost_factor.public_open_source_plan_factor",
                &self.public_open_source_plan_factor,
            )?,
            parse_factor(
                "cost_factor.open_source_contribution_factor",
                &self.open_source_contribution_factor,
            )?,
            rule,
        )
        .map_err(|err| ConfigError::Invalid(format!("cost_factor: {err}")))
    }

    /// Returns a consumption context carrying the configured instance quota.
    ///
    /// The namespace quota and fork attributes are left for the caller.
    #[must_use]
    pub fn context(
        &self,
        duration_seconds: u64,
        project_visibility: VisibilityLevel,
    ) -> ConsumptionContext {
        ConsumptionContext::new(duration_seconds, project_visibility)
            .with_quotas(None, self.instance_quota_minutes)
    }

    /// Validates cost factor configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.settings().map(|_| ())
    }
}

/// New-namespace public project rule configuration.
///
/// Omitted fields fall back to the historical release date and factor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewNamespacePublicConfig {
    /// Release date as `YYYY-MM-DD`.
    #[serde(default)]
    pub release_date: Option<String>,
    /// Factor charged to affected public projects.
    #[serde(default)]
    pub factor: Option<String>,
}

impl NewNamespacePublicConfig {
    /// Builds the rule, applying defaults for omitted fields.
    fn rule(&self) -> Result<NewNamespacePublicRule, ConfigError> {
        let mut rule = NewNamespacePublicRule::standard()
            .map_err(|err| ConfigError::Invalid(format!("cost_factor: {err}")))?;
        if let Some(date) = &self.release_date {
            rule.release_date = Date::parse(date.trim(), DATE_FORMAT).map_err(|_| {
                ConfigError::Invalid(
                    "cost_factor.new_namespace_public.release_date must be YYYY-MM-DD".to_string(),
                )
            })?;
        }
        if let Some(factor) = &self.factor {
            rule.factor = parse_factor("cost_factor.new_namespace_public.factor", factor)?;
        }
        Ok(rule)
    }
}

// ============================================================================
// SECTION: Git Abuse
// ============================================================================

/// Throttle limits for one scope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitAbuseLimits {
    /// Distinct downloads allowed per window; zero disables throttling.
    #[serde(default)]
    pub max_downloads: u32,
    /// Window length in seconds; zero disables throttling.
    #[serde(default)]
    pub max_downloads_period_seconds: u64,
    /// Usernames never throttled.
    #[serde(default)]
    pub allowlist: Vec<String>,
    /// User ids notified in addition to scope admins.
    #[serde(default)]
    pub alertlist: Vec<u64>,
    /// Whether throttled users are banned.
    #[serde(default)]
    pub auto_ban: bool,
}

impl GitAbuseLimits {
    /// Validates limits, prefixing errors with `field`.
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.max_downloads > MAX_DOWNLOADS_LIMIT {
            return Err(ConfigError::Invalid(format!(
                "{field}.max_downloads must be between 0 and {MAX_DOWNLOADS_LIMIT}"
            )));
        }
        if self.max_downloads_period_seconds > MAX_DOWNLOADS_PERIOD_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "{field}.max_downloads_period_seconds must be between 0 and \
                 {MAX_DOWNLOADS_PERIOD_SECONDS}"
            )));
        }
        if self.allowlist.len() > MAX_ALLOWLIST_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "{field}.allowlist exceeds {MAX_ALLOWLIST_ENTRIES} entries"
            )));
        }
        let mut seen = BTreeSet::new();
        for username in &self.allowlist {
            if username.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{field}.allowlist entries must be non-empty"
                )));
            }
            if username.trim() != username {
                return Err(ConfigError::Invalid(format!(
                    "{field}.allowlist entries must be trimmed"
                )));
            }
            if username.len() > MAX_USERNAME_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "{field}.allowlist entry exceeds max length"
                )));
            }
            if !seen.insert(username.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate {field}.allowlist entry: {username}"
                )));
            }
        }
        if self.alertlist.len() > MAX_ALERTLIST_ENTRIES {
            return Err(ConfigError::Invalid(format!(
                "{field}.alertlist exceeds {MAX_ALERTLIST_ENTRIES} entries"
            )));
        }
        if self.alertlist.contains(&0) {
            return Err(ConfigError::Invalid(format!(
                "{field}.alertlist user ids must be positive"
            )));
        }
        Ok(())
    }

    /// Returns true when both the threshold and window are set.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.max_downloads > 0 && self.max_downloads_period_seconds > 0
    }

    /// Builds a check context, or `None` when throttling is disabled.
    #[must_use]
    pub fn context(
        &self,
        user_id: UserId,
        scope: AbuseScope,
        resource_id: ProjectId,
        observed_at: Timestamp,
    ) -> Option<AbuseCheckContext> {
        if !self.enabled() {
            return None;
        }
        Some(AbuseCheckContext {
            user_id,
            scope,
            resource_id,
            threshold: self.max_downloads,
            interval_seconds: self.max_downloads_period_seconds,
            allowlisted_usernames: self.allowlist.iter().cloned().collect(),
            alertlist_user_ids: self.alertlist.iter().copied().filter_map(UserId::from_raw).collect(),
            auto_ban_enabled: self.auto_ban,
            observed_at,
        })
    }
}

/// Per-namespace throttle override.
#[derive(Debug, Clone, Deserialize)]
pub struct NamespaceGitAbuseConfig {
    /// Top-level namespace the limits apply to.
    pub namespace_id: u64,
    /// Limits for the namespace scope.
    #[serde(flatten)]
    pub limits: GitAbuseLimits,
}

/// Git abuse throttle configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitAbuseConfig {
    /// Instance-wide limits.
    #[serde(flatten)]
    pub limits: GitAbuseLimits,
    /// Namespace-scoped limits.
    #[serde(default)]
    pub namespaces: Vec<NamespaceGitAbuseConfig>,
}

impl GitAbuseConfig {
    /// Validates git abuse configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.limits.validate("git_abuse")?;
        if self.namespaces.len() > MAX_NAMESPACE_OVERRIDES {
            return Err(ConfigError::Invalid(format!(
                "git_abuse.namespaces exceeds {MAX_NAMESPACE_OVERRIDES} entries"
            )));
        }
        let mut seen = BTreeSet::new();
        for entry in &self.namespaces {
            if entry.namespace_id == 0 {
                return Err(ConfigError::Invalid(
                    "git_abuse.namespaces.namespace_id must be positive".to_string(),
                ));
            }
            if !seen.insert(entry.namespace_id) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate git_abuse.namespaces.namespace_id: {}",
                    entry.namespace_id
                )));
            }
            entry.limits.validate(&format!("git_abuse.namespaces[{}]", entry.namespace_id))?;
        }
        Ok(())
    }

    /// Returns the limits configured for `scope`, if any.
    #[must_use]
    pub fn limits_for(&self, scope: AbuseScope) -> Option<&GitAbuseLimits> {
        match scope {
            AbuseScope::Instance => Some(&self.limits),
            AbuseScope::Namespace(namespace_id) => self
                .namespaces
                .iter()
                .find(|entry| entry.namespace_id == namespace_id.get())
                .map(|entry| &entry.limits),
        }
    }

    /// Builds the check context for one download in `scope`.
    ///
    /// Returns `None` when the scope has no limits or throttling is disabled.
    #[must_use]
    pub fn context_for(
        &self,
        user_id: UserId,
        scope: AbuseScope,
        resource_id: ProjectId,
        observed_at: Timestamp,
    ) -> Option<AbuseCheckContext> {
        self.limits_for(scope)?.context(user_id, scope, resource_id, observed_at)
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Store backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreType {
    /// Use the in-memory store.
    #[default]
    Memory,
    /// Use the `SQLite`-backed durable store.
    Sqlite,
}

/// Ban and download event store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend type.
    #[serde(rename = "type", default)]
    pub store_type: StoreType,
    /// `SQLite` database path when using the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_store_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_type: StoreType::default(),
            path: None,
            busy_timeout_ms: default_store_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.store_type {
            StoreType::Memory => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid("memory store must not set path".to_string()));
                }
                Ok(())
            }
            StoreType::Sqlite => {
                let path = self
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::Invalid("sqlite store requires path".to_string()))?;
                validate_path_string("store.path", &path.to_string_lossy())
            }
        }
    }

    /// Returns the `SQLite` store config when the sqlite backend is selected.
    #[must_use]
    pub fn sqlite_config(&self) -> Option<SqliteStoreConfig> {
        match (self.store_type, &self.path) {
            (StoreType::Sqlite, Some(path)) => Some(SqliteStoreConfig {
                path: path.clone(),
                busy_timeout_ms: self.busy_timeout_ms,
                journal_mode: self.journal_mode,
                sync_mode: self.sync_mode,
            }),
            _ => None,
        }
    }
}

// ============================================================================
// SECTION: Audit
// ============================================================================

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to `audit.path`.
    File,
    /// Discard events.
    #[serde(rename = "none")]
    Disabled,
}

/// Audit event sink configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    /// Sink kind.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path (JSON lines) for file sinks.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("file audit sink requires audit.path".to_string()))
            }
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path requires sink = \"file\"".to_string()))
            }
            (_, None) => Ok(()),
        }
    }

    /// Builds the configured audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file sink cannot be opened.
    pub fn build_sink(&self) -> Result<Arc<dyn AuditSink>, ConfigError> {
        match self.sink {
            AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
            AuditSinkKind::Disabled => Ok(Arc::new(NoopAuditSink)),
            AuditSinkKind::File => {
                let path = self.path.as_deref().ok_or_else(|| {
                    ConfigError::Invalid("file audit sink requires audit.path".to_string())
                })?;
                let sink = FileAuditSink::new(Path::new(path.trim()))
                    .map_err(|err| ConfigError::Io(err.to_string()))?;
                Ok(Arc::new(sink))
            }
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Parses a decimal factor string.
fn parse_factor(field: &str, value: &str) -> Result<BigDecimal, ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.len() > MAX_FACTOR_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} must be a decimal number")));
    }
    BigDecimal::from_str(trimmed)
        .map_err(|_| ConfigError::Invalid(format!("{field} must be a decimal number")))
}

/// Default Open Source plan ceiling.
fn default_public_open_source_plan_factor() -> String {
    PUBLIC_OPEN_SOURCE_PLAN_FACTOR.to_string()
}

/// Default Open Source contribution ceiling.
fn default_open_source_contribution_factor() -> String {
    OPEN_SOURCE_CONTRIBUTION_FACTOR.to_string()
}

/// Default busy timeout for the `SQLite` store.
pub(crate) const fn default_store_busy_timeout_ms() -> u64 {
    5_000
}

// ============================================================================
// SECTION: Tests
// ============================================================================
