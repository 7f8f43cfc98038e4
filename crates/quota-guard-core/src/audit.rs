// crates/quota-guard-core/src/audit.rs
// ============================================================================
// Module: Quota Guard Audit Logging
// Description: Structured audit events for consumption and git abuse decisions.
// Purpose: Emit JSON-line audit logs without hard dependencies.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for the decision
//! engines. Sinks receive typed events and decide where to write them; the
//! engines only guarantee which events are emitted and when.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;

use crate::core::AbuseScope;
use crate::core::BuildId;
use crate::core::ProjectId;
use crate::core::Timestamp;
use crate::core::UserId;

// ============================================================================
// SECTION: Types
// ============================================================================

/// CI minutes consumption audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsumptionAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Build identifier when known.
    pub build_id: Option<BuildId>,
    /// Project identifier when known.
    pub project_id: Option<ProjectId>,
    /// Billed duration in seconds.
    pub duration_seconds: u64,
    /// Resolved cost factor, rendered as a decimal string.
    pub cost_factor: String,
    /// Whether the contribution override decided the factor.
    pub gitlab_contribution: bool,
    /// Billed minutes, rendered as a decimal string.
    pub consumption: String,
}

/// Git abuse event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GitAbuseEventKind {
    /// A user crossed the download threshold.
    ThresholdExceeded,
    /// A user was banned.
    UserBanned,
    /// A ban was attempted on an already banned user.
    AlreadyBanned,
}

impl GitAbuseEventKind {
    /// Returns the event identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ThresholdExceeded => "git_abuse_threshold_exceeded",
            Self::UserBanned => "git_abuse_user_banned",
            Self::AlreadyBanned => "git_abuse_already_banned",
        }
    }
}

/// Git abuse audit event payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitAbuseAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Download time supplied by the caller.
    pub observed_at: Timestamp,
    /// Subject user.
    pub user_id: UserId,
    /// Subject username.
    pub username: String,
    /// Throttle scope.
    pub scope: AbuseScope,
    /// Configured threshold.
    pub threshold: u32,
    /// Configured interval in seconds.
    pub interval_seconds: u64,
    /// Whether auto-ban is enabled for the scope.
    pub auto_ban_enabled: bool,
}

/// Parameters for constructing a consumption audit event.
pub struct ConsumptionAuditEventParams {
    /// Build identifier when known.
    pub build_id: Option<BuildId>,
    /// Project identifier when known.
    pub project_id: Option<ProjectId>,
    /// Billed duration in seconds.
    pub duration_seconds: u64,
    /// Resolved cost factor.
    pub cost_factor: String,
    /// Whether the contribution override decided the factor.
    pub gitlab_contribution: bool,
    /// Billed minutes.
    pub consumption: String,
}

/// Parameters for constructing a git abuse audit event.
pub struct GitAbuseAuditEventParams {
    /// Event kind.
    pub kind: GitAbuseEventKind,
    /// Download time supplied by the caller.
    pub observed_at: Timestamp,
    /// Subject user.
    pub user_id: UserId,
    /// Subject username.
    pub username: String,
    /// Throttle scope.
    pub scope: AbuseScope,
    /// Configured threshold.
    pub threshold: u32,
    /// Configured interval in seconds.
    pub interval_seconds: u64,
    /// Whether auto-ban is enabled for the scope.
    pub auto_ban_enabled: bool,
}

/// Returns the current wall-clock time in milliseconds for event stamping.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis()
}

impl ConsumptionAuditEvent {
    /// Creates a consumption audit event stamped with the current time.
    #[must_use]
    pub fn new(params: ConsumptionAuditEventParams) -> Self {
        Self {
            event: "ci_minutes_consumption",
            timestamp_ms: now_ms(),
            build_id: params.build_id,
            project_id: params.project_id,
            duration_seconds: params.duration_seconds,
            cost_factor: params.cost_factor,
            gitlab_contribution: params.gitlab_contribution,
            consumption: params.consumption,
        }
    }
}

impl GitAbuseAuditEvent {
    /// Creates a git abuse audit event stamped with the current time.
    #[must_use]
    pub fn new(params: GitAbuseAuditEventParams) -> Self {
        Self {
            event: params.kind.as_str(),
            timestamp_ms: now_ms(),
            observed_at: params.observed_at,
            user_id: params.user_id,
            username: params.username,
            scope: params.scope,
            threshold: params.threshold,
            interval_seconds: params.interval_seconds,
            auto_ban_enabled: params.auto_ban_enabled,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for decision engine events.
pub trait AuditSink: Send + Sync {
    /// Records a consumption event.
    fn record_consumption(&self, event: &ConsumptionAuditEvent);

    /// Records a git abuse event.
    fn record_git_abuse(&self, _event: &GitAbuseAuditEvent) {}
}

/// Writes one JSON line to a writer, ignoring serialization and I/O failures.
fn write_line(writer: &mut impl Write, event: &impl Serialize) {
    if let Ok(payload) = serde_json::to_string(event) {
        let _ = writeln!(writer, "{payload}");
        let _ = writer.flush();
    }
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record_consumption(&self, event: &ConsumptionAuditEvent) {
        write_line(&mut io::stderr(), event);
    }

    fn record_git_abuse(&self, event: &GitAbuseAuditEvent) {
        write_line(&mut io::stderr(), event);
    }
}

/// Audit sink that appends JSON lines to a file.
pub struct FileAuditSink {
    /// Append-only audit log file.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens a file-backed audit sink.
    ///
    /// # Errors
    ///
    /// Returns [`io::Error`] when the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record_consumption(&self, event: &ConsumptionAuditEvent) {
        if let Ok(mut file) = self.file.lock() {
            write_line(&mut *file, event);
        }
    }

    fn record_git_abuse(&self, event: &GitAbuseAuditEvent) {
        if let Ok(mut file) = self.file.lock() {
            write_line(&mut *file, event);
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_consumption(&self, _event: &ConsumptionAuditEvent) {}

    fn record_git_abuse(&self, _event: &GitAbuseAuditEvent) {}
}

/// Audit sink that keeps events in memory for inspection.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    /// Recorded consumption events.
    consumption: Mutex<Vec<ConsumptionAuditEvent>>,
    /// Recorded git abuse events.
    git_abuse: Mutex<Vec<GitAbuseAuditEvent>>,
}

impl InMemoryAuditSink {
    /// Creates an empty in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded consumption events.
    #[must_use]
    pub fn consumption_events(&self) -> Vec<ConsumptionAuditEvent> {
        self.consumption.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns a copy of the recorded git abuse events.
    #[must_use]
    pub fn git_abuse_events(&self) -> Vec<GitAbuseAuditEvent> {
        self.git_abuse.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Returns the recorded git abuse events of one kind.
    #[must_use]
    pub fn git_abuse_events_of(&self, kind: GitAbuseEventKind) -> Vec<GitAbuseAuditEvent> {
        self.git_abuse_events().into_iter().filter(|event| event.event == kind.as_str()).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record_consumption(&self, event: &ConsumptionAuditEvent) {
        if let Ok(mut events) = self.consumption.lock() {
            events.push(event.clone());
        }
    }

    fn record_git_abuse(&self, event: &GitAbuseAuditEvent) {
        if let Ok(mut events) = self.git_abuse.lock() {
            events.push(event.clone());
        }
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
