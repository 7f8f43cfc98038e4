// crates/quota-guard-core/src/runtime/git_abuse.rs
// ============================================================================
// Module: Quota Guard Git Abuse Throttle
// Description: Download-rate throttle with auto-ban and one-time admin notification.
// Purpose: Decide per download whether a user is banned in a scope.
// Dependencies: thiserror, crate::{audit, core, interfaces}
// ============================================================================

//! ## Overview
//! Each download is checked twice against the rate limiter: a peek that does
//! not record, then a record. A peek below threshold followed by a record at
//! threshold marks the triggering call of a burst; only that call logs the
//! breach. With auto-ban on, the persisted ban transition decides who
//! notifies: only the call whose ban succeeds sends the round, and an
//! already banned user is never re-notified. Without a ban (auto-ban off or
//! an exempt user) a persisted notification claim dedupes the round per
//! window.
//!
//! The peek and the record are separate limiter calls. Two workers racing
//! on the same burst may both observe the crossing and both log the breach;
//! notification stays single-winner through the ban or the claim.
//!
//! Security posture: collaborator failures propagate to the caller. The one
//! expected failure, banning an already banned user, is logged and absorbed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::audit::AuditSink;
use crate::audit::GitAbuseAuditEvent;
use crate::audit::GitAbuseAuditEventParams;
use crate::audit::GitAbuseEventKind;
use crate::core::AbuseCheckContext;
use crate::core::AbuseDecision;
use crate::core::BanNotification;
use crate::core::UserId;
use crate::core::UserRecord;
use crate::interfaces::BanError;
use crate::interfaces::BanNotifier;
use crate::interfaces::BanStore;
use crate::interfaces::DirectoryError;
use crate::interfaces::DownloadRateLimiter;
use crate::interfaces::NotifyError;
use crate::interfaces::RateLimiterError;
use crate::interfaces::ThrottleRequest;
use crate::interfaces::UserDirectory;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Git abuse throttle errors.
#[derive(Debug, Error)]
pub enum GitAbuseError {
    /// The downloading user does not exist.
    #[error("unknown user: {0}")]
    UnknownUser(UserId),
    /// The check context is unusable.
    #[error("invalid git abuse context: {0}")]
    InvalidContext(String),
    /// The rate limiter failed.
    #[error(transparent)]
    RateLimiter(#[from] RateLimiterError),
    /// The ban store failed.
    #[error(transparent)]
    Ban(#[from] BanError),
    /// The user directory failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    /// A notification could not be queued.
    #[error(transparent)]
    Notify(#[from] NotifyError),
}

// ============================================================================
// SECTION: Throttle
// ============================================================================

/// Git abuse throttle decision engine.
pub struct GitAbuseThrottle<L, B, U, N> {
    /// Distinct-download rate limiter.
    limiter: L,
    /// Ban persistence and notification claims.
    bans: B,
    /// User and admin lookup.
    users: U,
    /// Notification queue.
    notifier: N,
    /// Audit sink for breach and ban events.
    audit: Arc<dyn AuditSink>,
}

impl<L, B, U, N> GitAbuseThrottle<L, B, U, N>
where
    L: DownloadRateLimiter,
    B: BanStore,
    U: UserDirectory,
    N: BanNotifier,
{
    /// Creates a throttle over the given collaborators.
    #[must_use]
    pub fn new(limiter: L, bans: B, users: U, notifier: N, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            limiter,
            bans,
            users,
            notifier,
            audit,
        }
    }

    /// Evaluates one download.
    ///
    /// # Errors
    ///
    /// Returns [`GitAbuseError`] when the context is invalid, the user is
    /// unknown, or a collaborator fails.
    pub fn execute(&self, context: &AbuseCheckContext) -> Result<AbuseDecision, GitAbuseError> {
        if context.threshold == 0 {
            return Err(GitAbuseError::InvalidContext("threshold must be positive".to_string()));
        }
        if context.interval_seconds == 0 {
            return Err(GitAbuseError::InvalidContext(
                "interval_seconds must be positive".to_string(),
            ));
        }
        let user = self
            .users
            .user(context.user_id)?
            .ok_or(GitAbuseError::UnknownUser(context.user_id))?;
        if context.allowlisted_usernames.contains(&user.username) {
            return Ok(AbuseDecision {
                banned: false,
            });
        }

        let request = ThrottleRequest {
            key: context.scope.rate_limit_key(),
            user_id: user.id,
            scope: context.scope,
            resource_id: context.resource_id,
            threshold: context.threshold,
            interval_seconds: context.interval_seconds,
            observed_at: context.observed_at,
        };
        let already_throttled = self.limiter.check_only(&request)?;
        let throttled = self.limiter.check_and_record(&request)?;
        if !throttled {
            return Ok(AbuseDecision {
                banned: false,
            });
        }

        let triggering = !already_throttled;
        let admins = self.users.scope_admins(context.scope)?;
        let exempt = is_exempt(&user, &admins);

        // Some(true) when this call performed the ban transition.
        let newly_banned = if context.auto_ban_enabled && !exempt {
            match self.bans.ban(user.id, context.scope, context.observed_at) {
                Ok(()) => Some(true),
                Err(BanError::AlreadyBanned {
                    ..
                }) => Some(false),
                Err(err) => return Err(err.into()),
            }
        } else {
            None
        };

        if triggering && newly_banned != Some(false) {
            self.log(GitAbuseEventKind::ThresholdExceeded, &user, context);
        }
        match newly_banned {
            Some(true) => self.log(GitAbuseEventKind::UserBanned, &user, context),
            Some(false) => self.log(GitAbuseEventKind::AlreadyBanned, &user, context),
            None => {}
        }

        let should_notify = match newly_banned {
            Some(newly) => newly,
            None => {
                triggering
                    && self.bans.claim_notification(
                        user.id,
                        context.scope,
                        context.observed_at,
                        context.interval_seconds,
                    )?
            }
        };
        if should_notify {
            self.notify(&user, &admins, context)?;
        }

        let banned = !exempt && self.bans.is_banned(user.id, context.scope)?;
        Ok(AbuseDecision {
            banned,
        })
    }

    /// Queues one notification per active admin and alertlisted user.
    fn notify(
        &self,
        user: &UserRecord,
        admins: &[UserRecord],
        context: &AbuseCheckContext,
    ) -> Result<(), GitAbuseError> {
        let mut recipients: BTreeSet<UserId> =
            admins.iter().filter(|admin| admin.is_active()).map(|admin| admin.id).collect();
        for alert_id in &context.alertlist_user_ids {
            if let Some(alerted) = self.users.user(*alert_id)?
                && alerted.is_active()
            {
                recipients.insert(alerted.id);
            }
        }
        recipients.remove(&user.id);

        for admin_id in recipients {
            self.notifier.enqueue_ban_notification(&BanNotification {
                admin_id,
                user_id: user.id,
                threshold: context.threshold,
                interval_seconds: context.interval_seconds,
                auto_ban_enabled: context.auto_ban_enabled,
                scope: context.scope,
            })?;
        }
        Ok(())
    }

    /// Emits one git abuse audit event.
    fn log(&self, kind: GitAbuseEventKind, user: &UserRecord, context: &AbuseCheckContext) {
        self.audit.record_git_abuse(&GitAbuseAuditEvent::new(GitAbuseAuditEventParams {
            kind,
            observed_at: context.observed_at,
            user_id: user.id,
            username: user.username.clone(),
            scope: context.scope,
            threshold: context.threshold,
            interval_seconds: context.interval_seconds,
            auto_ban_enabled: context.auto_ban_enabled,
        }));
    }
}

/// Returns true for active instance admins and active admins of the scope.
fn is_exempt(user: &UserRecord, scope_admins: &[UserRecord]) -> bool {
    if !user.is_active() {
        return false;
    }
    user.instance_admin || scope_admins.iter().any(|admin| admin.id == user.id)
}
