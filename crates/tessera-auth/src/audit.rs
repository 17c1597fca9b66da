//! Security event records.
//!
//! Every issuance, rotation, revocation, and reuse/replay detection emits a
//! structured event. The sink is a collaborator: it may forward events to
//! the audit pipeline, but it can neither block nor fail the operation that
//! produced the event.

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::reason::RevocationReason;

/// Event severity, mirroring the security-response escalation path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Routine lifecycle event.
    Info,
    /// Unusual but handled.
    Warning,
    /// Forced revocation occurred.
    High,
    /// Active attack signal.
    Critical,
}

impl Severity {
    /// Returns the severity as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

/// A structured security event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SecurityEvent {
    /// A token pair was issued at login.
    PairIssued {
        /// Authenticated user.
        user_id: Uuid,
        /// New session.
        session_id: Uuid,
        /// Extended-lifetime flag.
        remember_me: bool,
    },

    /// A refresh token was rotated.
    TokenRotated {
        /// Owning user.
        user_id: Uuid,
        /// Session whose credential was swapped.
        session_id: Uuid,
        /// Rotation counter of the replacement credential.
        rotation_count: i32,
    },

    /// An already-retired refresh token was presented: theft-or-race
    /// signal; every credential for the user was force-revoked.
    ReuseDetected {
        /// Owning user.
        user_id: Uuid,
        /// The reused token id.
        token_id: Uuid,
        /// IP the reuse came from.
        client_ip: String,
    },

    /// A single token was revoked.
    TokenRevoked {
        /// Owning user.
        user_id: Uuid,
        /// The revoked token id.
        token_id: Uuid,
        /// Why it was revoked.
        reason: RevocationReason,
    },

    /// Every credential for a user was revoked.
    BulkRevocation {
        /// Owning user.
        user_id: Uuid,
        /// Why the bulk revocation ran.
        reason: RevocationReason,
        /// Credentials retired by this call.
        count: u64,
    },

    /// The oldest session was evicted to enforce the concurrency limit.
    SessionLimitEnforced {
        /// Owning user.
        user_id: Uuid,
        /// The evicted session.
        ended_session_id: Uuid,
    },

    /// A single-use assertion was presented twice.
    AssertionReplayed {
        /// Asserted subject.
        subject: String,
        /// The replayed assertion id.
        assertion_id: String,
        /// IP of the original consumption.
        original_ip: String,
        /// When the assertion was first consumed.
        #[serde(with = "time::serde::rfc3339")]
        first_used_at: OffsetDateTime,
        /// IP of the replay attempt.
        replay_ip: String,
    },
}

impl SecurityEvent {
    /// Returns the severity of this event.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::PairIssued { .. } | Self::TokenRotated { .. } => Severity::Info,
            Self::TokenRevoked { .. } | Self::SessionLimitEnforced { .. } => Severity::Warning,
            Self::BulkRevocation { reason, .. } => {
                if reason.is_security_incident() {
                    Severity::High
                } else {
                    Severity::Warning
                }
            }
            Self::ReuseDetected { .. } => Severity::High,
            Self::AssertionReplayed { .. } => Severity::Critical,
        }
    }
}

/// Receives security events.
///
/// Implementations must be non-blocking and infallible from the caller's
/// perspective; an audit pipeline outage never fails the operation being
/// audited.
pub trait AuditSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: SecurityEvent);
}

/// Default sink: emits events as structured `tracing` records.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: SecurityEvent) {
        let severity = event.severity();
        let payload = serde_json::to_string(&event).unwrap_or_else(|_| format!("{event:?}"));
        match severity {
            Severity::Info => {
                tracing::info!(severity = severity.as_str(), event = %payload, "security event");
            }
            Severity::Warning => {
                tracing::warn!(severity = severity.as_str(), event = %payload, "security event");
            }
            Severity::High | Severity::Critical => {
                tracing::error!(severity = severity.as_str(), event = %payload, "security event");
            }
        }
    }
}
