//! Revocation and retirement reasons.

use serde::{Deserialize, Serialize};

/// Why a credential was retired, a session ended, or a token blacklisted.
///
/// Reasons are recorded verbatim in the store for audit; they are never
/// surfaced in user-facing responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RevocationReason {
    /// The credential was retired by a successful rotation.
    Rotation,
    /// The user logged out.
    Logout,
    /// The oldest session was evicted to make room under the
    /// concurrent-session limit.
    SessionLimitExceeded,
    /// An already-retired refresh token was presented again.
    ReuseDetected,
    /// A single-use assertion was replayed.
    ReplayDetected,
    /// Revoked in response to a security incident.
    SecurityIncident,
    /// Revoked by an administrator.
    AdminAction,
    /// Deactivated by scheduled cleanup after natural expiry.
    Expired,
}

impl RevocationReason {
    /// Returns the reason as the string stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotation => "rotation",
            Self::Logout => "logout",
            Self::SessionLimitExceeded => "session_limit_exceeded",
            Self::ReuseDetected => "reuse_detected",
            Self::ReplayDetected => "replay_detected",
            Self::SecurityIncident => "security_incident",
            Self::AdminAction => "admin_action",
            Self::Expired => "expired",
        }
    }

    /// Returns `true` if this reason marks a security incident rather than
    /// ordinary lifecycle housekeeping.
    #[must_use]
    pub fn is_security_incident(&self) -> bool {
        matches!(
            self,
            Self::ReuseDetected | Self::ReplayDetected | Self::SecurityIncident
        )
    }
}

impl std::fmt::Display for RevocationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RevocationReason {
    type Err = UnknownReason;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rotation" => Ok(Self::Rotation),
            "logout" => Ok(Self::Logout),
            "session_limit_exceeded" => Ok(Self::SessionLimitExceeded),
            "reuse_detected" => Ok(Self::ReuseDetected),
            "replay_detected" => Ok(Self::ReplayDetected),
            "security_incident" => Ok(Self::SecurityIncident),
            "admin_action" => Ok(Self::AdminAction),
            "expired" => Ok(Self::Expired),
            other => Err(UnknownReason(other.to_string())),
        }
    }
}

/// Error returned when parsing an unknown reason string from the store.
#[derive(Debug, thiserror::Error)]
#[error("Unknown revocation reason: {0}")]
pub struct UnknownReason(pub String);
