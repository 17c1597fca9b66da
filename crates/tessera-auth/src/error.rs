//! Credential lifecycle error types.
//!
//! This module defines the error taxonomy for token issuance, rotation,
//! revocation, and replay prevention. The distinction between variants is
//! for internal security response only; every terminal state maps to the
//! same user-facing message so callers cannot use the API as a
//! token-validity oracle.

use std::fmt;

/// Errors that can occur during credential lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The presented token is malformed, carries a bad signature, or has
    /// expired. Safe to retry with fresh credentials.
    #[error("Invalid token: {message}")]
    Invalid {
        /// Description of why the token is invalid.
        message: String,
    },

    /// The token id is unknown to the credential store.
    /// Treated as invalid by callers.
    #[error("Token not found")]
    NotFound,

    /// The token has been explicitly blacklisted. Terminal; the caller
    /// must re-authenticate.
    #[error("Token revoked")]
    Revoked,

    /// An already-retired refresh token was presented again. This is the
    /// theft-or-race signal: every credential for the subject is
    /// force-revoked as a side effect.
    #[error("Refresh token reuse detected")]
    ReuseDetected,

    /// A single-use assertion was consumed a second time.
    #[error("Assertion replay detected")]
    ReplayDetected,

    /// Transient infrastructure failure (timeout, pool exhaustion).
    /// Safe to retry.
    #[error("Service unavailable: {message}")]
    Unavailable {
        /// Description of the transient failure.
        message: String,
    },

    /// A storage operation failed.
    #[error("Storage error: {message}")]
    Storage {
        /// Description of the storage error.
        message: String,
    },

    /// The engine configuration is invalid.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },

    /// An unexpected internal error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl AuthError {
    /// Creates a new `Invalid` error.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Storage` error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Creates a new `Configuration` error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a terminal result: the presented
    /// credential will never work and the caller must re-authenticate.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Invalid { .. }
                | Self::NotFound
                | Self::Revoked
                | Self::ReuseDetected
                | Self::ReplayDetected
        )
    }

    /// Returns `true` if this error represents a security incident that
    /// triggered a forced bulk revocation.
    #[must_use]
    pub fn is_security_incident(&self) -> bool {
        matches!(self, Self::ReuseDetected | Self::ReplayDetected)
    }

    /// Returns `true` if the operation can be retried unchanged.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Storage { .. })
    }

    /// Returns the message suitable for the end user.
    ///
    /// Every terminal state surfaces identically so the response body never
    /// discloses whether a token was expired, revoked, or reused.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        if self.is_terminal() {
            "Please sign in again."
        } else {
            "Service temporarily unavailable. Please try again."
        }
    }

    /// Returns the error category for logging and monitoring.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Invalid { .. } | Self::NotFound => ErrorCategory::Validation,
            Self::Revoked => ErrorCategory::Revocation,
            Self::ReuseDetected | Self::ReplayDetected => ErrorCategory::SecurityIncident,
            Self::Unavailable { .. } | Self::Storage { .. } => ErrorCategory::Infrastructure,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Internal { .. } => ErrorCategory::Internal,
        }
    }
}

/// Categories of credential errors for logging and monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Malformed or unknown credentials.
    Validation,
    /// Explicitly revoked credentials.
    Revocation,
    /// Reuse or replay detections.
    SecurityIncident,
    /// Infrastructure/storage failures.
    Infrastructure,
    /// Configuration errors.
    Configuration,
    /// Internal server errors.
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Revocation => write!(f, "revocation"),
            Self::SecurityIncident => write!(f, "security_incident"),
            Self::Infrastructure => write!(f, "infrastructure"),
            Self::Configuration => write!(f, "configuration"),
            Self::Internal => write!(f, "internal"),
        }
    }
}
