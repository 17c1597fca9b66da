//! Store-backed failed-login lockout.
//!
//! Counters live in the credential store, keyed by subject, with the
//! increment-and-read performed as one atomic storage operation. An
//! in-process counter would reset on restart and diverge across instances,
//! which is exactly how brute-force throttling gets silently disabled.

use std::sync::Arc;

use crate::AuthResult;
use crate::config::LockoutConfig;
use crate::storage::lockout::LoginAttemptStore;

/// Outcome of recording a failed login.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutDecision {
    /// Still under the threshold.
    Allowed {
        /// Failures remaining before lockout.
        remaining: u32,
    },
    /// The subject reached the threshold within the window.
    Locked,
}

/// Tracks failed logins per subject against the configured threshold.
pub struct LockoutTracker {
    store: Arc<dyn LoginAttemptStore>,
    config: LockoutConfig,
}

impl LockoutTracker {
    /// Creates a new tracker.
    #[must_use]
    pub fn new(store: Arc<dyn LoginAttemptStore>, config: LockoutConfig) -> Self {
        Self { store, config }
    }

    /// Records a failed login and returns the lockout decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub async fn record_failure(&self, subject: &str) -> AuthResult<LockoutDecision> {
        let failures = self
            .store
            .record_failure(subject, self.config.window)
            .await?;
        if failures >= self.config.max_failures {
            Ok(LockoutDecision::Locked)
        } else {
            Ok(LockoutDecision::Allowed {
                remaining: self.config.max_failures - failures,
            })
        }
    }

    /// Clears the subject's counter after a successful authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the counter store fails.
    pub async fn clear(&self, subject: &str) -> AuthResult<()> {
        self.store.clear(subject).await
    }
}
