//! Failed-login counter storage trait.
//!
//! Counters are store-backed and keyed by subject so every instance of a
//! multi-instance deployment sees the same counts. Process-local counters
//! are not an acceptable implementation.

use async_trait::async_trait;
use std::time::Duration;

use crate::AuthResult;

/// Storage trait for failed-login counters.
#[async_trait]
pub trait LoginAttemptStore: Send + Sync {
    /// Records a failure and returns the updated count within the window.
    ///
    /// Increment and read must happen in one atomic storage operation; the
    /// window restarts when the previous one has lapsed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn record_failure(&self, subject: &str, window: Duration) -> AuthResult<u32>;

    /// Clears the counter after a successful authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn clear(&self, subject: &str) -> AuthResult<()>;
}
