//! Account flag storage trait.

use async_trait::async_trait;

use crate::AuthResult;

/// Storage trait for suspicious-activity account flags.
///
/// The replay guard raises a flag when an assertion is replayed so the
/// surrounding system can require step-up authentication or manual review.
#[async_trait]
pub trait AccountFlagStore: Send + Sync {
    /// Flags a subject as exhibiting suspicious activity.
    ///
    /// Idempotent: re-flagging updates the reason and timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn flag_suspicious(&self, subject: &str, reason: &str) -> AuthResult<()>;
}
