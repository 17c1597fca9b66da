//! Session storage trait.

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::reason::RevocationReason;
use crate::types::session::SessionRecord;

/// Storage trait for user sessions.
///
/// Re-pointing a session's linked credential during rotation is not part of
/// this trait: it happens inside [`CredentialStore::rotate`] so it commits
/// atomically with the credential swap.
///
/// [`CredentialStore::rotate`]: crate::storage::credential::CredentialStore::rotate
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be stored.
    async fn create(&self, session: &SessionRecord) -> AuthResult<()>;

    /// Finds a session by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<SessionRecord>>;

    /// Counts active sessions for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn count_active_for_user(&self, user_id: Uuid) -> AuthResult<u64>;

    /// Returns the active session with the oldest last-activity timestamp.
    ///
    /// Among equal timestamps the choice is unspecified.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn oldest_active_for_user(&self, user_id: Uuid) -> AuthResult<Option<SessionRecord>>;

    /// Ends a session.
    ///
    /// Idempotent: ending an already-ended or unknown session returns
    /// `false`.
    ///
    /// # Returns
    ///
    /// `true` if this call ended the session.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn end(&self, id: Uuid, reason: RevocationReason) -> AuthResult<bool>;

    /// Ends every active session for a user.
    ///
    /// # Returns
    ///
    /// The number of sessions ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn end_all_for_user(&self, user_id: Uuid, reason: RevocationReason) -> AuthResult<u64>;
}
