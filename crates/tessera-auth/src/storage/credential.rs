//! Credential storage trait.
//!
//! # Security Considerations
//!
//! - Only token hashes are stored, never plaintext tokens
//! - Rotation must be atomic: old row retired, new row inserted, session
//!   re-pointed, all or nothing
//! - Retirement must be idempotent
//! - Expired rows are cleaned up by scheduled maintenance, not inline

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::credential::CredentialRecord;
use crate::types::reason::RevocationReason;

/// Result of the atomic rotation transaction.
#[derive(Debug, Clone)]
pub enum RotationOutcome {
    /// The old row was retired, the replacement inserted, and the session
    /// re-pointed, in one committed transaction.
    Committed {
        /// The retired credential as it was before retirement.
        previous: CredentialRecord,
        /// Rotation counter assigned to the replacement (previous + 1).
        rotation_count: i32,
    },

    /// No row exists for this token id.
    NotFound,

    /// A row exists but is already retired: the theft-or-race signal.
    ReuseDetected {
        /// The retired row, for forensics.
        record: CredentialRecord,
    },

    /// The row is active but past its expiry (possible only under clock
    /// skew, since the token's own `exp` is checked first).
    Expired,

    /// The stored hash does not match the presented token's hash.
    HashMismatch,
}

/// Storage trait for refresh-token credentials.
///
/// The central contract is [`rotate`](CredentialStore::rotate): the whole
/// locked middle of a rotation runs as one storage call so the
/// implementation can hold a row lock for its duration. This mirrors how an
/// authorization-code store exposes an atomic `consume` instead of
/// `find` + `mark_used`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Stores a new credential row.
    ///
    /// # Errors
    ///
    /// Returns an error if a row with this token id already exists or the
    /// store is unavailable.
    async fn create(&self, credential: &CredentialRecord) -> AuthResult<()>;

    /// Finds a credential by token id, regardless of its state.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_id(&self, token_id: Uuid) -> AuthResult<Option<CredentialRecord>>;

    /// Executes the rotation transaction.
    ///
    /// Atomically, under a row lock on the credential identified by
    /// `token_id`:
    ///
    /// 1. Select the row, filtered to active and unexpired. If absent,
    ///    re-select without the active filter to classify the failure
    ///    (`NotFound`, `ReuseDetected`, `Expired`).
    /// 2. Compare the stored hash against `presented_hash`
    ///    (`HashMismatch` on difference).
    /// 3. Retire the old row with reason `rotation`.
    /// 4. Insert `replacement` with the rotation counter set to the old
    ///    counter plus one (the counter passed in `replacement` is ignored).
    /// 5. Re-point the session's linked credential id at the replacement and
    ///    refresh its last-activity timestamp.
    ///
    /// The row lock is what prevents two concurrent rotations of the same
    /// token from both committing.
    ///
    /// # Errors
    ///
    /// Returns an error only for storage failures; every domain-level
    /// outcome is expressed through [`RotationOutcome`]. On error the
    /// transaction must have rolled back with no partial retirement.
    async fn rotate(
        &self,
        token_id: Uuid,
        presented_hash: &str,
        replacement: &CredentialRecord,
    ) -> AuthResult<RotationOutcome>;

    /// Retires a credential if it is still active.
    ///
    /// Idempotent: retiring an already-retired or unknown credential is a
    /// no-op returning `None`.
    ///
    /// # Returns
    ///
    /// The record as it was while active, when this call performed the
    /// retirement.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn retire(
        &self,
        token_id: Uuid,
        reason: RevocationReason,
    ) -> AuthResult<Option<CredentialRecord>>;

    /// Retires every active credential for a user.
    ///
    /// # Returns
    ///
    /// The retired records (empty if the user had no active credentials),
    /// so the caller can blacklist each one.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn retire_all_for_user(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
    ) -> AuthResult<Vec<CredentialRecord>>;

    /// Lists active credentials for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list_active_for_user(&self, user_id: Uuid) -> AuthResult<Vec<CredentialRecord>>;

    /// Flips expired-but-active rows to inactive with reason `expired`.
    ///
    /// Touches only already-expired rows, so it is safe to run concurrently
    /// with live traffic.
    ///
    /// # Returns
    ///
    /// The number of rows deactivated.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn deactivate_expired(&self) -> AuthResult<u64>;

    /// Deletes rows expired longer than `grace` ago.
    ///
    /// This is the only path that hard-deletes credential rows; everything
    /// inside the grace window stays for audit.
    ///
    /// # Returns
    ///
    /// The number of rows deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn purge_expired(&self, grace: std::time::Duration) -> AuthResult<u64>;
}
