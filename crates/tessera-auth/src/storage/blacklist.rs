//! Revocation blacklist storage trait.
//!
//! The store is the authoritative layer behind the in-process cache; see
//! [`RevocationCache`](crate::cache::RevocationCache) for the read path.
//!
//! # Security Considerations
//!
//! - Insertion is monotonic: entries are never removed before their horizon
//! - Containment checks run on every validation, so they must be fast
//! - Entries outlive the tokens they name (forensic retention)

use async_trait::async_trait;
use uuid::Uuid;

use crate::AuthResult;
use crate::types::blacklist::BlacklistEntry;

/// Storage trait for blacklisted token ids.
#[async_trait]
pub trait BlacklistStore: Send + Sync {
    /// Inserts a blacklist entry.
    ///
    /// Idempotent: inserting an id that is already blacklisted succeeds
    /// without modifying the existing entry (first write wins).
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn insert(&self, entry: &BlacklistEntry) -> AuthResult<()>;

    /// Checks whether a token id is blacklisted.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Callers must not
    /// interpret an error as "not blacklisted".
    async fn contains(&self, token_id: Uuid) -> AuthResult<bool>;

    /// Deletes entries whose cleanup horizon has passed.
    ///
    /// # Returns
    ///
    /// The number of entries deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
