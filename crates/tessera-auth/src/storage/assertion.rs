//! Single-use assertion marker storage trait.
//!
//! # Implementation Notes
//!
//! `claim_once` must be a single atomic operation with the uniqueness
//! constraint enforced by the store itself. A conditional insert is the
//! canonical shape:
//!
//! ```sql
//! INSERT INTO assertion_markers (assertion_id, ...)
//! VALUES ($1, ...)
//! ON CONFLICT (assertion_id) DO NOTHING
//! ```
//!
//! Application-level check-then-insert is not acceptable: two concurrent
//! requests would both pass the check.

use async_trait::async_trait;

use crate::AuthResult;
use crate::storage::ClaimOutcome;
use crate::types::assertion::ReplayMarker;

/// Storage trait for single-use assertion consumption markers.
#[async_trait]
pub trait AssertionStore: Send + Sync {
    /// Atomically claims an assertion id.
    ///
    /// Exactly one of any number of concurrent calls for the same id
    /// observes [`ClaimOutcome::Claimed`]; every other observes
    /// [`ClaimOutcome::AlreadyClaimed`] with the winner's marker.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails. Callers treat any
    /// error as a denial (fail closed).
    async fn claim_once(&self, marker: &ReplayMarker) -> AuthResult<ClaimOutcome<ReplayMarker>>;

    /// Fetches a marker for forensic lookups.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, assertion_id: &str) -> AuthResult<Option<ReplayMarker>>;

    /// Deletes markers past their expiry horizon.
    ///
    /// # Returns
    ///
    /// The number of markers deleted.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleanup operation fails.
    async fn cleanup_expired(&self) -> AuthResult<u64>;
}
