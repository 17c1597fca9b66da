//! Revocation cache.
//!
//! Fast path for "is this token dead" checks. The cache sits in front of
//! the authoritative [`BlacklistStore`]:
//!
//! - **Writes** go through the cache first, then the store. The cache write
//!   is never skipped: it is the layer that stops reuse during the window
//!   where the store write has not replicated yet.
//! - **Reads** are cache-first. A miss falls through to the store and
//!   backfills the cache with the result, positive or negative. Negative
//!   caching is what keeps repeated checks of legitimate tokens off the
//!   store.
//! - A failing cache layer degrades to direct store checks. It never
//!   degrades to "not blacklisted": fail-open here would reopen exactly the
//!   vulnerability this subsystem closes.
//!
//! The cache is safe for unsynchronized concurrent access; blacklisting is
//! monotonic, so the worst concurrent interleaving is a redundant store
//! lookup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::AuthResult;
use crate::storage::blacklist::BlacklistStore;
use crate::types::blacklist::BlacklistEntry;

/// Cache layer for blacklist verdicts.
///
/// `Some(true)` means blacklisted, `Some(false)` means known-clean
/// (negative cache), `None` means the cache has no opinion.
#[async_trait]
pub trait TokenCache: Send + Sync {
    /// Looks up a cached verdict.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache layer fails; callers fall back to the
    /// store.
    async fn get(&self, token_id: Uuid) -> AuthResult<Option<bool>>;

    /// Stores a verdict.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache layer fails.
    async fn put(&self, token_id: Uuid, blacklisted: bool) -> AuthResult<()>;
}

/// In-process token cache backed by a concurrent map.
///
/// Positive verdicts are held indefinitely (blacklisting is monotonic and
/// the process is restarted far more often than the 30-day retention).
/// Negative verdicts expire after a short TTL so a revocation performed by
/// another instance becomes visible.
pub struct InMemoryTokenCache {
    entries: DashMap<Uuid, CacheSlot>,
    negative_ttl: Duration,
}

struct CacheSlot {
    blacklisted: bool,
    cached_at: OffsetDateTime,
}

impl InMemoryTokenCache {
    /// Creates a cache with the given negative-entry TTL.
    #[must_use]
    pub fn new(negative_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            negative_ttl,
        }
    }

    /// Number of cached verdicts, for monitoring.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the cache holds no verdicts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenCache for InMemoryTokenCache {
    async fn get(&self, token_id: Uuid) -> AuthResult<Option<bool>> {
        let Some(slot) = self.entries.get(&token_id) else {
            return Ok(None);
        };
        if !slot.blacklisted {
            let age = OffsetDateTime::now_utc() - slot.cached_at;
            if age > self.negative_ttl {
                drop(slot);
                self.entries.remove(&token_id);
                return Ok(None);
            }
        }
        Ok(Some(slot.blacklisted))
    }

    async fn put(&self, token_id: Uuid, blacklisted: bool) -> AuthResult<()> {
        self.entries.insert(
            token_id,
            CacheSlot {
                blacklisted,
                cached_at: OffsetDateTime::now_utc(),
            },
        );
        Ok(())
    }
}

/// Write-through revocation cache over a [`TokenCache`] and the
/// authoritative [`BlacklistStore`].
pub struct RevocationCache {
    cache: Arc<dyn TokenCache>,
    store: Arc<dyn BlacklistStore>,
}

impl RevocationCache {
    /// Creates a new revocation cache.
    #[must_use]
    pub fn new(cache: Arc<dyn TokenCache>, store: Arc<dyn BlacklistStore>) -> Self {
        Self { cache, store }
    }

    /// Blacklists a token id: cache first, then store.
    ///
    /// The cache write happens before, and regardless of, the store write.
    /// A cache-layer failure is logged and does not abort the store write.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails. The cache entry remains
    /// in place in that case; blacklisting is monotonic so an entry without
    /// a store row only causes early rejections, never late ones.
    pub async fn add(&self, entry: &BlacklistEntry) -> AuthResult<()> {
        if let Err(err) = self.cache.put(entry.token_id, true).await {
            warn!(token_id = %entry.token_id, error = %err, "blacklist cache write failed");
        }
        self.store.insert(entry).await
    }

    /// Checks whether a token id is blacklisted, cache-first.
    ///
    /// A cache-layer failure falls back to the store. Store failures
    /// propagate: a blacklist check must never fail open.
    ///
    /// # Errors
    ///
    /// Returns an error if the authoritative store check fails.
    pub async fn is_blacklisted(&self, token_id: Uuid) -> AuthResult<bool> {
        match self.cache.get(token_id).await {
            Ok(Some(verdict)) => return Ok(verdict),
            Ok(None) => {}
            Err(err) => {
                warn!(%token_id, error = %err, "blacklist cache read failed, falling back to store");
            }
        }

        let found = self.store.contains(token_id).await?;
        if let Err(err) = self.cache.put(token_id, found).await {
            warn!(%token_id, error = %err, "blacklist cache backfill failed");
        }
        Ok(found)
    }

    /// Removes store entries past their horizon.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cleanup fails.
    pub async fn cleanup_expired(&self) -> AuthResult<u64> {
        self.store.cleanup_expired().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AuthError;
    use crate::types::blacklist::TokenClass;
    use crate::types::reason::RevocationReason;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct MockBlacklistStore {
        entries: DashMap<Uuid, BlacklistEntry>,
        contains_calls: AtomicUsize,
        fail_inserts: AtomicBool,
    }

    #[async_trait]
    impl BlacklistStore for MockBlacklistStore {
        async fn insert(&self, entry: &BlacklistEntry) -> AuthResult<()> {
            if self.fail_inserts.load(Ordering::SeqCst) {
                return Err(AuthError::storage("insert failed"));
            }
            self.entries.entry(entry.token_id).or_insert(entry.clone());
            Ok(())
        }

        async fn contains(&self, token_id: Uuid) -> AuthResult<bool> {
            self.contains_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.entries.contains_key(&token_id))
        }

        async fn cleanup_expired(&self) -> AuthResult<u64> {
            let horizon = OffsetDateTime::now_utc();
            let before = self.entries.len();
            self.entries.retain(|_, e| e.expires_at > horizon);
            Ok((before - self.entries.len()) as u64)
        }
    }

    fn test_entry(token_id: Uuid) -> BlacklistEntry {
        BlacklistEntry::new(
            token_id,
            Uuid::new_v4(),
            TokenClass::Refresh,
            OffsetDateTime::now_utc() + time::Duration::days(30),
            RevocationReason::Logout,
        )
    }

    fn test_cache(store: Arc<MockBlacklistStore>) -> RevocationCache {
        RevocationCache::new(
            Arc::new(InMemoryTokenCache::new(Duration::from_secs(60))),
            store,
        )
    }

    #[tokio::test]
    async fn test_write_through_and_cache_hit() {
        let store = Arc::new(MockBlacklistStore::default());
        let cache = test_cache(store.clone());
        let token_id = Uuid::new_v4();

        cache.add(&test_entry(token_id)).await.unwrap();
        assert!(store.entries.contains_key(&token_id));

        // Served from cache without touching the store.
        assert!(cache.is_blacklisted(token_id).await.unwrap());
        assert_eq!(store.contains_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_negative_backfill() {
        let store = Arc::new(MockBlacklistStore::default());
        let cache = test_cache(store.clone());
        let token_id = Uuid::new_v4();

        assert!(!cache.is_blacklisted(token_id).await.unwrap());
        assert_eq!(store.contains_calls.load(Ordering::SeqCst), 1);

        // Second check is served by the negative cache entry.
        assert!(!cache.is_blacklisted(token_id).await.unwrap());
        assert_eq!(store.contains_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cache_write_survives_store_failure() {
        let store = Arc::new(MockBlacklistStore::default());
        let cache = test_cache(store.clone());
        let token_id = Uuid::new_v4();

        store.fail_inserts.store(true, Ordering::SeqCst);
        let err = cache.add(&test_entry(token_id)).await.unwrap_err();
        assert!(err.is_retryable());

        // The fast path still rejects the token even though the store
        // write failed.
        assert!(cache.is_blacklisted(token_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_negative_entries_expire() {
        let store = Arc::new(MockBlacklistStore::default());
        let cache = RevocationCache::new(
            Arc::new(InMemoryTokenCache::new(Duration::ZERO)),
            store.clone(),
        );
        let token_id = Uuid::new_v4();

        assert!(!cache.is_blacklisted(token_id).await.unwrap());
        // TTL of zero: the negative entry is immediately stale, so the next
        // read consults the store again and observes the new entry.
        store.entries.insert(token_id, test_entry(token_id));
        assert!(cache.is_blacklisted(token_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_positive_entries_do_not_expire() {
        let in_memory = InMemoryTokenCache::new(Duration::ZERO);
        let token_id = Uuid::new_v4();
        in_memory.put(token_id, true).await.unwrap();
        assert_eq!(in_memory.get(token_id).await.unwrap(), Some(true));
    }
}
