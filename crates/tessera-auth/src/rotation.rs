//! Refresh-token rotation.
//!
//! The core state machine of the engine. A credential moves
//! `active → retired(reason)` exactly once, triggered by a successful
//! rotation or an explicit revocation. Rotation is where theft shows up:
//! once a refresh token is rotated, its old value must never work again,
//! and a second presentation means either attacker replay or a client bug
//! severe enough to warrant full re-authentication.
//!
//! # Concurrency
//!
//! Two requests racing to rotate the same token are serialized by the row
//! lock inside [`CredentialStore::rotate`]; exactly one commits, the other
//! finds the row already retired and triggers reuse detection.
//!
//! The blacklist check deliberately runs *outside* the transaction. A token
//! revoked concurrently between that check and the commit could slip
//! through once, but the blacklist is append-only, the window is
//! milliseconds, and the next presentation of the old token hits reuse
//! detection anyway. Moving the check inside the transaction would trade
//! the cache's latency win for a race already covered by a second layer of
//! defense; do not "fix" this without re-deriving that trade-off.

use std::sync::Arc;

use tokio::time::timeout;
use tracing::{error, warn};
use uuid::Uuid;

use crate::AuthResult;
use crate::audit::{AuditSink, SecurityEvent};
use crate::cache::RevocationCache;
use crate::config::{AuthConfig, BlacklistConfig};
use crate::error::AuthError;
use crate::revocation::{RevocationService, blacklist_credential_pair};
use crate::storage::credential::{CredentialStore, RotationOutcome};
use crate::token::issuer::{SnapshotSource, TokenIssuer};
use crate::token::jwt::{JwtService, RefreshClaims, TOKEN_USE_REFRESH};
use crate::types::credential::CredentialRecord;
use crate::types::device::DeviceInfo;
use crate::types::pair::TokenPair;
use crate::types::reason::RevocationReason;

/// Verifies, retires, and replaces refresh tokens.
pub struct RotationEngine {
    jwt: Arc<JwtService>,
    issuer: Arc<TokenIssuer>,
    credentials: Arc<dyn CredentialStore>,
    blacklist: Arc<RevocationCache>,
    snapshots: Arc<dyn SnapshotSource>,
    revocation: Arc<RevocationService>,
    audit: Arc<dyn AuditSink>,
    rotation_timeout: std::time::Duration,
    blacklist_config: BlacklistConfig,
}

impl RotationEngine {
    /// Creates a new rotation engine.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jwt: Arc<JwtService>,
        issuer: Arc<TokenIssuer>,
        credentials: Arc<dyn CredentialStore>,
        blacklist: Arc<RevocationCache>,
        snapshots: Arc<dyn SnapshotSource>,
        revocation: Arc<RevocationService>,
        audit: Arc<dyn AuditSink>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            jwt,
            issuer,
            credentials,
            blacklist,
            snapshots,
            revocation,
            audit,
            rotation_timeout: config.rotation_timeout,
            blacklist_config: config.blacklist.clone(),
        }
    }

    /// Rotates a refresh token: retires the presented credential and issues
    /// a replacement pair.
    ///
    /// Expiry of the replacement is computed from the current time
    /// (sliding-window renewal), not carried over from the original grant.
    ///
    /// # Errors
    ///
    /// - `Invalid` - malformed token, bad signature, expired, or hash
    ///   mismatch against the stored credential
    /// - `NotFound` - the token id is unknown
    /// - `Revoked` - the token id is blacklisted
    /// - `ReuseDetected` - the credential was already retired; every
    ///   credential for the user has been force-revoked as a side effect
    /// - `Unavailable` - the transaction timed out or storage failed; the
    ///   rotation rolled back with no partial retirement
    pub async fn rotate(&self, refresh_token: &str, device: &DeviceInfo) -> AuthResult<TokenPair> {
        // 1. Cryptographic verification: signature and expiry.
        let claims = self.jwt.decode::<RefreshClaims>(refresh_token)?.claims;
        if claims.token_use != TOKEN_USE_REFRESH {
            return Err(AuthError::invalid("not a refresh token"));
        }
        let presented_hash = CredentialRecord::hash_token(refresh_token);

        // 2. Blacklist check, cache-first, outside the transaction (see the
        // module docs for the accepted race). Rotation write-through puts
        // every rotated-away id on the blacklist, so a hit must be
        // classified against the credential row: a row retired by rotation
        // is the replay signal and escalates, anything else is plain
        // `revoked`.
        if self.blacklist.is_blacklisted(claims.jti).await? {
            if let Some(record) = self.credentials.find_by_id(claims.jti).await?
                && !record.active
                && record.revoked_reason == Some(RevocationReason::Rotation)
            {
                self.handle_reuse(claims.sub, record.token_id, device).await;
                return Err(AuthError::ReuseDetected);
            }
            return Err(AuthError::Revoked);
        }

        // 3. Sign the replacement pair before opening the transaction.
        let snapshot = self.snapshots.snapshot_for_user(claims.sub).await?;
        let issued = self
            .issuer
            .issue(claims.sub, claims.sid, claims.remember_me, snapshot)?;
        let replacement = CredentialRecord::new(
            issued.refresh_token_id,
            claims.sub,
            claims.sid,
            issued.access_token_id,
            issued.refresh_token_hash.clone(),
            device,
            claims.remember_me,
            time::OffsetDateTime::now_utc(),
            issued.pair.refresh_expires_at,
        );

        // 4. The transactional middle: select-for-update, classify, retire,
        // insert, re-point the session. Bounded; a timeout rolls back and
        // must surface as `unavailable`, never as a security verdict.
        let outcome = timeout(
            self.rotation_timeout,
            self.credentials
                .rotate(claims.jti, &presented_hash, &replacement),
        )
        .await
        .map_err(|_| AuthError::unavailable("rotation transaction timed out"))??;

        match outcome {
            RotationOutcome::Committed {
                previous,
                rotation_count,
            } => {
                // 5. Post-commit write-through of the retired pair. The old
                // row is already inactive, so this layer is defense in
                // depth; failures are logged, not surfaced.
                if let Err(err) = blacklist_credential_pair(
                    &self.blacklist,
                    &previous,
                    RevocationReason::Rotation,
                    &self.blacklist_config,
                )
                .await
                {
                    warn!(
                        token_id = %previous.token_id,
                        error = %err,
                        "post-rotation blacklist write failed"
                    );
                }

                self.audit.record(SecurityEvent::TokenRotated {
                    user_id: claims.sub,
                    session_id: claims.sid,
                    rotation_count,
                });
                Ok(issued.pair)
            }

            RotationOutcome::ReuseDetected { record } => {
                self.handle_reuse(claims.sub, record.token_id, device).await;
                Err(AuthError::ReuseDetected)
            }

            RotationOutcome::NotFound => Err(AuthError::NotFound),
            RotationOutcome::Expired => Err(AuthError::invalid("refresh token expired")),
            RotationOutcome::HashMismatch => Err(AuthError::invalid("token hash mismatch")),
        }
    }

    /// Response to a retired token being presented again: revoke everything
    /// the user holds and raise a high-severity event.
    async fn handle_reuse(&self, user_id: Uuid, token_id: Uuid, device: &DeviceInfo) {
        if let Err(err) = self
            .revocation
            .revoke_all(user_id, RevocationReason::ReuseDetected)
            .await
        {
            // The reuse verdict stands even if the sweep fails; the caller
            // is denied either way and the sweep is retried on the next hit.
            error!(%user_id, error = %err, "bulk revocation after reuse detection failed");
        }

        self.audit.record(SecurityEvent::ReuseDetected {
            user_id,
            token_id,
            client_ip: device.client_ip.clone(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Severity;
    use crate::cache::InMemoryTokenCache;
    use crate::storage::blacklist::BlacklistStore;
    use crate::storage::session::SessionStore;
    use crate::testing::{
        CollectingAuditSink, FixedSnapshotSource, MockBlacklistStore, MockCredentialStore,
        MockSessionStore,
    };
    use crate::token::jwt::{SigningAlgorithm, SigningKeyPair};
    use crate::types::blacklist::{BlacklistEntry, TokenClass};
    use crate::types::session::SessionRecord;
    use crate::types::snapshot::{AuthorizationSnapshot, OrgAccess};
    use time::OffsetDateTime;

    struct TestEnv {
        engine: RotationEngine,
        issuer: Arc<TokenIssuer>,
        credentials: Arc<MockCredentialStore>,
        sessions: Arc<MockSessionStore>,
        blacklist_store: Arc<MockBlacklistStore>,
        cache: Arc<RevocationCache>,
        audit: Arc<CollectingAuditSink>,
    }

    fn test_env_with_config(config: AuthConfig) -> TestEnv {
        let key_pair = SigningKeyPair::generate_rsa(SigningAlgorithm::RS256).unwrap();
        let jwt = Arc::new(JwtService::new(key_pair, "https://id.example.com"));
        let issuer = Arc::new(TokenIssuer::new(jwt.clone(), config.tokens.clone()));
        let credentials = Arc::new(MockCredentialStore::default());
        let sessions = Arc::new(MockSessionStore::default());
        credentials.link_sessions(sessions.clone());
        let blacklist_store = Arc::new(MockBlacklistStore::default());
        let cache = Arc::new(RevocationCache::new(
            Arc::new(InMemoryTokenCache::new(std::time::Duration::from_secs(60))),
            blacklist_store.clone(),
        ));
        let audit = Arc::new(CollectingAuditSink::default());
        let revocation = Arc::new(RevocationService::new(
            jwt.clone(),
            credentials.clone(),
            sessions.clone(),
            cache.clone(),
            audit.clone(),
            config.blacklist.clone(),
        ));
        let engine = RotationEngine::new(
            jwt,
            issuer.clone(),
            credentials.clone(),
            cache.clone(),
            Arc::new(FixedSnapshotSource),
            revocation,
            audit.clone(),
            &config,
        );
        TestEnv {
            engine,
            issuer,
            credentials,
            sessions,
            blacklist_store,
            cache,
            audit,
        }
    }

    fn test_env() -> TestEnv {
        test_env_with_config(AuthConfig::default())
    }

    fn device() -> DeviceInfo {
        DeviceInfo::new("fp-1", "203.0.113.7", "test-agent")
    }

    /// Issues a pair and persists its rows, mirroring login.
    async fn login(env: &TestEnv, user_id: Uuid) -> (String, Uuid, Uuid) {
        let session_id = Uuid::new_v4();
        let snapshot = AuthorizationSnapshot::new(vec!["member".to_string()], OrgAccess::All);
        let issued = env.issuer.issue(user_id, session_id, false, snapshot).unwrap();

        let session = SessionRecord::new(
            session_id,
            user_id,
            issued.refresh_token_id,
            "Test",
            false,
        );
        env.sessions.create(&session).await.unwrap();

        let credential = CredentialRecord::new(
            issued.refresh_token_id,
            user_id,
            session_id,
            issued.access_token_id,
            issued.refresh_token_hash.clone(),
            &device(),
            false,
            OffsetDateTime::now_utc(),
            issued.pair.refresh_expires_at,
        );
        env.credentials.create(&credential).await.unwrap();

        (
            issued.pair.refresh_token,
            issued.refresh_token_id,
            session_id,
        )
    }

    #[tokio::test]
    async fn test_successful_rotation() {
        let env = test_env();
        let user_id = Uuid::new_v4();
        let (token, token_id, session_id) = login(&env, user_id).await;

        let pair = env.engine.rotate(&token, &device()).await.unwrap();
        assert_eq!(pair.session_id, session_id);

        // Old row retired with reason rotation.
        let old = env.credentials.find_by_id(token_id).await.unwrap().unwrap();
        assert!(!old.active);
        assert_eq!(old.revoked_reason, Some(RevocationReason::Rotation));

        // Exactly one active credential remains, counter bumped.
        let active = env.credentials.list_active_for_user(user_id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].rotation_count, 1);

        // Session re-pointed at the replacement.
        let session = env.sessions.find_by_id(session_id).await.unwrap().unwrap();
        assert_eq!(session.credential_id, active[0].token_id);

        // Old pair written through to the blacklist.
        assert!(env.blacklist_store.contains(token_id).await.unwrap());
        assert!(env
            .blacklist_store
            .contains(old.access_token_id)
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_rotation_counter_increases_across_rotations() {
        let env = test_env();
        let user_id = Uuid::new_v4();
        let (token, _, _) = login(&env, user_id).await;

        let pair_b = env.engine.rotate(&token, &device()).await.unwrap();
        let pair_c = env
            .engine
            .rotate(&pair_b.refresh_token, &device())
            .await
            .unwrap();
        let _ = pair_c;

        let active = env.credentials.list_active_for_user(user_id).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].rotation_count, 2);
    }

    #[tokio::test]
    async fn test_reuse_detection_revokes_everything() {
        let env = test_env();
        let user_id = Uuid::new_v4();
        let (token_a, token_a_id, _) = login(&env, user_id).await;

        // A -> B succeeds; presenting A again must trip reuse detection.
        let pair_b = env.engine.rotate(&token_a, &device()).await.unwrap();
        let err = env.engine.rotate(&token_a, &device()).await.unwrap_err();
        assert!(matches!(err, AuthError::ReuseDetected));

        // Zero active credentials remain for the user; B dies with A.
        assert!(env
            .credentials
            .list_active_for_user(user_id)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(env.sessions.count_active_for_user(user_id).await.unwrap(), 0);

        // B's refresh token is now rejected too.
        let err = env
            .engine
            .rotate(&pair_b.refresh_token, &device())
            .await
            .unwrap_err();
        assert!(err.is_terminal());

        let events = env.audit.events.lock().unwrap();
        let reuse = events
            .iter()
            .find(|e| matches!(e, SecurityEvent::ReuseDetected { .. }))
            .expect("reuse event emitted");
        assert_eq!(reuse.severity(), Severity::High);
        if let SecurityEvent::ReuseDetected { token_id, .. } = reuse {
            assert_eq!(*token_id, token_a_id);
        }
    }

    #[tokio::test]
    async fn test_unknown_token_is_not_found() {
        let env = test_env();
        let user_id = Uuid::new_v4();
        // Signed token with no credential row behind it.
        let snapshot = AuthorizationSnapshot::new(vec![], OrgAccess::All);
        let issued = env
            .issuer
            .issue(user_id, Uuid::new_v4(), false, snapshot)
            .unwrap();

        let err = env
            .engine
            .rotate(&issued.pair.refresh_token, &device())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::NotFound));
    }

    #[tokio::test]
    async fn test_blacklisted_token_is_revoked() {
        let env = test_env();
        let user_id = Uuid::new_v4();
        let (token, token_id, _) = login(&env, user_id).await;

        let entry = BlacklistEntry::new(
            token_id,
            user_id,
            TokenClass::Refresh,
            OffsetDateTime::now_utc() + time::Duration::days(30),
            RevocationReason::AdminAction,
        );
        env.cache.add(&entry).await.unwrap();

        let err = env.engine.rotate(&token, &device()).await.unwrap_err();
        assert!(matches!(err, AuthError::Revoked));
    }

    #[tokio::test]
    async fn test_hash_mismatch_is_invalid() {
        let env = test_env();
        let user_id = Uuid::new_v4();
        let (token, token_id, _) = login(&env, user_id).await;

        // Corrupt the stored hash to simulate a hash/id mismatch.
        env.credentials
            .credentials
            .lock()
            .unwrap()
            .get_mut(&token_id)
            .unwrap()
            .token_hash = CredentialRecord::hash_token("something else");

        let err = env.engine.rotate(&token, &device()).await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid { .. }));

        // No retirement happened.
        let row = env.credentials.find_by_id(token_id).await.unwrap().unwrap();
        assert!(row.active);
    }

    #[tokio::test]
    async fn test_garbage_token_is_invalid() {
        let env = test_env();
        let err = env
            .engine
            .rotate("not.a.token", &device())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_access_token_rejected_for_rotation() {
        let env = test_env();
        let (_, _, _) = login(&env, Uuid::new_v4()).await;
        let snapshot = AuthorizationSnapshot::new(vec![], OrgAccess::All);
        let issued = env
            .issuer
            .issue(Uuid::new_v4(), Uuid::new_v4(), false, snapshot)
            .unwrap();

        let err = env
            .engine
            .rotate(&issued.pair.access_token, &device())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Invalid { .. }));
    }

    #[tokio::test]
    async fn test_timeout_surfaces_as_unavailable() {
        let mut config = AuthConfig::default();
        config.rotation_timeout = std::time::Duration::from_millis(20);
        let env = test_env_with_config(config);
        let user_id = Uuid::new_v4();
        let (token, token_id, _) = login(&env, user_id).await;

        *env.credentials.rotate_delay.lock().unwrap() =
            Some(std::time::Duration::from_millis(200));

        let err = env.engine.rotate(&token, &device()).await.unwrap_err();
        assert!(matches!(err, AuthError::Unavailable { .. }));

        // Never a security verdict on timeout, and no partial retirement.
        *env.credentials.rotate_delay.lock().unwrap() = None;
        let row = env.credentials.find_by_id(token_id).await.unwrap().unwrap();
        assert!(row.active);
    }
}
