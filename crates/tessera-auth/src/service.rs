//! Credential lifecycle facade.
//!
//! [`AuthService`] wires the issuer, rotation engine, session manager,
//! revocation service, replay guard, and revocation cache into the surface
//! the surrounding system calls. The HTTP layer, password verification, and
//! RBAC evaluation all live outside; they talk to this facade through the
//! operations below and the collaborator traits.

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::audit::{AuditSink, SecurityEvent};
use crate::cache::{RevocationCache, TokenCache};
use crate::config::{AuthConfig, ConfigError};
use crate::error::AuthError;
use crate::lockout::LockoutTracker;
use crate::replay::{AssertionRequest, ReplayCheck, ReplayGuard};
use crate::revocation::RevocationService;
use crate::rotation::RotationEngine;
use crate::session::{SessionManager, SessionPolicy};
use crate::storage::assertion::AssertionStore;
use crate::storage::blacklist::BlacklistStore;
use crate::storage::credential::CredentialStore;
use crate::storage::flags::AccountFlagStore;
use crate::storage::lockout::LoginAttemptStore;
use crate::storage::session::SessionStore;
use crate::token::issuer::{SnapshotSource, TokenIssuer};
use crate::token::jwt::{AccessClaims, JwtService, TOKEN_USE_ACCESS};
use crate::types::credential::CredentialRecord;
use crate::types::device::DeviceInfo;
use crate::types::pair::TokenPair;
use crate::types::reason::RevocationReason;
use crate::types::snapshot::AuthorizationSnapshot;

/// Storage backends the engine persists to.
pub struct AuthStores {
    /// Credential rows.
    pub credentials: Arc<dyn CredentialStore>,
    /// Session rows.
    pub sessions: Arc<dyn SessionStore>,
    /// Authoritative blacklist.
    pub blacklist: Arc<dyn BlacklistStore>,
    /// Single-use assertion markers.
    pub assertions: Arc<dyn AssertionStore>,
    /// Failed-login counters.
    pub login_attempts: Arc<dyn LoginAttemptStore>,
    /// Suspicious-activity flags.
    pub account_flags: Arc<dyn AccountFlagStore>,
}

/// External collaborators consulted by the engine.
pub struct AuthCollaborators {
    /// Supplies authorization snapshots (RBAC layer).
    pub snapshots: Arc<dyn SnapshotSource>,
    /// Supplies per-user session limits (user service).
    pub session_policy: Arc<dyn SessionPolicy>,
    /// Receives security events (audit pipeline).
    pub audit: Arc<dyn AuditSink>,
    /// Fast layer of the revocation cache.
    pub cache: Arc<dyn TokenCache>,
}

/// Counts reported by [`AuthService::cleanup_expired`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// Expired-but-active credentials flipped to inactive.
    pub credentials_deactivated: u64,
    /// Credential rows deleted past the grace window.
    pub credentials_purged: u64,
    /// Blacklist entries removed past their horizon.
    pub blacklist_entries_removed: u64,
    /// Replay markers removed past expiry.
    pub replay_markers_removed: u64,
}

/// The credential lifecycle engine.
pub struct AuthService {
    config: AuthConfig,
    jwt: Arc<JwtService>,
    issuer: Arc<TokenIssuer>,
    credentials: Arc<dyn CredentialStore>,
    assertions: Arc<dyn AssertionStore>,
    snapshots: Arc<dyn SnapshotSource>,
    audit: Arc<dyn AuditSink>,
    blacklist: Arc<RevocationCache>,
    session_manager: SessionManager,
    rotation: RotationEngine,
    revocation: Arc<RevocationService>,
    replay: ReplayGuard,
    lockout: LockoutTracker,
}

impl AuthService {
    /// Wires the engine from its configuration, signing service, stores,
    /// and collaborators.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn new(
        config: AuthConfig,
        jwt: Arc<JwtService>,
        stores: AuthStores,
        collaborators: AuthCollaborators,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let issuer = Arc::new(TokenIssuer::new(jwt.clone(), config.tokens.clone()));
        let blacklist = Arc::new(RevocationCache::new(
            collaborators.cache,
            stores.blacklist,
        ));
        let revocation = Arc::new(RevocationService::new(
            jwt.clone(),
            stores.credentials.clone(),
            stores.sessions.clone(),
            blacklist.clone(),
            collaborators.audit.clone(),
            config.blacklist.clone(),
        ));
        let session_manager = SessionManager::new(
            stores.sessions.clone(),
            stores.credentials.clone(),
            blacklist.clone(),
            collaborators.session_policy,
            collaborators.audit.clone(),
            config.sessions.clone(),
            config.blacklist.clone(),
        );
        let rotation = RotationEngine::new(
            jwt.clone(),
            issuer.clone(),
            stores.credentials.clone(),
            blacklist.clone(),
            collaborators.snapshots.clone(),
            revocation.clone(),
            collaborators.audit.clone(),
            &config,
        );
        let replay = ReplayGuard::new(
            stores.assertions.clone(),
            stores.account_flags,
            collaborators.audit.clone(),
        );
        let lockout = LockoutTracker::new(stores.login_attempts, config.lockout);

        Ok(Self {
            config,
            jwt,
            issuer,
            credentials: stores.credentials,
            assertions: stores.assertions,
            snapshots: collaborators.snapshots,
            audit: collaborators.audit,
            blacklist,
            session_manager,
            rotation,
            revocation,
            replay,
            lockout,
        })
    }

    /// Issues the initial token pair after primary authentication succeeded.
    ///
    /// Enforces the concurrent-session limit first: at the limit, the
    /// user's oldest session is force-ended before the new one is created.
    ///
    /// # Errors
    ///
    /// Returns an error if signing or storage fails. This method trusts the
    /// caller's "authentication succeeded" signal; password verification is
    /// not this crate's concern.
    pub async fn issue_initial_pair(
        &self,
        user_id: Uuid,
        device: &DeviceInfo,
        remember_me: bool,
    ) -> AuthResult<TokenPair> {
        self.session_manager.enforce_session_limit(user_id).await?;

        let session_id = Uuid::new_v4();
        let snapshot = self.snapshots.snapshot_for_user(user_id).await?;
        let issued = self.issuer.issue(user_id, session_id, remember_me, snapshot)?;

        self.session_manager
            .create_session(session_id, user_id, issued.refresh_token_id, device, remember_me)
            .await?;

        let credential = CredentialRecord::new(
            issued.refresh_token_id,
            user_id,
            session_id,
            issued.access_token_id,
            issued.refresh_token_hash.clone(),
            device,
            remember_me,
            OffsetDateTime::now_utc(),
            issued.pair.refresh_expires_at,
        );
        self.credentials.create(&credential).await?;

        self.audit.record(SecurityEvent::PairIssued {
            user_id,
            session_id,
            remember_me,
        });
        Ok(issued.pair)
    }

    /// Rotates a refresh token. See [`RotationEngine::rotate`].
    ///
    /// # Errors
    ///
    /// `Invalid`, `NotFound`, `Revoked`, `ReuseDetected`, or `Unavailable`.
    pub async fn rotate(&self, refresh_token: &str, device: &DeviceInfo) -> AuthResult<TokenPair> {
        self.rotation.rotate(refresh_token, device).await
    }

    /// Validates an access token: signature, expiry, and a cache-first
    /// blacklist check. Returns the embedded authorization snapshot.
    ///
    /// Runs on every protected request; the only storage it may touch is
    /// the blacklist store, and only on a cache miss.
    ///
    /// # Errors
    ///
    /// `Invalid` for signature/expiry failures, `Revoked` for blacklisted
    /// tokens, `Storage`/`Unavailable` if the blacklist cannot be checked
    /// (never fails open).
    pub async fn validate_access(&self, access_token: &str) -> AuthResult<AuthorizationSnapshot> {
        let claims = self.jwt.decode::<AccessClaims>(access_token)?.claims;
        if claims.token_use != TOKEN_USE_ACCESS {
            return Err(AuthError::invalid("not an access token"));
        }
        if self.blacklist.is_blacklisted(claims.jti).await? {
            return Err(AuthError::Revoked);
        }
        Ok(claims.authz)
    }

    /// Revokes one refresh token. See [`RevocationService::revoke_one`].
    ///
    /// # Errors
    ///
    /// `Invalid` for a bad signature, or a storage error.
    pub async fn revoke_one(&self, refresh_token: &str, reason: RevocationReason) -> AuthResult<()> {
        self.revocation.revoke_one(refresh_token, reason).await
    }

    /// Revokes every credential a user holds.
    /// See [`RevocationService::revoke_all`].
    ///
    /// # Errors
    ///
    /// Returns a storage error if the sweep fails.
    pub async fn revoke_all(&self, user_id: Uuid, reason: RevocationReason) -> AuthResult<u64> {
        self.revocation.revoke_all(user_id, reason).await
    }

    /// Checks a single-use assertion for replay.
    /// See [`ReplayGuard::check_and_track`].
    ///
    /// # Errors
    ///
    /// `Unavailable` on storage failure (fail closed).
    pub async fn check_assertion_replay(
        &self,
        request: &AssertionRequest,
    ) -> AuthResult<ReplayCheck> {
        self.replay.check_and_track(request).await
    }

    /// Scheduled maintenance: deactivates and purges expired credentials,
    /// trims the blacklist and replay markers.
    ///
    /// Idempotent and safe to run concurrently with live traffic; only
    /// already-expired rows are touched.
    ///
    /// # Errors
    ///
    /// Returns the first storage error encountered.
    pub async fn cleanup_expired(&self) -> AuthResult<CleanupReport> {
        let credentials_deactivated = self.credentials.deactivate_expired().await?;
        let credentials_purged = self
            .credentials
            .purge_expired(self.config.cleanup.credential_grace)
            .await?;
        let blacklist_entries_removed = self.blacklist.cleanup_expired().await?;
        let replay_markers_removed = self.assertions.cleanup_expired().await?;

        Ok(CleanupReport {
            credentials_deactivated,
            credentials_purged,
            blacklist_entries_removed,
            replay_markers_removed,
        })
    }

    /// The store-backed failed-login tracker, for the primary-auth flow.
    #[must_use]
    pub fn lockout(&self) -> &LockoutTracker {
        &self.lockout
    }

    /// Session lifecycle operations beyond what the core flows perform.
    #[must_use]
    pub fn sessions(&self) -> &SessionManager {
        &self.session_manager
    }

    /// The signing service (JWKS export, introspection).
    #[must_use]
    pub fn jwt(&self) -> &Arc<JwtService> {
        &self.jwt
    }
}
