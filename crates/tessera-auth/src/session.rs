//! Session lifecycle and concurrent-session limits.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::AuthResult;
use crate::audit::{AuditSink, SecurityEvent};
use crate::cache::RevocationCache;
use crate::config::{BlacklistConfig, SessionConfig};
use crate::revocation::blacklist_credential_pair;
use crate::storage::credential::CredentialStore;
use crate::storage::session::SessionStore;
use crate::types::device::DeviceInfo;
use crate::types::reason::RevocationReason;
use crate::types::session::SessionRecord;

/// Supplies per-user session limits.
///
/// Implemented by the surrounding user service; `None` means the configured
/// default applies.
#[async_trait]
pub trait SessionPolicy: Send + Sync {
    /// Maximum concurrent sessions for a user, if individually configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the policy cannot be loaded.
    async fn max_concurrent_sessions(&self, user_id: Uuid) -> AuthResult<Option<u32>>;
}

/// Policy that always defers to the configured default.
pub struct DefaultSessionPolicy;

#[async_trait]
impl SessionPolicy for DefaultSessionPolicy {
    async fn max_concurrent_sessions(&self, _user_id: Uuid) -> AuthResult<Option<u32>> {
        Ok(None)
    }
}

/// Enforces session limits and drives session state transitions.
pub struct SessionManager {
    sessions: Arc<dyn SessionStore>,
    credentials: Arc<dyn CredentialStore>,
    blacklist: Arc<RevocationCache>,
    policy: Arc<dyn SessionPolicy>,
    audit: Arc<dyn AuditSink>,
    config: SessionConfig,
    blacklist_config: BlacklistConfig,
}

impl SessionManager {
    /// Creates a new session manager.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        credentials: Arc<dyn CredentialStore>,
        blacklist: Arc<RevocationCache>,
        policy: Arc<dyn SessionPolicy>,
        audit: Arc<dyn AuditSink>,
        config: SessionConfig,
        blacklist_config: BlacklistConfig,
    ) -> Self {
        Self {
            sessions,
            credentials,
            blacklist,
            policy,
            audit,
            config,
            blacklist_config,
        }
    }

    /// Makes room for one more session if the user is at their limit.
    ///
    /// At or above the limit, the single active session with the oldest
    /// last-activity timestamp is force-ended and its linked credential
    /// retired and blacklisted with reason `session_limit_exceeded`.
    /// Among equal timestamps the store picks one; no secondary tie-break
    /// is defined.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage operation fails.
    pub async fn enforce_session_limit(&self, user_id: Uuid) -> AuthResult<()> {
        let limit = self
            .policy
            .max_concurrent_sessions(user_id)
            .await?
            .unwrap_or(self.config.max_concurrent);

        let active = self.sessions.count_active_for_user(user_id).await?;
        if active < u64::from(limit) {
            return Ok(());
        }

        let Some(oldest) = self.sessions.oldest_active_for_user(user_id).await? else {
            return Ok(());
        };

        debug!(%user_id, session_id = %oldest.id, "evicting oldest session at limit");
        self.sessions
            .end(oldest.id, RevocationReason::SessionLimitExceeded)
            .await?;

        if let Some(credential) = self
            .credentials
            .retire(oldest.credential_id, RevocationReason::SessionLimitExceeded)
            .await?
        {
            blacklist_credential_pair(
                &self.blacklist,
                &credential,
                RevocationReason::SessionLimitExceeded,
                &self.blacklist_config,
            )
            .await?;
        }

        self.audit.record(SecurityEvent::SessionLimitEnforced {
            user_id,
            ended_session_id: oldest.id,
        });
        Ok(())
    }

    /// Creates a new session linked to a credential id.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be stored.
    pub async fn create_session(
        &self,
        session_id: Uuid,
        user_id: Uuid,
        credential_id: Uuid,
        device: &DeviceInfo,
        remember_me: bool,
    ) -> AuthResult<SessionRecord> {
        let session = SessionRecord::new(
            session_id,
            user_id,
            credential_id,
            device.display_name_or_default(),
            remember_me,
        );
        self.sessions.create(&session).await?;
        Ok(session)
    }

    /// Ends a session. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn end_session(&self, session_id: Uuid, reason: RevocationReason) -> AuthResult<bool> {
        self.sessions.end(session_id, reason).await
    }

    /// Ends all sessions for a user, returning the number ended.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn end_all_sessions(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
    ) -> AuthResult<u64> {
        self.sessions.end_all_for_user(user_id, reason).await
    }
}
