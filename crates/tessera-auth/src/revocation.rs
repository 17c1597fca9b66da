//! Explicit credential invalidation.
//!
//! Logout, security incidents, and admin actions all land here: retire the
//! credential row, blacklist both token ids, end the session, emit an audit
//! event. Both entry points are idempotent; revoking something already dead
//! is a successful no-op, not an error.

use std::sync::Arc;

use time::Duration;
use uuid::Uuid;

use crate::AuthResult;
use crate::audit::{AuditSink, SecurityEvent};
use crate::cache::RevocationCache;
use crate::config::BlacklistConfig;
use crate::error::AuthError;
use crate::storage::credential::CredentialStore;
use crate::storage::session::SessionStore;
use crate::token::jwt::{JwtService, RefreshClaims, TOKEN_USE_REFRESH};
use crate::types::blacklist::{BlacklistEntry, TokenClass};
use crate::types::credential::CredentialRecord;
use crate::types::reason::RevocationReason;

/// Blacklists both token ids of a retired credential, write-through.
///
/// The horizon sits one retention period past the credential's natural
/// expiry. Errors from the authoritative store propagate; callers on
/// best-effort paths decide whether to swallow them.
pub(crate) async fn blacklist_credential_pair(
    blacklist: &RevocationCache,
    credential: &CredentialRecord,
    reason: RevocationReason,
    config: &BlacklistConfig,
) -> AuthResult<()> {
    let horizon = credential.expires_at + Duration::seconds(config.retention.as_secs() as i64);
    for (token_id, class) in [
        (credential.token_id, TokenClass::Refresh),
        (credential.access_token_id, TokenClass::Access),
    ] {
        let entry = BlacklistEntry::new(token_id, credential.user_id, class, horizon, reason);
        blacklist.add(&entry).await?;
    }
    Ok(())
}

/// Explicit invalidation of one credential or a user's whole credential set.
pub struct RevocationService {
    jwt: Arc<JwtService>,
    credentials: Arc<dyn CredentialStore>,
    sessions: Arc<dyn SessionStore>,
    blacklist: Arc<RevocationCache>,
    audit: Arc<dyn AuditSink>,
    blacklist_config: BlacklistConfig,
}

impl RevocationService {
    /// Creates a new revocation service.
    #[must_use]
    pub fn new(
        jwt: Arc<JwtService>,
        credentials: Arc<dyn CredentialStore>,
        sessions: Arc<dyn SessionStore>,
        blacklist: Arc<RevocationCache>,
        audit: Arc<dyn AuditSink>,
        blacklist_config: BlacklistConfig,
    ) -> Self {
        Self {
            jwt,
            credentials,
            sessions,
            blacklist,
            audit,
            blacklist_config,
        }
    }

    /// Revokes a single refresh token.
    ///
    /// The signature is verified but expiry is not: an expired token still
    /// identifies a credential worth retiring and blacklisting.
    ///
    /// Idempotent: revoking an already-retired token is a successful no-op.
    ///
    /// # Errors
    ///
    /// Returns `Invalid` for a token that fails signature verification,
    /// or a storage error if retirement or the blacklist store write fails.
    /// The blacklist write is not best-effort here: once this returns `Ok`,
    /// the store-backed check must reject the pair with no
    /// eventual-consistency window.
    pub async fn revoke_one(&self, refresh_token: &str, reason: RevocationReason) -> AuthResult<()> {
        let claims = self
            .jwt
            .decode_allow_expired::<RefreshClaims>(refresh_token)?
            .claims;
        if claims.token_use != TOKEN_USE_REFRESH {
            return Err(AuthError::invalid("not a refresh token"));
        }

        let Some(credential) = self.credentials.retire(claims.jti, reason).await? else {
            // Already retired or unknown: nothing left to do.
            return Ok(());
        };

        blacklist_credential_pair(&self.blacklist, &credential, reason, &self.blacklist_config)
            .await?;
        self.sessions.end(credential.session_id, reason).await?;

        self.audit.record(SecurityEvent::TokenRevoked {
            user_id: credential.user_id,
            token_id: credential.token_id,
            reason,
        });
        Ok(())
    }

    /// Revokes every active credential for a user and ends all sessions.
    ///
    /// Emits one aggregate event for the whole sweep. Idempotent: a second
    /// call finds nothing active and returns 0 without emitting an event.
    ///
    /// # Returns
    ///
    /// The number of credentials retired by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage operation fails.
    pub async fn revoke_all(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
    ) -> AuthResult<u64> {
        let retired = self.credentials.retire_all_for_user(user_id, reason).await?;
        for credential in &retired {
            blacklist_credential_pair(&self.blacklist, credential, reason, &self.blacklist_config)
                .await?;
        }
        self.sessions.end_all_for_user(user_id, reason).await?;

        let count = retired.len() as u64;
        if count > 0 {
            self.audit.record(SecurityEvent::BulkRevocation {
                user_id,
                reason,
                count,
            });
        }
        Ok(count)
    }
}
