//! Token issuance.
//!
//! Builds and signs access/refresh pairs. Stateless: issuance touches no
//! storage; the caller persists the credential record built from the
//! returned material.

use std::sync::Arc;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::AuthResult;
use crate::config::TokenLifetimeConfig;
use crate::token::jwt::{
    AccessClaims, JwtService, RefreshClaims, TOKEN_USE_ACCESS, TOKEN_USE_REFRESH,
};
use crate::types::credential::CredentialRecord;
use crate::types::pair::TokenPair;
use crate::types::snapshot::AuthorizationSnapshot;

/// Supplies the authorization snapshot to embed in access tokens.
///
/// Implemented by the surrounding RBAC layer; this crate never computes
/// roles or organization access itself.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Builds the current authorization snapshot for a user.
    ///
    /// # Errors
    ///
    /// Returns an error if role data cannot be loaded.
    async fn snapshot_for_user(&self, user_id: Uuid) -> AuthResult<AuthorizationSnapshot>;
}

/// Material produced by a single issuance.
///
/// Besides the client-facing [`TokenPair`], the issuer exposes the token
/// ids and the refresh-token hash so the caller can build the credential
/// row without re-parsing what it just signed.
#[derive(Debug, Clone)]
pub struct IssuedPair {
    /// The client-facing pair.
    pub pair: TokenPair,

    /// `jti` of the refresh token (credential row primary key).
    pub refresh_token_id: Uuid,

    /// `jti` of the access token.
    pub access_token_id: Uuid,

    /// SHA-256 hash of the serialized refresh token.
    pub refresh_token_hash: String,
}

/// Builds and signs access/refresh token pairs.
pub struct TokenIssuer {
    jwt: Arc<JwtService>,
    lifetimes: TokenLifetimeConfig,
}

impl TokenIssuer {
    /// Creates a new issuer.
    #[must_use]
    pub fn new(jwt: Arc<JwtService>, lifetimes: TokenLifetimeConfig) -> Self {
        Self { jwt, lifetimes }
    }

    /// Issues a signed pair for a user session.
    ///
    /// Expiries are computed from the current time: rotation goes through
    /// this same path, which is what makes renewal sliding-window rather
    /// than anchored to the original login.
    ///
    /// # Errors
    ///
    /// Returns an error if signing fails.
    pub fn issue(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        remember_me: bool,
        snapshot: AuthorizationSnapshot,
    ) -> AuthResult<IssuedPair> {
        let now = OffsetDateTime::now_utc();
        let access_expires_at = now + duration_from_std(self.lifetimes.access_lifetime);
        let refresh_lifetime = if remember_me {
            self.lifetimes.extended_refresh_lifetime
        } else {
            self.lifetimes.refresh_lifetime
        };
        let refresh_expires_at = now + duration_from_std(refresh_lifetime);

        let access_token_id = Uuid::new_v4();
        let refresh_token_id = Uuid::new_v4();

        let access_claims = AccessClaims {
            iss: self.jwt.issuer().to_string(),
            sub: user_id,
            sid: session_id,
            jti: access_token_id,
            iat: now.unix_timestamp(),
            exp: access_expires_at.unix_timestamp(),
            token_use: TOKEN_USE_ACCESS.to_string(),
            authz: snapshot,
        };

        let refresh_claims = RefreshClaims {
            iss: self.jwt.issuer().to_string(),
            sub: user_id,
            sid: session_id,
            jti: refresh_token_id,
            iat: now.unix_timestamp(),
            exp: refresh_expires_at.unix_timestamp(),
            token_use: TOKEN_USE_REFRESH.to_string(),
            remember_me,
        };

        let access_token = self.jwt.encode(&access_claims)?;
        let refresh_token = self.jwt.encode(&refresh_claims)?;
        let refresh_token_hash = CredentialRecord::hash_token(&refresh_token);

        Ok(IssuedPair {
            pair: TokenPair {
                access_token,
                refresh_token,
                access_expires_at,
                refresh_expires_at,
                session_id,
            },
            refresh_token_id,
            access_token_id,
            refresh_token_hash,
        })
    }
}

fn duration_from_std(d: std::time::Duration) -> Duration {
    Duration::seconds(d.as_secs() as i64)
}
