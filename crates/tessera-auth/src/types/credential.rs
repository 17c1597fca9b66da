//! Refresh-token credential record.
//!
//! # Security
//!
//! - Only a SHA-256 hash of the serialized token is persisted, never the
//!   token itself
//! - Exactly one row exists per token id; rotation retires the old row and
//!   inserts a new one atomically
//! - Rows are never hard-deleted except by retention cleanup (audit trail)

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::device::DeviceInfo;
use crate::types::reason::RevocationReason;

/// Refresh-token credential stored in the database.
///
/// A credential is created at login and at each rotation. Its only mutation
/// is the active→retired flip (with a reason); everything else is immutable
/// once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRecord {
    /// Unique token id (the refresh token's `jti` claim).
    pub token_id: Uuid,

    /// User this credential belongs to.
    pub user_id: Uuid,

    /// Session this credential is linked to.
    pub session_id: Uuid,

    /// `jti` of the access token issued alongside this refresh token.
    /// Revocation blacklists both ids so the outstanding access token
    /// dies together with the refresh token.
    pub access_token_id: Uuid,

    /// SHA-256 hash of the serialized refresh token.
    /// The plaintext token is returned to the client but never stored.
    pub token_hash: String,

    /// Device fingerprint captured at issuance.
    pub device_fingerprint: String,

    /// Client IP captured at issuance.
    pub client_ip: String,

    /// User-Agent captured at issuance.
    pub user_agent: String,

    /// Whether the session opted into the extended refresh lifetime.
    pub remember_me: bool,

    /// When this credential was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub issued_at: OffsetDateTime,

    /// When this credential expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Whether this credential is still usable.
    pub active: bool,

    /// Number of rotations in this credential's lineage. Diagnostic only;
    /// monotonically increasing, never reset.
    pub rotation_count: i32,

    /// When this credential was retired (None = still active).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub revoked_at: Option<OffsetDateTime>,

    /// Why this credential was retired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_reason: Option<RevocationReason>,
}

impl CredentialRecord {
    /// Builds the initial credential for a new session (rotation count 0).
    #[must_use]
    pub fn new(
        token_id: Uuid,
        user_id: Uuid,
        session_id: Uuid,
        access_token_id: Uuid,
        token_hash: String,
        device: &DeviceInfo,
        remember_me: bool,
        issued_at: OffsetDateTime,
        expires_at: OffsetDateTime,
    ) -> Self {
        Self {
            token_id,
            user_id,
            session_id,
            access_token_id,
            token_hash,
            device_fingerprint: device.fingerprint.clone(),
            client_ip: device.client_ip.clone(),
            user_agent: device.user_agent.clone(),
            remember_me,
            issued_at,
            expires_at,
            active: true,
            rotation_count: 0,
            revoked_at: None,
            revoked_reason: None,
        }
    }

    /// Returns `true` if this credential has passed its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if this credential is active and unexpired.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.active && !self.is_expired()
    }

    /// Hashes a serialized token with SHA-256.
    ///
    /// Used when storing new credentials and when verifying presented ones.
    #[must_use]
    pub fn hash_token(token: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }
}
