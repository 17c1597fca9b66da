//! Issued token pair.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// An access/refresh token pair returned by login and rotation.
///
/// The serialized tokens are handed to the client and never persisted;
/// only the refresh token's hash reaches the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    /// Signed access token.
    pub access_token: String,

    /// Signed refresh token.
    pub refresh_token: String,

    /// Access token expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub access_expires_at: OffsetDateTime,

    /// Refresh token expiry.
    #[serde(with = "time::serde::rfc3339")]
    pub refresh_expires_at: OffsetDateTime,

    /// Session both tokens belong to.
    pub session_id: Uuid,
}
