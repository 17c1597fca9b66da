//! Revocation blacklist entry.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::reason::RevocationReason;

/// The class of token an identifier refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenClass {
    /// Short-lived access token.
    Access,
    /// Database-backed refresh token.
    Refresh,
}

impl TokenClass {
    /// Returns the class as the string stored in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TokenClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(Self::Access),
            "refresh" => Ok(Self::Refresh),
            other => Err(format!("unknown token class: {other}")),
        }
    }
}

/// A blacklisted token identifier.
///
/// Insertion is monotonic: once present, an id stays blacklisted until the
/// cleanup horizon passes. The horizon sits well past the token's natural
/// expiry so the entry keeps forensic value after the credential itself
/// would have died.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistEntry {
    /// The blacklisted token id.
    pub token_id: Uuid,

    /// The user the token belonged to.
    pub user_id: Uuid,

    /// Access or refresh.
    pub token_class: TokenClass,

    /// Cleanup horizon; the entry may be deleted once this passes.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// Why the token was blacklisted.
    pub reason: RevocationReason,

    /// Who triggered the revocation, when known (admin id, "system").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,

    /// Requester IP, for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Requester User-Agent, for audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// When the entry was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl BlacklistEntry {
    /// Builds an entry with the audit fields left empty.
    #[must_use]
    pub fn new(
        token_id: Uuid,
        user_id: Uuid,
        token_class: TokenClass,
        expires_at: OffsetDateTime,
        reason: RevocationReason,
    ) -> Self {
        Self {
            token_id,
            user_id,
            token_class,
            expires_at,
            reason,
            actor: None,
            ip: None,
            user_agent: None,
            created_at: OffsetDateTime::now_utc(),
        }
    }
}
