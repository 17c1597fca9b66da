//! User session record.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::types::reason::RevocationReason;

/// A user session.
///
/// `credential_id` always points at the most recently issued credential for
/// this session; it is re-pointed inside the rotation transaction so the
/// invariant holds even under concurrent rotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// Session id (the token `sid` claim).
    pub id: Uuid,

    /// Owning user.
    pub user_id: Uuid,

    /// The currently linked (non-retired) credential.
    pub credential_id: Uuid,

    /// Human-readable device name for session listings.
    pub device_name: String,

    /// Whether this session uses the extended refresh lifetime.
    pub remember_me: bool,

    /// Last rotation or creation time; drives oldest-session eviction.
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,

    /// Whether this session is live.
    pub active: bool,

    /// When this session ended (None = still active).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub ended_at: Option<OffsetDateTime>,

    /// Why this session ended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<RevocationReason>,
}

impl SessionRecord {
    /// Builds a new active session.
    #[must_use]
    pub fn new(
        id: Uuid,
        user_id: Uuid,
        credential_id: Uuid,
        device_name: impl Into<String>,
        remember_me: bool,
    ) -> Self {
        Self {
            id,
            user_id,
            credential_id,
            device_name: device_name.into(),
            remember_me,
            last_activity: OffsetDateTime::now_utc(),
            active: true,
            ended_at: None,
            end_reason: None,
        }
    }
}
