//! Single-use assertion marker.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Consumption marker for a single-use federated-login assertion.
///
/// The assertion id is the primary key; the store's uniqueness constraint on
/// it is the concurrency-control mechanism. At most one row may ever exist
/// per assertion id, so the second of two racing inserts fails
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayMarker {
    /// Assertion identifier from the federated payload.
    pub assertion_id: String,

    /// Correlation reference to the original authentication request.
    pub correlation_id: String,

    /// Subject identity asserted by the identity provider.
    pub subject: String,

    /// Requester IP at first use.
    pub ip: String,

    /// Requester User-Agent at first use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// When the assertion was first consumed.
    #[serde(with = "time::serde::rfc3339")]
    pub first_used_at: OffsetDateTime,

    /// Cleanup horizon (matches the assertion's validity window).
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}
