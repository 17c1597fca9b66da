//! Client device metadata attached to credentials and sessions.

use serde::{Deserialize, Serialize};

/// Opaque device metadata captured at login and rotation.
///
/// User-Agent parsing and fingerprint derivation happen outside this crate;
/// the engine stores and compares these values without interpreting them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable device fingerprint supplied by the caller.
    pub fingerprint: String,

    /// Client IP address, as reported by the transport layer.
    pub client_ip: String,

    /// Raw User-Agent string.
    pub user_agent: String,

    /// Human-readable device name for session listings
    /// (e.g. "Chrome on macOS"), if the caller derived one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

impl DeviceInfo {
    /// Creates device info with the three mandatory fields.
    #[must_use]
    pub fn new(
        fingerprint: impl Into<String>,
        client_ip: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            fingerprint: fingerprint.into(),
            client_ip: client_ip.into(),
            user_agent: user_agent.into(),
            display_name: None,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Returns the session display name, falling back to "Unknown Device".
    #[must_use]
    pub fn display_name_or_default(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Unknown Device")
    }
}
