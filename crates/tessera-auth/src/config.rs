//! Credential engine configuration.
//!
//! Configuration for token lifetimes, session limits, blacklist retention,
//! and maintenance windows. All durations deserialize from humantime strings
//! (`"15m"`, `"7d"`) in TOML/JSON config files.
//!
//! # Example (TOML)
//!
//! ```toml
//! [auth]
//! issuer = "https://id.example.com"
//!
//! [auth.tokens]
//! access_lifetime = "15m"
//! refresh_lifetime = "7d"
//! extended_refresh_lifetime = "30d"
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the credential lifecycle engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Issuer URL (used in token `iss` claims and enforced on verification).
    pub issuer: String,

    /// Token issuance configuration.
    pub tokens: TokenLifetimeConfig,

    /// Concurrent-session configuration.
    pub sessions: SessionConfig,

    /// Revocation blacklist configuration.
    pub blacklist: BlacklistConfig,

    /// Failed-login lockout configuration.
    pub lockout: LockoutConfig,

    /// Scheduled cleanup configuration.
    pub cleanup: CleanupConfig,

    /// Upper bound on the rotation transaction. A rotation that exceeds this
    /// rolls back cleanly and surfaces as `unavailable`, never as a
    /// security-significant result.
    #[serde(with = "humantime_serde")]
    pub rotation_timeout: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer: "http://localhost:8080".to_string(),
            tokens: TokenLifetimeConfig::default(),
            sessions: SessionConfig::default(),
            blacklist: BlacklistConfig::default(),
            lockout: LockoutConfig::default(),
            cleanup: CleanupConfig::default(),
            rotation_timeout: Duration::from_secs(5),
        }
    }
}

impl AuthConfig {
    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid field found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.issuer.is_empty() {
            return Err(ConfigError::new("issuer must not be empty"));
        }
        if self.tokens.access_lifetime >= self.tokens.refresh_lifetime {
            return Err(ConfigError::new(
                "access_lifetime must be shorter than refresh_lifetime",
            ));
        }
        if self.tokens.refresh_lifetime > self.tokens.extended_refresh_lifetime {
            return Err(ConfigError::new(
                "refresh_lifetime must not exceed extended_refresh_lifetime",
            ));
        }
        if self.sessions.max_concurrent == 0 {
            return Err(ConfigError::new("max_concurrent sessions must be at least 1"));
        }
        if self.rotation_timeout.is_zero() {
            return Err(ConfigError::new("rotation_timeout must be non-zero"));
        }
        if self.lockout.max_failures == 0 {
            return Err(ConfigError::new("lockout max_failures must be at least 1"));
        }
        Ok(())
    }
}

/// Token lifetime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenLifetimeConfig {
    /// Access token lifetime. Short: the token embeds an authorization
    /// snapshot that goes stale until the next refresh.
    #[serde(with = "humantime_serde")]
    pub access_lifetime: Duration,

    /// Standard refresh token lifetime.
    #[serde(with = "humantime_serde")]
    pub refresh_lifetime: Duration,

    /// Refresh token lifetime for remember-me sessions.
    #[serde(with = "humantime_serde")]
    pub extended_refresh_lifetime: Duration,
}

impl Default for TokenLifetimeConfig {
    fn default() -> Self {
        Self {
            access_lifetime: Duration::from_secs(15 * 60),
            refresh_lifetime: Duration::from_secs(7 * 24 * 3600),
            extended_refresh_lifetime: Duration::from_secs(30 * 24 * 3600),
        }
    }
}

/// Concurrent-session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Default maximum number of concurrent active sessions per user.
    /// A per-user override may be supplied through the `SessionPolicy` trait.
    pub max_concurrent: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { max_concurrent: 3 }
    }
}

/// Revocation blacklist configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BlacklistConfig {
    /// How long blacklist entries are retained beyond the token's natural
    /// expiry. Long retention preserves forensic value after the credential
    /// itself would have expired.
    #[serde(with = "humantime_serde")]
    pub retention: Duration,

    /// How long negative cache entries ("known not blacklisted") are served
    /// before the store is consulted again.
    #[serde(with = "humantime_serde")]
    pub negative_cache_ttl: Duration,
}

impl Default for BlacklistConfig {
    fn default() -> Self {
        Self {
            retention: Duration::from_secs(30 * 24 * 3600),
            negative_cache_ttl: Duration::from_secs(60),
        }
    }
}

/// Failed-login lockout configuration.
///
/// Counters are store-backed and keyed by subject; a multi-instance
/// deployment shares the same counters.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Number of failures within the window after which the subject is locked.
    pub max_failures: u32,

    /// Sliding window over which failures accumulate.
    #[serde(with = "humantime_serde")]
    pub window: Duration,
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            window: Duration::from_secs(15 * 60),
        }
    }
}

/// Scheduled cleanup configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Grace window after expiry before credential rows are purged.
    /// Rows inside the window stay available for audit.
    #[serde(with = "humantime_serde")]
    pub credential_grace: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            credential_grace: Duration::from_secs(7 * 24 * 3600),
        }
    }
}

/// Configuration validation error.
#[derive(Debug, thiserror::Error)]
#[error("Invalid configuration: {message}")]
pub struct ConfigError {
    /// Description of the invalid field.
    message: String,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AuthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tokens.access_lifetime, Duration::from_secs(900));
        assert_eq!(
            config.tokens.refresh_lifetime,
            Duration::from_secs(7 * 24 * 3600)
        );
        assert_eq!(
            config.tokens.extended_refresh_lifetime,
            Duration::from_secs(30 * 24 * 3600)
        );
        assert_eq!(config.sessions.max_concurrent, 3);
        assert_eq!(
            config.blacklist.retention,
            Duration::from_secs(30 * 24 * 3600)
        );
    }

    #[test]
    fn test_validation_rejects_inverted_lifetimes() {
        let mut config = AuthConfig::default();
        config.tokens.access_lifetime = Duration::from_secs(10 * 24 * 3600);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_zero_sessions() {
        let mut config = AuthConfig::default();
        config.sessions.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_humantime_deserialization() {
        let json = r#"{
            "issuer": "https://id.example.com",
            "tokens": {
                "access_lifetime": "15m",
                "refresh_lifetime": "7d",
                "extended_refresh_lifetime": "30d"
            },
            "rotation_timeout": "5s"
        }"#;
        let config: AuthConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.issuer, "https://id.example.com");
        assert_eq!(config.tokens.access_lifetime, Duration::from_secs(900));
        assert_eq!(config.rotation_timeout, Duration::from_secs(5));
        // Sections not present fall back to defaults.
        assert_eq!(config.sessions.max_concurrent, 3);
    }
}
