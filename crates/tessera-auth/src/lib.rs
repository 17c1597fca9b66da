//! # tessera-auth
//!
//! Credential lifecycle and replay-prevention engine for Tessera.
//!
//! This crate provides:
//! - Signed access/refresh token issuance with embedded authorization
//!   snapshots
//! - Atomic refresh-token rotation with reuse detection
//! - Concurrent-session limits and session lifecycle
//! - A write-through revocation blacklist with an in-process cache
//! - Single-use assertion replay prevention for federated logins
//! - Store-backed failed-login lockout
//!
//! ## Overview
//!
//! The engine is built around one invariant: a single-use security artifact
//! (a refresh token, a federated-login assertion) can never be successfully
//! consumed twice. Rotation holds a row lock across the retire-and-replace
//! transaction; replay prevention rides on a unique-constrained insert. Both
//! are enforced by the store, not by application-level checks.
//!
//! Storage is abstracted behind traits in [`storage`]; the PostgreSQL
//! backend lives in the `tessera-auth-postgres` crate. Password
//! verification, HTTP routing, and RBAC evaluation are collaborators
//! outside this crate.
//!
//! ## Modules
//!
//! - [`config`] - engine configuration
//! - [`token`] - JWT signing and pair issuance
//! - [`rotation`] - the rotation state machine
//! - [`session`] - session limits and lifecycle
//! - [`revocation`] - explicit invalidation
//! - [`cache`] - the revocation cache
//! - [`replay`] - single-use assertion tracking
//! - [`lockout`] - failed-login counters
//! - [`federation`] - typed federated-claim extraction
//! - [`audit`] - security event records
//! - [`storage`] - storage traits
//! - [`service`] - the wired facade

pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
pub mod federation;
pub mod lockout;
pub mod replay;
pub mod revocation;
pub mod rotation;
pub mod service;
pub mod session;
pub mod storage;
pub mod token;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use audit::{AuditSink, SecurityEvent, Severity, TracingAuditSink};
pub use cache::{InMemoryTokenCache, RevocationCache, TokenCache};
pub use config::{AuthConfig, ConfigError};
pub use error::{AuthError, ErrorCategory};
pub use federation::FederatedProfile;
pub use lockout::{LockoutDecision, LockoutTracker};
pub use replay::{AssertionRequest, ReplayCheck, ReplayForensics, ReplayGuard};
pub use revocation::RevocationService;
pub use rotation::RotationEngine;
pub use service::{AuthCollaborators, AuthService, AuthStores, CleanupReport};
pub use session::{DefaultSessionPolicy, SessionManager, SessionPolicy};
pub use storage::{
    AssertionStore, BlacklistStore, ClaimOutcome, CredentialStore, LoginAttemptStore,
    RotationOutcome, SessionStore,
};
pub use token::{
    AccessClaims, IssuedPair, JwtError, JwtService, RefreshClaims, SigningAlgorithm,
    SigningKeyPair, SnapshotSource, TokenIssuer,
};
pub use types::{
    AuthorizationSnapshot, BlacklistEntry, CredentialRecord, DeviceInfo, OrgAccess, ReplayMarker,
    RevocationReason, SessionRecord, TokenClass, TokenPair,
};

/// Type alias for credential lifecycle results.
pub type AuthResult<T> = Result<T, AuthError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use tessera_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::audit::{AuditSink, SecurityEvent, Severity};
    pub use crate::config::AuthConfig;
    pub use crate::error::AuthError;
    pub use crate::replay::{AssertionRequest, ReplayCheck};
    pub use crate::service::{AuthCollaborators, AuthService, AuthStores, CleanupReport};
    pub use crate::session::SessionPolicy;
    pub use crate::storage::{
        AssertionStore, BlacklistStore, ClaimOutcome, CredentialStore, LoginAttemptStore,
        RotationOutcome, SessionStore,
    };
    pub use crate::token::{JwtService, SigningAlgorithm, SigningKeyPair, SnapshotSource};
    pub use crate::types::{
        AuthorizationSnapshot, CredentialRecord, DeviceInfo, OrgAccess, RevocationReason,
        SessionRecord, TokenPair,
    };
}
