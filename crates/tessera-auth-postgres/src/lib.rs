//! PostgreSQL storage backend for tessera-auth.
//!
//! Provides persistent storage for:
//!
//! - Refresh-token credentials (with the locked rotation transaction)
//! - User sessions
//! - The revocation blacklist
//! - Single-use assertion markers
//! - Failed-login counters and account flags
//!
//! Tables are plain typed columns created idempotently by
//! [`schema::ensure_schema`]; the two uniqueness-critical tables
//! (`credentials`, `assertion_markers`) rely on their primary keys as the
//! concurrency-control mechanism.
//!
//! # Example
//!
//! ```ignore
//! use tessera_auth_postgres::PostgresAuthStorage;
//!
//! let storage = PostgresAuthStorage::connect("postgres://localhost/tessera").await?;
//! storage.ensure_schema().await?;
//!
//! let service = AuthService::new(config, jwt, storage.stores(), collaborators)?;
//! ```

pub mod assertion;
pub mod blacklist;
pub mod credential;
pub mod flags;
pub mod lockout;
pub mod schema;
pub mod session;

use std::sync::Arc;

use sqlx_core::pool::Pool;
use sqlx_postgres::{PgPoolOptions, Postgres};

use tessera_auth::error::AuthError;
use tessera_auth::service::AuthStores;

pub use assertion::PostgresAssertionStore;
pub use blacklist::PostgresBlacklistStore;
pub use credential::PostgresCredentialStore;
pub use flags::PostgresAccountFlagStore;
pub use lockout::PostgresLoginAttemptStore;
pub use session::PostgresSessionStore;

/// PostgreSQL connection pool type alias.
pub type PgPool = Pool<Postgres>;

/// Maps a database error onto the engine's taxonomy.
///
/// Pool and connection problems are transient (`Unavailable`); everything
/// else is a `Storage` error. Blacklist and replay callers rely on this
/// distinction never producing a false "not found".
pub(crate) fn map_db_error(err: sqlx_core::Error) -> AuthError {
    match &err {
        sqlx_core::Error::PoolTimedOut
        | sqlx_core::Error::PoolClosed
        | sqlx_core::Error::Io(_) => AuthError::unavailable(err.to_string()),
        _ => AuthError::storage(err.to_string()),
    }
}

/// Parses a reason column, rejecting values this crate never wrote.
pub(crate) fn parse_reason(
    value: Option<String>,
) -> Result<Option<tessera_auth::RevocationReason>, AuthError> {
    value
        .map(|s| {
            s.parse()
                .map_err(|_| AuthError::storage(format!("unknown revocation reason: {s}")))
        })
        .transpose()
}

/// Connection bundle exposing all stores over one pool.
pub struct PostgresAuthStorage {
    pool: PgPool,
}

impl PostgresAuthStorage {
    /// Wraps an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to PostgreSQL with default pool settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn connect(url: &str) -> Result<Self, AuthError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(url)
            .await
            .map_err(map_db_error)?;
        Ok(Self::new(pool))
    }

    /// Creates the schema if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if a DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<(), AuthError> {
        schema::ensure_schema(&self.pool).await
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Builds the store bundle consumed by `AuthService`.
    #[must_use]
    pub fn stores(&self) -> AuthStores {
        AuthStores {
            credentials: Arc::new(PostgresCredentialStore::new(self.pool.clone())),
            sessions: Arc::new(PostgresSessionStore::new(self.pool.clone())),
            blacklist: Arc::new(PostgresBlacklistStore::new(self.pool.clone())),
            assertions: Arc::new(PostgresAssertionStore::new(self.pool.clone())),
            login_attempts: Arc::new(PostgresLoginAttemptStore::new(self.pool.clone())),
            account_flags: Arc::new(PostgresAccountFlagStore::new(self.pool.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reason() {
        assert_eq!(
            parse_reason(Some("rotation".to_string())).unwrap(),
            Some(tessera_auth::RevocationReason::Rotation)
        );
        assert_eq!(parse_reason(None).unwrap(), None);
        assert!(parse_reason(Some("bogus".to_string())).is_err());
    }
}
