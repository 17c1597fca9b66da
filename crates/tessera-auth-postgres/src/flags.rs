//! Suspicious-activity account flags.

use async_trait::async_trait;
use sqlx_core::query::query;

use tessera_auth::AuthResult;
use tessera_auth::storage::flags::AccountFlagStore;

use crate::{PgPool, map_db_error};

/// PostgreSQL account flag store.
pub struct PostgresAccountFlagStore {
    pool: PgPool,
}

impl PostgresAccountFlagStore {
    /// Creates a new store over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountFlagStore for PostgresAccountFlagStore {
    async fn flag_suspicious(&self, subject: &str, reason: &str) -> AuthResult<()> {
        query(
            r#"
            INSERT INTO account_flags (subject, reason, flagged_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (subject) DO UPDATE SET reason = $2, flagged_at = NOW()
            "#,
        )
        .bind(subject)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }
}
