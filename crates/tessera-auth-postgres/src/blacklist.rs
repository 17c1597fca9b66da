//! Revocation blacklist storage.
//!
//! Inserts are monotonic: `ON CONFLICT DO NOTHING` keeps the first entry
//! for an id, and nothing removes an entry before its horizon passes.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use uuid::Uuid;

use tessera_auth::AuthResult;
use tessera_auth::error::AuthError;
use tessera_auth::storage::blacklist::BlacklistStore;
use tessera_auth::types::blacklist::{BlacklistEntry, TokenClass};

use crate::{PgPool, map_db_error};

/// PostgreSQL blacklist store.
pub struct PostgresBlacklistStore {
    pool: PgPool,
}

impl PostgresBlacklistStore {
    /// Creates a new store over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Fetches an entry for forensic lookups.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a stored class is unknown.
    pub async fn find(&self, token_id: Uuid) -> AuthResult<Option<BlacklistEntry>> {
        type Row = (
            Uuid,
            Uuid,
            String,
            time::OffsetDateTime,
            String,
            Option<String>,
            Option<String>,
            Option<String>,
            time::OffsetDateTime,
        );
        let row: Option<Row> = sqlx_core::query_as::query_as(
            r#"
            SELECT token_id, user_id, token_class, expires_at, reason, actor, ip, user_agent, created_at
            FROM token_blacklist
            WHERE token_id = $1
            "#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(|row| {
            Ok(BlacklistEntry {
                token_id: row.0,
                user_id: row.1,
                token_class: TokenClass::from_str(&row.2).map_err(AuthError::storage)?,
                expires_at: row.3,
                reason: row
                    .4
                    .parse()
                    .map_err(|_| AuthError::storage(format!("unknown reason: {}", row.4)))?,
                actor: row.5,
                ip: row.6,
                user_agent: row.7,
                created_at: row.8,
            })
        })
        .transpose()
    }
}

#[async_trait]
impl BlacklistStore for PostgresBlacklistStore {
    async fn insert(&self, entry: &BlacklistEntry) -> AuthResult<()> {
        query(
            r#"
            INSERT INTO token_blacklist (token_id, user_id, token_class, expires_at, reason,
                actor, ip, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (token_id) DO NOTHING
            "#,
        )
        .bind(entry.token_id)
        .bind(entry.user_id)
        .bind(entry.token_class.as_str())
        .bind(entry.expires_at)
        .bind(entry.reason.as_str())
        .bind(&entry.actor)
        .bind(&entry.ip)
        .bind(&entry.user_agent)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn contains(&self, token_id: Uuid) -> AuthResult<bool> {
        let exists: bool =
            query_scalar("SELECT EXISTS(SELECT 1 FROM token_blacklist WHERE token_id = $1)")
                .bind(token_id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_db_error)?;

        Ok(exists)
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let result = query("DELETE FROM token_blacklist WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }
}
