//! Single-use assertion marker storage.
//!
//! `claim_once` is the claim-once primitive: the primary key on
//! `assertion_id` makes the store, not the application, decide who consumed
//! the assertion first. The losing insert affects zero rows and reads back
//! the winner's marker for forensics.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;

use tessera_auth::AuthResult;
use tessera_auth::error::AuthError;
use tessera_auth::storage::ClaimOutcome;
use tessera_auth::storage::assertion::AssertionStore;
use tessera_auth::types::assertion::ReplayMarker;

use crate::{PgPool, map_db_error};

type MarkerRow = (
    String,                // assertion_id
    String,                // correlation_id
    String,                // subject
    String,                // ip
    Option<String>,        // user_agent
    OffsetDateTime,        // first_used_at
    OffsetDateTime,        // expires_at
);

const MARKER_COLUMNS: &str =
    "assertion_id, correlation_id, subject, ip, user_agent, first_used_at, expires_at";

fn marker_from_row(row: MarkerRow) -> ReplayMarker {
    ReplayMarker {
        assertion_id: row.0,
        correlation_id: row.1,
        subject: row.2,
        ip: row.3,
        user_agent: row.4,
        first_used_at: row.5,
        expires_at: row.6,
    }
}

/// PostgreSQL assertion marker store.
pub struct PostgresAssertionStore {
    pool: PgPool,
}

impl PostgresAssertionStore {
    /// Creates a new store over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssertionStore for PostgresAssertionStore {
    async fn claim_once(&self, marker: &ReplayMarker) -> AuthResult<ClaimOutcome<ReplayMarker>> {
        let result = query(
            r#"
            INSERT INTO assertion_markers (assertion_id, correlation_id, subject, ip,
                user_agent, first_used_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (assertion_id) DO NOTHING
            "#,
        )
        .bind(&marker.assertion_id)
        .bind(&marker.correlation_id)
        .bind(&marker.subject)
        .bind(&marker.ip)
        .bind(&marker.user_agent)
        .bind(marker.first_used_at)
        .bind(marker.expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 1 {
            return Ok(ClaimOutcome::Claimed);
        }

        // The insert lost; read the winner's marker for forensics.
        let original = self.find(&marker.assertion_id).await?.ok_or_else(|| {
            // Possible only if cleanup deleted the winner between the two
            // statements; treat as a storage anomaly, which fails closed.
            AuthError::storage("assertion marker vanished after conflict")
        })?;
        Ok(ClaimOutcome::AlreadyClaimed(original))
    }

    async fn find(&self, assertion_id: &str) -> AuthResult<Option<ReplayMarker>> {
        let row: Option<MarkerRow> = query_as(&format!(
            "SELECT {MARKER_COLUMNS} FROM assertion_markers WHERE assertion_id = $1"
        ))
        .bind(assertion_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(row.map(marker_from_row))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let result = query("DELETE FROM assertion_markers WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }
}
