//! Credential storage.
//!
//! Stores refresh-token credentials and runs the rotation transaction.
//! Only token hashes ever reach this table.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use time::OffsetDateTime;
use uuid::Uuid;

use tessera_auth::AuthResult;
use tessera_auth::storage::credential::{CredentialStore, RotationOutcome};
use tessera_auth::types::credential::CredentialRecord;
use tessera_auth::types::reason::RevocationReason;

use crate::{PgPool, map_db_error, parse_reason};

// =============================================================================
// Row Mapping
// =============================================================================

/// Credential row tuple, in column order.
type CredentialRow = (
    Uuid,                  // token_id
    Uuid,                  // user_id
    Uuid,                  // session_id
    Uuid,                  // access_token_id
    String,                // token_hash
    String,                // device_fingerprint
    String,                // client_ip
    String,                // user_agent
    bool,                  // remember_me
    OffsetDateTime,        // issued_at
    OffsetDateTime,        // expires_at
    bool,                  // active
    i32,                   // rotation_count
    Option<OffsetDateTime>, // revoked_at
    Option<String>,        // revoked_reason
);

const CREDENTIAL_COLUMNS: &str = "token_id, user_id, session_id, access_token_id, token_hash, \
     device_fingerprint, client_ip, user_agent, remember_me, issued_at, expires_at, active, \
     rotation_count, revoked_at, revoked_reason";

fn credential_from_row(row: CredentialRow) -> AuthResult<CredentialRecord> {
    Ok(CredentialRecord {
        token_id: row.0,
        user_id: row.1,
        session_id: row.2,
        access_token_id: row.3,
        token_hash: row.4,
        device_fingerprint: row.5,
        client_ip: row.6,
        user_agent: row.7,
        remember_me: row.8,
        issued_at: row.9,
        expires_at: row.10,
        active: row.11,
        rotation_count: row.12,
        revoked_at: row.13,
        revoked_reason: parse_reason(row.14)?,
    })
}

// =============================================================================
// Credential Storage
// =============================================================================

/// PostgreSQL credential store.
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    /// Creates a new store over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PostgresCredentialStore {
    async fn create(&self, credential: &CredentialRecord) -> AuthResult<()> {
        query(
            r#"
            INSERT INTO credentials (token_id, user_id, session_id, access_token_id, token_hash,
                device_fingerprint, client_ip, user_agent, remember_me, issued_at, expires_at,
                active, rotation_count, revoked_at, revoked_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(credential.token_id)
        .bind(credential.user_id)
        .bind(credential.session_id)
        .bind(credential.access_token_id)
        .bind(&credential.token_hash)
        .bind(&credential.device_fingerprint)
        .bind(&credential.client_ip)
        .bind(&credential.user_agent)
        .bind(credential.remember_me)
        .bind(credential.issued_at)
        .bind(credential.expires_at)
        .bind(credential.active)
        .bind(credential.rotation_count)
        .bind(credential.revoked_at)
        .bind(credential.revoked_reason.map(|r| r.as_str()))
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn find_by_id(&self, token_id: Uuid) -> AuthResult<Option<CredentialRecord>> {
        let row: Option<CredentialRow> = query_as(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE token_id = $1"
        ))
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(credential_from_row).transpose()
    }

    async fn rotate(
        &self,
        token_id: Uuid,
        presented_hash: &str,
        replacement: &CredentialRecord,
    ) -> AuthResult<RotationOutcome> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // Row lock on the credential being rotated; a concurrent rotation
        // of the same token blocks here until this transaction resolves.
        let row: Option<CredentialRow> = query_as(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials \
             WHERE token_id = $1 AND active AND expires_at > NOW() FOR UPDATE"
        ))
        .bind(token_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;

        let Some(row) = row else {
            // Classify the miss: retired row means reuse, no row means
            // unknown, an active-but-expired row can only mean clock skew.
            let any: Option<CredentialRow> = query_as(&format!(
                "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE token_id = $1"
            ))
            .bind(token_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_db_error)?;

            // Dropping the transaction rolls it back.
            return Ok(match any {
                None => RotationOutcome::NotFound,
                Some(row) => {
                    let record = credential_from_row(row)?;
                    if record.active {
                        RotationOutcome::Expired
                    } else {
                        RotationOutcome::ReuseDetected { record }
                    }
                }
            });
        };

        let previous = credential_from_row(row)?;
        if previous.token_hash != presented_hash {
            return Ok(RotationOutcome::HashMismatch);
        }
        let rotation_count = previous.rotation_count + 1;

        query(
            r#"
            UPDATE credentials
            SET active = FALSE, revoked_at = NOW(), revoked_reason = $2
            WHERE token_id = $1
            "#,
        )
        .bind(token_id)
        .bind(RevocationReason::Rotation.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        query(
            r#"
            INSERT INTO credentials (token_id, user_id, session_id, access_token_id, token_hash,
                device_fingerprint, client_ip, user_agent, remember_me, issued_at, expires_at,
                active, rotation_count, revoked_at, revoked_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, TRUE, $12, NULL, NULL)
            "#,
        )
        .bind(replacement.token_id)
        .bind(replacement.user_id)
        .bind(replacement.session_id)
        .bind(replacement.access_token_id)
        .bind(&replacement.token_hash)
        .bind(&replacement.device_fingerprint)
        .bind(&replacement.client_ip)
        .bind(&replacement.user_agent)
        .bind(replacement.remember_me)
        .bind(replacement.issued_at)
        .bind(replacement.expires_at)
        .bind(rotation_count)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        query(
            r#"
            UPDATE sessions
            SET credential_id = $2, last_activity = NOW()
            WHERE id = $1
            "#,
        )
        .bind(previous.session_id)
        .bind(replacement.token_id)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(RotationOutcome::Committed {
            previous,
            rotation_count,
        })
    }

    async fn retire(
        &self,
        token_id: Uuid,
        reason: RevocationReason,
    ) -> AuthResult<Option<CredentialRecord>> {
        // RETURNING gives back the pre-update image via a CTE so the caller
        // can blacklist the pair; plain RETURNING would show the new state.
        let row: Option<CredentialRow> = query_as(&format!(
            r#"
            WITH retired AS (
                UPDATE credentials
                SET active = FALSE, revoked_at = NOW(), revoked_reason = $2
                WHERE token_id = $1 AND active
                RETURNING token_id
            )
            SELECT {CREDENTIAL_COLUMNS} FROM credentials
            WHERE token_id IN (SELECT token_id FROM retired)
            "#
        ))
        .bind(token_id)
        .bind(reason.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(credential_from_row).transpose()
    }

    async fn retire_all_for_user(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
    ) -> AuthResult<Vec<CredentialRecord>> {
        let rows: Vec<CredentialRow> = query_as(&format!(
            r#"
            WITH retired AS (
                UPDATE credentials
                SET active = FALSE, revoked_at = NOW(), revoked_reason = $2
                WHERE user_id = $1 AND active
                RETURNING token_id
            )
            SELECT {CREDENTIAL_COLUMNS} FROM credentials
            WHERE token_id IN (SELECT token_id FROM retired)
            "#
        ))
        .bind(user_id)
        .bind(reason.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(credential_from_row).collect()
    }

    async fn list_active_for_user(&self, user_id: Uuid) -> AuthResult<Vec<CredentialRecord>> {
        let rows: Vec<CredentialRow> = query_as(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials \
             WHERE user_id = $1 AND active ORDER BY issued_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        rows.into_iter().map(credential_from_row).collect()
    }

    async fn deactivate_expired(&self) -> AuthResult<u64> {
        let result = query(
            r#"
            UPDATE credentials
            SET active = FALSE, revoked_at = NOW(), revoked_reason = $1
            WHERE active AND expires_at < NOW()
            "#,
        )
        .bind(RevocationReason::Expired.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }

    async fn purge_expired(&self, grace: std::time::Duration) -> AuthResult<u64> {
        let result = query(
            r#"
            DELETE FROM credentials
            WHERE expires_at < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(grace.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Tests
// =============================================================================
