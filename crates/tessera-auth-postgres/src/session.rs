//! Session storage.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use time::OffsetDateTime;
use uuid::Uuid;

use tessera_auth::AuthResult;
use tessera_auth::storage::session::SessionStore;
use tessera_auth::types::reason::RevocationReason;
use tessera_auth::types::session::SessionRecord;

use crate::{PgPool, map_db_error, parse_reason};

// =============================================================================
// Row Mapping
// =============================================================================

type SessionRow = (
    Uuid,                  // id
    Uuid,                  // user_id
    Uuid,                  // credential_id
    String,                // device_name
    bool,                  // remember_me
    OffsetDateTime,        // last_activity
    bool,                  // active
    Option<OffsetDateTime>, // ended_at
    Option<String>,        // end_reason
);

const SESSION_COLUMNS: &str =
    "id, user_id, credential_id, device_name, remember_me, last_activity, active, ended_at, end_reason";

fn session_from_row(row: SessionRow) -> AuthResult<SessionRecord> {
    Ok(SessionRecord {
        id: row.0,
        user_id: row.1,
        credential_id: row.2,
        device_name: row.3,
        remember_me: row.4,
        last_activity: row.5,
        active: row.6,
        ended_at: row.7,
        end_reason: parse_reason(row.8)?,
    })
}

// =============================================================================
// Session Storage
// =============================================================================

/// PostgreSQL session store.
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    /// Creates a new store over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn create(&self, session: &SessionRecord) -> AuthResult<()> {
        query(
            r#"
            INSERT INTO sessions (id, user_id, credential_id, device_name, remember_me,
                last_activity, active, ended_at, end_reason)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(session.credential_id)
        .bind(&session.device_name)
        .bind(session.remember_me)
        .bind(session.last_activity)
        .bind(session.active)
        .bind(session.ended_at)
        .bind(session.end_reason.map(|r| r.as_str()))
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<SessionRecord>> {
        let row: Option<SessionRow> = query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(session_from_row).transpose()
    }

    async fn count_active_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        let count: i64 =
            query_scalar("SELECT COUNT(*) FROM sessions WHERE user_id = $1 AND active")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .map_err(map_db_error)?;

        Ok(count as u64)
    }

    async fn oldest_active_for_user(&self, user_id: Uuid) -> AuthResult<Option<SessionRecord>> {
        let row: Option<SessionRow> = query_as(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE user_id = $1 AND active ORDER BY last_activity ASC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        row.map(session_from_row).transpose()
    }

    async fn end(&self, id: Uuid, reason: RevocationReason) -> AuthResult<bool> {
        let result = query(
            r#"
            UPDATE sessions
            SET active = FALSE, ended_at = NOW(), end_reason = $2
            WHERE id = $1 AND active
            "#,
        )
        .bind(id)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn end_all_for_user(&self, user_id: Uuid, reason: RevocationReason) -> AuthResult<u64> {
        let result = query(
            r#"
            UPDATE sessions
            SET active = FALSE, ended_at = NOW(), end_reason = $2
            WHERE user_id = $1 AND active
            "#,
        )
        .bind(user_id)
        .bind(reason.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_row_round_trip() {
        let now = OffsetDateTime::now_utc();
        let row: SessionRow = (
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            "Chrome on macOS".to_string(),
            false,
            now,
            false,
            Some(now),
            Some("session_limit_exceeded".to_string()),
        );
        let record = session_from_row(row).unwrap();
        assert_eq!(record.device_name, "Chrome on macOS");
        assert_eq!(
            record.end_reason,
            Some(RevocationReason::SessionLimitExceeded)
        );
    }
}
