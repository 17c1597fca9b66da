//! Failed-login counter storage.
//!
//! The increment and threshold read happen in one upsert statement, so
//! concurrent failures from multiple instances never lose counts.

use async_trait::async_trait;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;

use tessera_auth::AuthResult;
use tessera_auth::storage::lockout::LoginAttemptStore;

use crate::{PgPool, map_db_error};

/// PostgreSQL failed-login counter store.
pub struct PostgresLoginAttemptStore {
    pool: PgPool,
}

impl PostgresLoginAttemptStore {
    /// Creates a new store over a connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoginAttemptStore for PostgresLoginAttemptStore {
    async fn record_failure(&self, subject: &str, window: std::time::Duration) -> AuthResult<u32> {
        // A lapsed window resets the counter; otherwise increment in place.
        let failures: i32 = query_scalar(
            r#"
            INSERT INTO login_attempts (subject, failures, window_started_at)
            VALUES ($1, 1, NOW())
            ON CONFLICT (subject) DO UPDATE SET
                failures = CASE
                    WHEN login_attempts.window_started_at < NOW() - make_interval(secs => $2)
                    THEN 1
                    ELSE login_attempts.failures + 1
                END,
                window_started_at = CASE
                    WHEN login_attempts.window_started_at < NOW() - make_interval(secs => $2)
                    THEN NOW()
                    ELSE login_attempts.window_started_at
                END
            RETURNING failures
            "#,
        )
        .bind(subject)
        .bind(window.as_secs_f64())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(failures.max(0) as u32)
    }

    async fn clear(&self, subject: &str) -> AuthResult<()> {
        query("DELETE FROM login_attempts WHERE subject = $1")
            .bind(subject)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        Ok(())
    }
}
