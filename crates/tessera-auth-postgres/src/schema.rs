//! Idempotent schema bootstrap.
//!
//! The engine owns its tables and creates them on startup rather than
//! shipping migration files; every statement is `IF NOT EXISTS` so the
//! bootstrap is safe to run on every boot and from multiple instances.

use sqlx_core::query::query;

use tessera_auth::AuthResult;

use crate::{PgPool, map_db_error};

const STATEMENTS: &[&str] = &[
    // Refresh-token credentials. The primary key doubles as the rotation
    // lock target; one row per token id, never hard-deleted inside the
    // retention grace window.
    r#"
    CREATE TABLE IF NOT EXISTS credentials (
        token_id UUID PRIMARY KEY,
        user_id UUID NOT NULL,
        session_id UUID NOT NULL,
        access_token_id UUID NOT NULL,
        token_hash TEXT NOT NULL,
        device_fingerprint TEXT NOT NULL,
        client_ip TEXT NOT NULL,
        user_agent TEXT NOT NULL,
        remember_me BOOLEAN NOT NULL,
        issued_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        rotation_count INTEGER NOT NULL DEFAULT 0,
        revoked_at TIMESTAMPTZ,
        revoked_reason TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_credentials_user_active ON credentials (user_id) WHERE active",
    "CREATE INDEX IF NOT EXISTS idx_credentials_expires_at ON credentials (expires_at)",
    // Sessions. last_activity drives oldest-first eviction.
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id UUID PRIMARY KEY,
        user_id UUID NOT NULL,
        credential_id UUID NOT NULL,
        device_name TEXT NOT NULL,
        remember_me BOOLEAN NOT NULL,
        last_activity TIMESTAMPTZ NOT NULL,
        active BOOLEAN NOT NULL DEFAULT TRUE,
        ended_at TIMESTAMPTZ,
        end_reason TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_sessions_user_activity ON sessions (user_id, last_activity) WHERE active",
    // Revocation blacklist. Monotonic inserts; expires_at is the cleanup
    // horizon, not the token's own expiry.
    r#"
    CREATE TABLE IF NOT EXISTS token_blacklist (
        token_id UUID PRIMARY KEY,
        user_id UUID NOT NULL,
        token_class TEXT NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL,
        reason TEXT NOT NULL,
        actor TEXT,
        ip TEXT,
        user_agent TEXT,
        created_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_token_blacklist_expires_at ON token_blacklist (expires_at)",
    // Single-use assertion markers. The primary key IS the replay guard:
    // the second insert for an id loses deterministically.
    r#"
    CREATE TABLE IF NOT EXISTS assertion_markers (
        assertion_id TEXT PRIMARY KEY,
        correlation_id TEXT NOT NULL,
        subject TEXT NOT NULL,
        ip TEXT NOT NULL,
        user_agent TEXT,
        first_used_at TIMESTAMPTZ NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_assertion_markers_expires_at ON assertion_markers (expires_at)",
    // Store-backed failed-login counters, shared across instances.
    r#"
    CREATE TABLE IF NOT EXISTS login_attempts (
        subject TEXT PRIMARY KEY,
        failures INTEGER NOT NULL,
        window_started_at TIMESTAMPTZ NOT NULL
    )
    "#,
    // Suspicious-activity flags raised by the replay guard.
    r#"
    CREATE TABLE IF NOT EXISTS account_flags (
        subject TEXT PRIMARY KEY,
        reason TEXT NOT NULL,
        flagged_at TIMESTAMPTZ NOT NULL
    )
    "#,
];

/// Creates all tables and indexes if absent.
///
/// # Errors
///
/// Returns an error if a DDL statement fails.
pub async fn ensure_schema(pool: &PgPool) -> AuthResult<()> {
    for statement in STATEMENTS {
        query(statement)
            .execute(pool)
            .await
            .map_err(map_db_error)?;
    }
    tracing::debug!("credential schema ensured");
    Ok(())
}
