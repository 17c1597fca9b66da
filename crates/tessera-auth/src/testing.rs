//! In-memory mock stores shared by the crate's unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::AuthResult;
use crate::audit::{AuditSink, SecurityEvent};
use crate::error::AuthError;
use crate::storage::assertion::AssertionStore;
use crate::storage::blacklist::BlacklistStore;
use crate::storage::credential::{CredentialStore, RotationOutcome};
use crate::storage::flags::AccountFlagStore;
use crate::storage::lockout::LoginAttemptStore;
use crate::storage::session::SessionStore;
use crate::storage::ClaimOutcome;
use crate::token::issuer::SnapshotSource;
use crate::types::assertion::ReplayMarker;
use crate::types::blacklist::BlacklistEntry;
use crate::types::credential::CredentialRecord;
use crate::types::device::DeviceInfo;
use crate::types::reason::RevocationReason;
use crate::types::session::SessionRecord;
use crate::types::snapshot::{AuthorizationSnapshot, OrgAccess};

// =============================================================================
// Credential store
// =============================================================================

#[derive(Default)]
pub(crate) struct MockCredentialStore {
    pub credentials: Mutex<HashMap<Uuid, CredentialRecord>>,
    pub sessions: Mutex<Option<Arc<MockSessionStore>>>,
    pub fail_rotate: AtomicBool,
    pub rotate_delay: Mutex<Option<std::time::Duration>>,
}

impl MockCredentialStore {
    /// Links a session store so `rotate` can re-point sessions like the
    /// real transaction does.
    pub fn link_sessions(&self, sessions: Arc<MockSessionStore>) {
        *self.sessions.lock().unwrap() = Some(sessions);
    }

    /// Inserts an active credential with fresh ids; returns its token id.
    pub fn insert_active(&self, user_id: Uuid, expires_at: OffsetDateTime) -> Uuid {
        let device = DeviceInfo::new("fp", "203.0.113.7", "test-agent");
        let credential = CredentialRecord::new(
            Uuid::new_v4(),
            user_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            CredentialRecord::hash_token("seed"),
            &device,
            false,
            OffsetDateTime::now_utc(),
            expires_at,
        );
        let id = credential.token_id;
        self.credentials.lock().unwrap().insert(id, credential);
        id
    }
}

#[async_trait]
impl CredentialStore for MockCredentialStore {
    async fn create(&self, credential: &CredentialRecord) -> AuthResult<()> {
        let mut map = self.credentials.lock().unwrap();
        if map.contains_key(&credential.token_id) {
            return Err(AuthError::storage("duplicate token id"));
        }
        map.insert(credential.token_id, credential.clone());
        Ok(())
    }

    async fn find_by_id(&self, token_id: Uuid) -> AuthResult<Option<CredentialRecord>> {
        Ok(self.credentials.lock().unwrap().get(&token_id).cloned())
    }

    async fn rotate(
        &self,
        token_id: Uuid,
        presented_hash: &str,
        replacement: &CredentialRecord,
    ) -> AuthResult<RotationOutcome> {
        let delay = *self.rotate_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_rotate.load(Ordering::SeqCst) {
            return Err(AuthError::storage("rotate failed"));
        }

        let now = OffsetDateTime::now_utc();
        let sessions = self.sessions.lock().unwrap().clone();
        let mut map = self.credentials.lock().unwrap();

        let Some(current) = map.get(&token_id).cloned() else {
            return Ok(RotationOutcome::NotFound);
        };
        if !current.active {
            return Ok(RotationOutcome::ReuseDetected { record: current });
        }
        if now > current.expires_at {
            return Ok(RotationOutcome::Expired);
        }
        if current.token_hash != presented_hash {
            return Ok(RotationOutcome::HashMismatch);
        }

        let previous = current.clone();
        let rotation_count = previous.rotation_count + 1;

        let mut retired = current;
        retired.active = false;
        retired.revoked_at = Some(now);
        retired.revoked_reason = Some(RevocationReason::Rotation);
        map.insert(token_id, retired);

        let mut inserted = replacement.clone();
        inserted.rotation_count = rotation_count;
        map.insert(inserted.token_id, inserted.clone());

        if let Some(sessions) = sessions {
            sessions.repoint(previous.session_id, inserted.token_id, now);
        }

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
        let mut map = self.credentials.lock().unwrap();
        match map.get_mut(&token_id) {
            Some(credential) if credential.active => {
                let before = credential.clone();
                credential.active = false;
                credential.revoked_at = Some(OffsetDateTime::now_utc());
                credential.revoked_reason = Some(reason);
                Ok(Some(before))
            }
            _ => Ok(None),
        }
    }

    async fn retire_all_for_user(
        &self,
        user_id: Uuid,
        reason: RevocationReason,
    ) -> AuthResult<Vec<CredentialRecord>> {
        let mut map = self.credentials.lock().unwrap();
        let mut retired = Vec::new();
        for credential in map.values_mut() {
            if credential.user_id == user_id && credential.active {
                retired.push(credential.clone());
                credential.active = false;
                credential.revoked_at = Some(OffsetDateTime::now_utc());
                credential.revoked_reason = Some(reason);
            }
        }
        Ok(retired)
    }

    async fn list_active_for_user(&self, user_id: Uuid) -> AuthResult<Vec<CredentialRecord>> {
        Ok(self
            .credentials
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.user_id == user_id && c.active)
            .cloned()
            .collect())
    }

    async fn deactivate_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut count = 0u64;
        for credential in self.credentials.lock().unwrap().values_mut() {
            if credential.active && now > credential.expires_at {
                credential.active = false;
                credential.revoked_at = Some(now);
                credential.revoked_reason = Some(RevocationReason::Expired);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn purge_expired(&self, grace: std::time::Duration) -> AuthResult<u64> {
        let cutoff = OffsetDateTime::now_utc() - time::Duration::seconds(grace.as_secs() as i64);
        let mut map = self.credentials.lock().unwrap();
        let before = map.len();
        map.retain(|_, c| c.expires_at > cutoff);
        Ok((before - map.len()) as u64)
    }
}

// =============================================================================
// Session store
// =============================================================================

#[derive(Default)]
pub(crate) struct MockSessionStore {
    pub sessions: Mutex<HashMap<Uuid, SessionRecord>>,
}

impl MockSessionStore {
    pub fn repoint(&self, session_id: Uuid, credential_id: Uuid, at: OffsetDateTime) {
        if let Some(session) = self.sessions.lock().unwrap().get_mut(&session_id) {
            session.credential_id = credential_id;
            session.last_activity = at;
        }
    }
}

#[async_trait]
impl SessionStore for MockSessionStore {
    async fn create(&self, session: &SessionRecord) -> AuthResult<()> {
        self.sessions
            .lock()
            .unwrap()
            .insert(session.id, session.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<SessionRecord>> {
        Ok(self.sessions.lock().unwrap().get(&id).cloned())
    }

    async fn count_active_for_user(&self, user_id: Uuid) -> AuthResult<u64> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id && s.active)
            .count() as u64)
    }

    async fn oldest_active_for_user(&self, user_id: Uuid) -> AuthResult<Option<SessionRecord>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id && s.active)
            .min_by_key(|s| s.last_activity)
            .cloned())
    }

    async fn end(&self, id: Uuid, reason: RevocationReason) -> AuthResult<bool> {
        let mut map = self.sessions.lock().unwrap();
        match map.get_mut(&id) {
            Some(session) if session.active => {
                session.active = false;
                session.ended_at = Some(OffsetDateTime::now_utc());
                session.end_reason = Some(reason);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn end_all_for_user(&self, user_id: Uuid, reason: RevocationReason) -> AuthResult<u64> {
        let mut count = 0u64;
        for session in self.sessions.lock().unwrap().values_mut() {
            if session.user_id == user_id && session.active {
                session.active = false;
                session.ended_at = Some(OffsetDateTime::now_utc());
                session.end_reason = Some(reason);
                count += 1;
            }
        }
        Ok(count)
    }
}

// =============================================================================
// Blacklist store
// =============================================================================

#[derive(Default)]
pub(crate) struct MockBlacklistStore {
    pub entries: Mutex<HashMap<Uuid, BlacklistEntry>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl BlacklistStore for MockBlacklistStore {
    async fn insert(&self, entry: &BlacklistEntry) -> AuthResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::storage("blacklist insert failed"));
        }
        self.entries
            .lock()
            .unwrap()
            .entry(entry.token_id)
            .or_insert_with(|| entry.clone());
        Ok(())
    }

    async fn contains(&self, token_id: Uuid) -> AuthResult<bool> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::storage("blacklist lookup failed"));
        }
        Ok(self.entries.lock().unwrap().contains_key(&token_id))
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut map = self.entries.lock().unwrap();
        let before = map.len();
        map.retain(|_, e| e.expires_at > now);
        Ok((before - map.len()) as u64)
    }
}

// =============================================================================
// Assertion store
// =============================================================================

#[derive(Default)]
pub(crate) struct MockAssertionStore {
    pub markers: Mutex<HashMap<String, ReplayMarker>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl AssertionStore for MockAssertionStore {
    async fn claim_once(&self, marker: &ReplayMarker) -> AuthResult<ClaimOutcome<ReplayMarker>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AuthError::storage("assertion store unavailable"));
        }
        let mut map = self.markers.lock().unwrap();
        if let Some(existing) = map.get(&marker.assertion_id) {
            return Ok(ClaimOutcome::AlreadyClaimed(existing.clone()));
        }
        map.insert(marker.assertion_id.clone(), marker.clone());
        Ok(ClaimOutcome::Claimed)
    }

    async fn find(&self, assertion_id: &str) -> AuthResult<Option<ReplayMarker>> {
        Ok(self.markers.lock().unwrap().get(assertion_id).cloned())
    }

    async fn cleanup_expired(&self) -> AuthResult<u64> {
        let now = OffsetDateTime::now_utc();
        let mut map = self.markers.lock().unwrap();
        let before = map.len();
        map.retain(|_, m| m.expires_at > now);
        Ok((before - map.len()) as u64)
    }
}

// =============================================================================
// Misc collaborators
// =============================================================================

pub(crate) struct FixedSnapshotSource;

#[async_trait]
impl SnapshotSource for FixedSnapshotSource {
    async fn snapshot_for_user(&self, _user_id: Uuid) -> AuthResult<AuthorizationSnapshot> {
        Ok(AuthorizationSnapshot::new(
            vec!["member".to_string()],
            OrgAccess::All,
        ))
    }
}

#[derive(Default)]
pub(crate) struct MockAccountFlagStore {
    pub flags: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl AccountFlagStore for MockAccountFlagStore {
    async fn flag_suspicious(&self, subject: &str, reason: &str) -> AuthResult<()> {
        self.flags
            .lock()
            .unwrap()
            .insert(subject.to_string(), reason.to_string());
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct MockLoginAttemptStore {
    pub counters: Mutex<HashMap<String, (u32, OffsetDateTime)>>,
}

#[async_trait]
impl LoginAttemptStore for MockLoginAttemptStore {
    async fn record_failure(&self, subject: &str, window: std::time::Duration) -> AuthResult<u32> {
        let now = OffsetDateTime::now_utc();
        let window = time::Duration::seconds(window.as_secs() as i64);
        let mut map = self.counters.lock().unwrap();
        let entry = map
            .entry(subject.to_string())
            .or_insert((0, now));
        if now - entry.1 > window {
            *entry = (0, now);
        }
        entry.0 += 1;
        Ok(entry.0)
    }

    async fn clear(&self, subject: &str) -> AuthResult<()> {
        self.counters.lock().unwrap().remove(subject);
        Ok(())
    }
}

/// Audit sink that collects events for assertions.
#[derive(Default)]
pub(crate) struct CollectingAuditSink {
    pub events: Mutex<Vec<SecurityEvent>>,
}

impl AuditSink for CollectingAuditSink {
    fn record(&self, event: SecurityEvent) {
        self.events.lock().unwrap().push(event);
    }
}
