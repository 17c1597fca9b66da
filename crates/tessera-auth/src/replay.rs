//! Single-use assertion replay prevention.
//!
//! Structurally the same problem as refresh-token reuse detection, solved
//! with the same primitive: a unique-constrained insert used as a
//! distributed mutual-exclusion lock (see
//! [`ClaimOutcome`](crate::storage::ClaimOutcome)). Whoever inserts the
//! marker first authenticates; everyone else is a replay.
//!
//! The guard fails closed: if the store cannot answer, authentication is
//! denied rather than risking an unverified assertion through.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::warn;

use crate::AuthResult;
use crate::audit::{AuditSink, SecurityEvent};
use crate::error::AuthError;
use crate::storage::ClaimOutcome;
use crate::storage::assertion::AssertionStore;
use crate::storage::flags::AccountFlagStore;
use crate::types::assertion::ReplayMarker;

/// A federated-login assertion presented for consumption.
#[derive(Debug, Clone)]
pub struct AssertionRequest {
    /// Assertion identifier from the federated payload.
    pub assertion_id: String,

    /// Correlation reference to the authentication request.
    pub correlation_id: String,

    /// Subject identity asserted by the identity provider.
    pub subject: String,

    /// Requester IP.
    pub ip: String,

    /// Requester User-Agent.
    pub user_agent: Option<String>,

    /// Assertion validity horizon (drives marker cleanup).
    pub expires_at: OffsetDateTime,
}

/// Verdict of a replay check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplayCheck {
    /// First use; safe to proceed with authentication.
    Safe,
    /// The assertion was already consumed. Authentication must be denied.
    Replayed(ReplayForensics),
}

/// Forensic details of the original consumption, for the security response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayForensics {
    /// The replayed assertion id.
    pub assertion_id: String,

    /// Subject recorded at first use.
    pub subject: String,

    /// IP of the original request.
    pub original_ip: String,

    /// User-Agent of the original request.
    pub original_user_agent: Option<String>,

    /// When the assertion was first consumed.
    pub first_used_at: OffsetDateTime,

    /// Correlation id of the original request.
    pub original_correlation_id: String,
}

/// Tracks single-use assertion consumption.
pub struct ReplayGuard {
    assertions: Arc<dyn AssertionStore>,
    flags: Arc<dyn AccountFlagStore>,
    audit: Arc<dyn AuditSink>,
}

impl ReplayGuard {
    /// Creates a new replay guard.
    #[must_use]
    pub fn new(
        assertions: Arc<dyn AssertionStore>,
        flags: Arc<dyn AccountFlagStore>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self {
            assertions,
            flags,
            audit,
        }
    }

    /// Atomically checks and tracks an assertion.
    ///
    /// Exactly one of any number of concurrent calls for the same assertion
    /// id observes [`ReplayCheck::Safe`]. On replay, the subject's account
    /// is flagged as exhibiting suspicious activity and a critical event is
    /// emitted; the forensic details reference the *original* consumption.
    ///
    /// # Errors
    ///
    /// Returns `Unavailable` on any storage failure: the guard fails
    /// closed, denying authentication rather than accepting an assertion it
    /// could not verify.
    pub async fn check_and_track(&self, request: &AssertionRequest) -> AuthResult<ReplayCheck> {
        let marker = ReplayMarker {
            assertion_id: request.assertion_id.clone(),
            correlation_id: request.correlation_id.clone(),
            subject: request.subject.clone(),
            ip: request.ip.clone(),
            user_agent: request.user_agent.clone(),
            first_used_at: OffsetDateTime::now_utc(),
            expires_at: request.expires_at,
        };

        let outcome = self
            .assertions
            .claim_once(&marker)
            .await
            .map_err(|err| AuthError::unavailable(format!("assertion check failed: {err}")))?;

        match outcome {
            ClaimOutcome::Claimed => Ok(ReplayCheck::Safe),
            ClaimOutcome::AlreadyClaimed(original) => {
                // Flagging is part of the response but never blocks it; the
                // denial already happened the moment the insert lost.
                if let Err(err) = self
                    .flags
                    .flag_suspicious(&request.subject, "assertion replay")
                    .await
                {
                    warn!(subject = %request.subject, error = %err, "failed to flag account");
                }

                self.audit.record(SecurityEvent::AssertionReplayed {
                    subject: request.subject.clone(),
                    assertion_id: request.assertion_id.clone(),
                    original_ip: original.ip.clone(),
                    first_used_at: original.first_used_at,
                    replay_ip: request.ip.clone(),
                });

                Ok(ReplayCheck::Replayed(ReplayForensics {
                    assertion_id: original.assertion_id,
                    subject: original.subject,
                    original_ip: original.ip,
                    original_user_agent: original.user_agent,
                    first_used_at: original.first_used_at,
                    original_correlation_id: original.correlation_id,
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::Severity;
    use crate::testing::{CollectingAuditSink, MockAccountFlagStore, MockAssertionStore};
    use std::sync::atomic::Ordering;
    use time::Duration;

    struct TestEnv {
        guard: ReplayGuard,
        assertions: Arc<MockAssertionStore>,
        flags: Arc<MockAccountFlagStore>,
        audit: Arc<CollectingAuditSink>,
    }

    fn test_env() -> TestEnv {
        let assertions = Arc::new(MockAssertionStore::default());
        let flags = Arc::new(MockAccountFlagStore::default());
        let audit = Arc::new(CollectingAuditSink::default());
        TestEnv {
            guard: ReplayGuard::new(assertions.clone(), flags.clone(), audit.clone()),
            assertions,
            flags,
            audit,
        }
    }

    fn request(assertion_id: &str, ip: &str) -> AssertionRequest {
        AssertionRequest {
            assertion_id: assertion_id.to_string(),
            correlation_id: "req-1".to_string(),
            subject: "user@idp.example.com".to_string(),
            ip: ip.to_string(),
            user_agent: Some("test-agent".to_string()),
            expires_at: OffsetDateTime::now_utc() + Duration::minutes(5),
        }
    }

    #[tokio::test]
    async fn test_first_use_is_safe() {
        let env = test_env();
        let verdict = env.guard.check_and_track(&request("A1", "203.0.113.7")).await.unwrap();
        assert_eq!(verdict, ReplayCheck::Safe);
        assert!(env.flags.flags.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_second_use_is_replay_with_forensics() {
        let env = test_env();
        env.guard
            .check_and_track(&request("A1", "203.0.113.7"))
            .await
            .unwrap();

        // Same assertion id from a different IP, moments later.
        let verdict = env
            .guard
            .check_and_track(&request("A1", "198.51.100.9"))
            .await
            .unwrap();

        let ReplayCheck::Replayed(forensics) = verdict else {
            panic!("expected replay verdict");
        };
        assert_eq!(forensics.assertion_id, "A1");
        assert_eq!(forensics.original_ip, "203.0.113.7");
        assert!(forensics.first_used_at <= OffsetDateTime::now_utc());

        // The subject's account is flagged.
        assert_eq!(
            env.flags
                .flags
                .lock()
                .unwrap()
                .get("user@idp.example.com")
                .map(String::as_str),
            Some("assertion replay")
        );

        // Critical event referencing both IPs.
        let events = env.audit.events.lock().unwrap();
        let replay = events
            .iter()
            .find(|e| matches!(e, SecurityEvent::AssertionReplayed { .. }))
            .expect("replay event emitted");
        assert_eq!(replay.severity(), Severity::Critical);
        if let SecurityEvent::AssertionReplayed {
            original_ip,
            replay_ip,
            ..
        } = replay
        {
            assert_eq!(original_ip, "203.0.113.7");
            assert_eq!(replay_ip, "198.51.100.9");
        }
    }

    #[tokio::test]
    async fn test_distinct_assertions_both_safe() {
        let env = test_env();
        assert_eq!(
            env.guard.check_and_track(&request("A1", "203.0.113.7")).await.unwrap(),
            ReplayCheck::Safe
        );
        assert_eq!(
            env.guard.check_and_track(&request("A2", "203.0.113.7")).await.unwrap(),
            ReplayCheck::Safe
        );
    }

    #[tokio::test]
    async fn test_concurrent_claims_exactly_one_safe() {
        let env = test_env();
        let guard = Arc::new(env.guard);

        let mut handles = Vec::new();
        for i in 0..8 {
            let guard = guard.clone();
            handles.push(tokio::spawn(async move {
                guard
                    .check_and_track(&request("A1", &format!("203.0.113.{i}")))
                    .await
                    .unwrap()
            }));
        }

        let mut safe = 0;
        let mut replayed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                ReplayCheck::Safe => safe += 1,
                ReplayCheck::Replayed(_) => replayed += 1,
            }
        }
        assert_eq!(safe, 1);
        assert_eq!(replayed, 7);
    }

    #[tokio::test]
    async fn test_storage_failure_fails_closed() {
        let env = test_env();
        env.assertions.fail.store(true, Ordering::SeqCst);

        let err = env
            .guard
            .check_and_track(&request("A1", "203.0.113.7"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Unavailable { .. }));

        // Nothing was recorded; the next attempt starts clean.
        env.assertions.fail.store(false, Ordering::SeqCst);
        assert!(env.assertions.markers.lock().unwrap().is_empty());
    }
}
