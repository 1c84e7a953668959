//! Session issuance, validation, and revocation.
//!
//! A session is minted on successful authentication and dies by explicit
//! revocation or by absolute expiry, fixed at login
//! (`expires_at = issued_at + session_timeout`). There is no sliding idle
//! timeout and no anonymous-session object: absence of a valid token
//! simply yields no identity.
//!
//! Lockout is enforced before credentials are checked: a locked actor is
//! refused outright, so no work is spent on (and no oracle exposed for)
//! credential correctness while the lock holds.

mod lockout;
pub mod token;

pub use token::{is_valid_token_format, TOKEN_LENGTH};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEvent, AuditTrail, EventKind};
use crate::config::SecurityConfig;
use crate::error::{Result, SecurityError};
use lockout::LockoutTracker;

/// Role attached to an authenticated identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// An authenticated identity, as resolved from a valid session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    pub role: Role,
}

/// A live session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque bearer token, 64 lowercase hex characters.
    pub token: String,
    pub user_id: String,
    pub role: Role,
    pub issued_at: DateTime<Utc>,
    /// `issued_at + session_timeout`, fixed at login.
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn identity(&self) -> Identity {
        Identity {
            id: self.user_id.clone(),
            role: self.role,
        }
    }
}

/// Credential validation collaborator.
///
/// Implementations must not leak which part of the credential pair was
/// wrong through the error variant; the distinction belongs in their own
/// records, not on the wire.
pub trait IdentityStore: Send + Sync {
    /// Verify a credential pair, returning the authenticated identity.
    ///
    /// # Errors
    ///
    /// Returns `SecurityError::InvalidCredentials` for an unknown
    /// identifier or a wrong secret.
    fn verify_credentials(&self, identifier: &str, secret: &str) -> Result<Identity>;
}

/// Issues, validates, and expires session tokens; tracks failed logins
/// and account lockout.
pub struct SessionAuthority {
    sessions: Mutex<HashMap<String, SessionRecord>>,
    lockouts: LockoutTracker,
    identities: Arc<dyn IdentityStore>,
    audit: Arc<AuditTrail>,
    session_timeout: Duration,
    tracking_window: Duration,
}

impl SessionAuthority {
    pub fn new(
        config: &SecurityConfig,
        identities: Arc<dyn IdentityStore>,
        audit: Arc<AuditTrail>,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            lockouts: LockoutTracker::new(
                config.lockout_threshold,
                config.tracking_window,
                config.lockout_duration,
            ),
            identities,
            audit,
            session_timeout: config.session_timeout,
            tracking_window: config.tracking_window,
        }
    }

    fn lock_sessions(&self) -> Result<MutexGuard<'_, HashMap<String, SessionRecord>>> {
        self.sessions
            .lock()
            .map_err(|_| SecurityError::Storage("Session store lock poisoned".to_string()))
    }

    /// Authenticate a credential pair from the given origin.
    ///
    /// # Errors
    ///
    /// - `SecurityError::AccountLocked` while the origin key is locked
    ///   out (credentials are not checked at all)
    /// - `SecurityError::InvalidCredentials` on any credential failure
    pub fn authenticate(
        &self,
        identifier: &str,
        secret: &str,
        origin_key: &str,
    ) -> Result<SessionRecord> {
        self.authenticate_at(identifier, secret, origin_key, Utc::now())
    }

    /// [`authenticate`](Self::authenticate) with an explicit clock.
    pub fn authenticate_at(
        &self,
        identifier: &str,
        secret: &str,
        origin_key: &str,
        now: DateTime<Utc>,
    ) -> Result<SessionRecord> {
        if let Some(until) = self.lockouts.locked_until(origin_key, now)? {
            self.audit.record(
                AuditEvent::at(EventKind::LoginFailure, now)
                    .with_ip(origin_key)
                    .with_field("identifier", identifier)
                    .with_field("reason", "Account locked")
                    .with_field("locked_until", until.to_rfc3339()),
            );
            return Err(SecurityError::AccountLocked);
        }

        match self.identities.verify_credentials(identifier, secret) {
            Ok(identity) => {
                self.lockouts.clear(origin_key)?;

                let token = token::mint_token()?;
                let record = SessionRecord {
                    token: token.clone(),
                    user_id: identity.id.clone(),
                    role: identity.role,
                    issued_at: now,
                    expires_at: now + self.session_timeout,
                };
                self.lock_sessions()?.insert(token, record.clone());

                self.audit.record(
                    AuditEvent::at(EventKind::LoginSuccess, now)
                        .with_user(&identity.id)
                        .with_ip(origin_key),
                );

                Ok(record)
            }
            Err(err) => {
                let outcome = self.lockouts.register_failure(origin_key, now)?;

                self.audit.record(
                    AuditEvent::at(EventKind::LoginFailure, now)
                        .with_ip(origin_key)
                        .with_field("identifier", identifier)
                        .with_field("reason", err.to_string())
                        .with_field("attempts", outcome.attempts),
                );

                if let Some(until) = outcome.locked_until {
                    tracing::error!(
                        target: "keepsake_core::session",
                        actor = origin_key,
                        attempts = outcome.attempts,
                        "account locked after repeated failed logins"
                    );
                    self.audit.record(
                        AuditEvent::at(EventKind::SecurityAlert, now)
                            .with_field("alert", "MULTIPLE_FAILED_LOGINS")
                            .with_field("actor", origin_key)
                            .with_field("count", outcome.attempts)
                            .with_field("window_seconds", self.tracking_window.num_seconds())
                            .with_field("locked_until", until.to_rfc3339())
                            .with_field("severity", "CRITICAL"),
                    );
                }

                // The caller sees the same error for every credential
                // failure; the lock (if any) bites on the next attempt.
                Err(SecurityError::InvalidCredentials)
            }
        }
    }

    /// Resolve a bearer token to its identity.
    ///
    /// # Errors
    ///
    /// - `SecurityError::SessionNotFound` for malformed tokens (rejected
    ///   without a lookup) and unknown tokens
    /// - `SecurityError::SessionExpired` when the record existed but its
    ///   expiry has passed; the record is deleted on the spot
    pub fn validate(&self, token: &str) -> Result<Identity> {
        self.validate_at(token, Utc::now())
    }

    /// [`validate`](Self::validate) with an explicit clock.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity> {
        if !token::is_valid_token_format(token) {
            return Err(SecurityError::SessionNotFound);
        }

        enum Outcome {
            Valid(Identity),
            Expired(String),
            Missing,
        }

        let outcome = {
            let mut sessions = self.lock_sessions()?;
            match sessions.get(token) {
                None => Outcome::Missing,
                Some(record) if now >= record.expires_at => {
                    let user_id = record.user_id.clone();
                    sessions.remove(token);
                    Outcome::Expired(user_id)
                }
                Some(record) => Outcome::Valid(record.identity()),
            }
        };

        match outcome {
            Outcome::Valid(identity) => {
                self.audit.record(
                    AuditEvent::at(EventKind::AuthSuccess, now).with_user(&identity.id),
                );
                Ok(identity)
            }
            Outcome::Expired(user_id) => {
                self.audit.record(
                    AuditEvent::at(EventKind::AuthFailure, now)
                        .with_user(user_id)
                        .with_field("reason", "Session expired"),
                );
                Err(SecurityError::SessionExpired)
            }
            Outcome::Missing => {
                self.audit.record(
                    AuditEvent::at(EventKind::AuthFailure, now)
                        .with_field("reason", "Session not found"),
                );
                Err(SecurityError::SessionNotFound)
            }
        }
    }

    /// Revoke a session. Idempotent: revoking an unknown or already-gone
    /// token still records the logout intent.
    pub fn revoke(&self, token: &str) -> Result<()> {
        self.revoke_at(token, Utc::now())
    }

    /// [`revoke`](Self::revoke) with an explicit clock.
    pub fn revoke_at(&self, token: &str, now: DateTime<Utc>) -> Result<()> {
        let removed = self.lock_sessions()?.remove(token);

        let mut event = AuditEvent::at(EventKind::Logout, now)
            .with_field("known_session", removed.is_some());
        if let Some(record) = removed {
            event = event.with_user(record.user_id);
        }
        self.audit.record(event);

        Ok(())
    }

    /// Number of live (possibly expired-but-unreaped) sessions.
    pub fn session_count(&self) -> Result<usize> {
        Ok(self.lock_sessions()?.len())
    }

    /// Drop idle lockout counters. Called by the periodic cleanup task;
    /// active locks are preserved.
    pub fn prune_lockouts(&self) -> Result<usize> {
        self.prune_lockouts_at(Utc::now())
    }

    /// [`prune_lockouts`](Self::prune_lockouts) with an explicit clock.
    pub fn prune_lockouts_at(&self, now: DateTime<Utc>) -> Result<usize> {
        self.lockouts.prune_idle(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    struct FixedIdentityStore;

    impl IdentityStore for FixedIdentityStore {
        fn verify_credentials(&self, identifier: &str, secret: &str) -> Result<Identity> {
            match (identifier, secret) {
                ("alice@example.com", "correct horse battery") => Ok(Identity {
                    id: "user-alice".to_string(),
                    role: Role::User,
                }),
                ("root@example.com", "admin-secret-123") => Ok(Identity {
                    id: "user-root".to_string(),
                    role: Role::Admin,
                }),
                _ => Err(SecurityError::InvalidCredentials),
            }
        }
    }

    fn authority(dir: &tempfile::TempDir) -> (SessionAuthority, Arc<AuditTrail>) {
        let config = SecurityConfig::new(secrecy::SecretString::from(
            "test-master-secret".to_string(),
        ))
        .unwrap();
        let audit = Arc::new(AuditTrail::new(dir.path().join("audit.log")));
        let authority =
            SessionAuthority::new(&config, Arc::new(FixedIdentityStore), audit.clone());
        (authority, audit)
    }

    #[test]
    fn test_authenticate_success_mints_session() {
        let dir = tempdir().unwrap();
        let (authority, audit) = authority(&dir);
        let now = Utc::now();

        let record = authority
            .authenticate_at("alice@example.com", "correct horse battery", "ip:alice", now)
            .unwrap();

        assert!(is_valid_token_format(&record.token));
        assert_eq!(record.user_id, "user-alice");
        assert_eq!(record.expires_at, now + Duration::minutes(30));

        let events = audit.query(
            &crate::audit::AuditFilter::new().with_event(EventKind::LoginSuccess),
        );
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].user_id.as_deref(), Some("user-alice"));
    }

    #[test]
    fn test_authenticate_failure_is_generic() {
        let dir = tempdir().unwrap();
        let (authority, _) = authority(&dir);

        let unknown = authority.authenticate("nobody@example.com", "whatever", "ip:x");
        let wrong = authority.authenticate("alice@example.com", "wrong", "ip:x");

        assert!(matches!(unknown, Err(SecurityError::InvalidCredentials)));
        assert!(matches!(wrong, Err(SecurityError::InvalidCredentials)));
    }

    #[test]
    fn test_lockout_trigger_and_alert() {
        let dir = tempdir().unwrap();
        let (authority, audit) = authority(&dir);
        let now = Utc::now();

        for _ in 0..5 {
            let result =
                authority.authenticate_at("alice@example.com", "wrong", "ip:alice", now);
            assert!(matches!(result, Err(SecurityError::InvalidCredentials)));
        }

        // Correct credentials are refused while locked.
        let locked = authority.authenticate_at(
            "alice@example.com",
            "correct horse battery",
            "ip:alice",
            now + Duration::minutes(1),
        );
        assert!(matches!(locked, Err(SecurityError::AccountLocked)));

        let alerts = audit.query(
            &crate::audit::AuditFilter::new().with_event(EventKind::SecurityAlert),
        );
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].fields["alert"], "MULTIPLE_FAILED_LOGINS");
        assert_eq!(alerts[0].fields["actor"], "ip:alice");
    }

    #[test]
    fn test_lockout_release_clears_counter() {
        let dir = tempdir().unwrap();
        let (authority, _) = authority(&dir);
        let now = Utc::now();

        for _ in 0..5 {
            let _ = authority.authenticate_at("alice@example.com", "wrong", "ip:alice", now);
        }

        // After the lockout duration has passed, correct credentials work.
        let later = now + Duration::minutes(16);
        let record = authority
            .authenticate_at("alice@example.com", "correct horse battery", "ip:alice", later)
            .unwrap();
        assert_eq!(record.user_id, "user-alice");

        // The counter was cleared: one fresh failure does not re-lock.
        let _ = authority.authenticate_at("alice@example.com", "wrong", "ip:alice", later);
        let still_open = authority.authenticate_at(
            "alice@example.com",
            "correct horse battery",
            "ip:alice",
            later,
        );
        assert!(still_open.is_ok());
    }

    #[test]
    fn test_lockouts_are_per_origin() {
        let dir = tempdir().unwrap();
        let (authority, _) = authority(&dir);
        let now = Utc::now();

        for _ in 0..5 {
            let _ = authority.authenticate_at("alice@example.com", "wrong", "ip:one", now);
        }

        // A different origin for the same account is unaffected.
        let other = authority.authenticate_at(
            "alice@example.com",
            "correct horse battery",
            "ip:two",
            now,
        );
        assert!(other.is_ok());
    }

    #[test]
    fn test_validate_lifecycle() {
        let dir = tempdir().unwrap();
        let (authority, _) = authority(&dir);
        let now = Utc::now();

        let record = authority
            .authenticate_at("alice@example.com", "correct horse battery", "ip:alice", now)
            .unwrap();

        let just_before = now + Duration::minutes(29) + Duration::seconds(59);
        let identity = authority.validate_at(&record.token, just_before).unwrap();
        assert_eq!(identity.id, "user-alice");
        assert_eq!(identity.role, Role::User);

        let just_after = now + Duration::minutes(30) + Duration::seconds(1);
        assert!(matches!(
            authority.validate_at(&record.token, just_after),
            Err(SecurityError::SessionExpired)
        ));

        // Lazy deletion: the record is gone now.
        assert!(matches!(
            authority.validate_at(&record.token, just_after),
            Err(SecurityError::SessionNotFound)
        ));
        assert_eq!(authority.session_count().unwrap(), 0);
    }

    #[test]
    fn test_validate_rejects_malformed_tokens_without_lookup() {
        let dir = tempdir().unwrap();
        let (authority, _) = authority(&dir);

        for bad in ["", "short", &"Z".repeat(64), &"a".repeat(63)] {
            assert!(matches!(
                authority.validate(bad),
                Err(SecurityError::SessionNotFound)
            ));
        }
    }

    #[test]
    fn test_revoke_is_idempotent_and_always_audited() {
        let dir = tempdir().unwrap();
        let (authority, audit) = authority(&dir);

        let record = authority
            .authenticate("alice@example.com", "correct horse battery", "ip:alice")
            .unwrap();

        authority.revoke(&record.token).unwrap();
        assert!(matches!(
            authority.validate(&record.token),
            Err(SecurityError::SessionNotFound)
        ));

        // Second revoke of the same token, and a revoke of a token that
        // never existed, both still record the intent.
        authority.revoke(&record.token).unwrap();
        authority.revoke(&"0".repeat(64)).unwrap();

        let logouts =
            audit.query(&crate::audit::AuditFilter::new().with_event(EventKind::Logout));
        assert_eq!(logouts.len(), 3);
    }

    #[test]
    fn test_admin_role_flows_through() {
        let dir = tempdir().unwrap();
        let (authority, _) = authority(&dir);

        let record = authority
            .authenticate("root@example.com", "admin-secret-123", "ip:root")
            .unwrap();
        let identity = authority.validate(&record.token).unwrap();
        assert!(identity.role.is_admin());
    }
}
