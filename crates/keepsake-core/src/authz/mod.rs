//! Resource-ownership enforcement.
//!
//! Layered on the identity produced by session validation: admins get
//! blanket access for operational reasons (including read access to
//! every user's data), everyone else must own the resource. Ownership
//! itself lives with a collaborator; this module only decides and
//! audits.

use std::sync::Arc;

use crate::audit::{AuditEvent, AuditTrail, EventKind};
use crate::error::{Result, SecurityError};
use crate::session::Identity;

/// Resource-ownership lookup collaborator.
pub trait OwnershipStore: Send + Sync {
    /// Owner id of the resource, or `None` if the resource does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Implementations may fail (backing store unavailable); the guard
    /// treats any failure as a denial.
    fn owner_of(&self, resource_id: &str, resource_kind: &str) -> Result<Option<String>>;
}

/// Why an access was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// The resource exists but belongs to someone else.
    NotOwner,
    /// No such resource.
    ResourceNotFound,
    /// The ownership lookup itself failed.
    LookupFailed,
}

impl DenyReason {
    fn as_str(self) -> &'static str {
        match self {
            DenyReason::NotOwner => "Resource not owned by user",
            DenyReason::ResourceNotFound => "Resource not found",
            DenyReason::LookupFailed => "Ownership lookup failed",
        }
    }
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Enforces per-resource ownership and audits every denial.
pub struct AuthorizationGuard {
    ownership: Arc<dyn OwnershipStore>,
    audit: Arc<AuditTrail>,
}

impl AuthorizationGuard {
    pub fn new(ownership: Arc<dyn OwnershipStore>, audit: Arc<AuditTrail>) -> Self {
        Self { ownership, audit }
    }

    /// Decide whether `identity` may access the resource.
    ///
    /// Infallible by construction: a failing ownership lookup is a
    /// denial, not an error. Every denial emits exactly one
    /// `UNAUTHORIZED_ACCESS` audit event; allows are not separately
    /// audited.
    pub fn authorize(
        &self,
        identity: &Identity,
        resource_id: &str,
        resource_kind: &str,
    ) -> Decision {
        if identity.role.is_admin() {
            return Decision::Allow;
        }

        let reason = match self.ownership.owner_of(resource_id, resource_kind) {
            Ok(Some(owner)) if owner == identity.id => return Decision::Allow,
            Ok(Some(_)) => DenyReason::NotOwner,
            Ok(None) => DenyReason::ResourceNotFound,
            Err(err) => {
                tracing::error!(
                    target: "keepsake_core::authz",
                    error = %err,
                    resource_id,
                    "ownership lookup failed"
                );
                DenyReason::LookupFailed
            }
        };

        self.audit.record(
            AuditEvent::new(EventKind::UnauthorizedAccess)
                .with_user(&identity.id)
                .with_field("resource_id", resource_id)
                .with_field("resource_kind", resource_kind)
                .with_field("reason", reason.as_str()),
        );

        Decision::Deny(reason)
    }

    /// [`authorize`](Self::authorize) as a guard clause.
    ///
    /// # Errors
    ///
    /// Returns `SecurityError::Unauthorized` on any denial; the denial
    /// reason stays in the audit trail.
    pub fn require(
        &self,
        identity: &Identity,
        resource_id: &str,
        resource_kind: &str,
    ) -> Result<()> {
        match self.authorize(identity, resource_id, resource_kind) {
            Decision::Allow => Ok(()),
            Decision::Deny(_) => Err(SecurityError::Unauthorized),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use crate::session::Role;
    use std::collections::HashMap;
    use tempfile::tempdir;

    struct MapOwnership {
        owners: HashMap<(String, String), String>,
        fail: bool,
    }

    impl MapOwnership {
        fn new(entries: &[(&str, &str, &str)]) -> Self {
            Self {
                owners: entries
                    .iter()
                    .map(|(id, kind, owner)| {
                        ((id.to_string(), kind.to_string()), owner.to_string())
                    })
                    .collect(),
                fail: false,
            }
        }
    }

    impl OwnershipStore for MapOwnership {
        fn owner_of(&self, resource_id: &str, resource_kind: &str) -> Result<Option<String>> {
            if self.fail {
                return Err(SecurityError::Storage("ownership backend down".to_string()));
            }
            Ok(self
                .owners
                .get(&(resource_id.to_string(), resource_kind.to_string()))
                .cloned())
        }
    }

    fn user(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            role: Role::User,
        }
    }

    fn admin(id: &str) -> Identity {
        Identity {
            id: id.to_string(),
            role: Role::Admin,
        }
    }

    fn guard_with(
        dir: &tempfile::TempDir,
        ownership: MapOwnership,
    ) -> (AuthorizationGuard, Arc<AuditTrail>) {
        let audit = Arc::new(AuditTrail::new(dir.path().join("audit.log")));
        (
            AuthorizationGuard::new(Arc::new(ownership), audit.clone()),
            audit,
        )
    }

    fn denial_events(audit: &AuditTrail) -> Vec<AuditEvent> {
        audit.query(&AuditFilter::new().with_event(EventKind::UnauthorizedAccess))
    }

    #[test]
    fn test_owner_is_allowed_without_audit() {
        let dir = tempdir().unwrap();
        let (guard, audit) =
            guard_with(&dir, MapOwnership::new(&[("entry-1", "journal", "u1")]));

        let decision = guard.authorize(&user("u1"), "entry-1", "journal");
        assert!(decision.is_allowed());
        assert!(denial_events(&audit).is_empty());
    }

    #[test]
    fn test_non_owner_is_denied_with_one_event() {
        let dir = tempdir().unwrap();
        let (guard, audit) =
            guard_with(&dir, MapOwnership::new(&[("entry-1", "journal", "u2")]));

        let decision = guard.authorize(&user("u1"), "entry-1", "journal");
        assert_eq!(decision, Decision::Deny(DenyReason::NotOwner));

        let denials = denial_events(&audit);
        assert_eq!(denials.len(), 1);
        assert_eq!(denials[0].user_id.as_deref(), Some("u1"));
        assert_eq!(denials[0].fields["resource_id"], "entry-1");
        assert_eq!(denials[0].fields["resource_kind"], "journal");
    }

    #[test]
    fn test_admin_bypasses_ownership() {
        let dir = tempdir().unwrap();
        let (guard, audit) =
            guard_with(&dir, MapOwnership::new(&[("entry-1", "journal", "u2")]));

        let decision = guard.authorize(&admin("ops-1"), "entry-1", "journal");
        assert!(decision.is_allowed());
        assert!(denial_events(&audit).is_empty());
    }

    #[test]
    fn test_missing_resource_is_denied() {
        let dir = tempdir().unwrap();
        let (guard, _) = guard_with(&dir, MapOwnership::new(&[]));

        let decision = guard.authorize(&user("u1"), "entry-404", "journal");
        assert_eq!(decision, Decision::Deny(DenyReason::ResourceNotFound));
    }

    #[test]
    fn test_lookup_failure_is_denied() {
        let dir = tempdir().unwrap();
        let mut ownership = MapOwnership::new(&[("entry-1", "journal", "u1")]);
        ownership.fail = true;
        let (guard, audit) = guard_with(&dir, ownership);

        // Even the actual owner is denied while the lookup is down.
        let decision = guard.authorize(&user("u1"), "entry-1", "journal");
        assert_eq!(decision, Decision::Deny(DenyReason::LookupFailed));
        assert_eq!(denial_events(&audit).len(), 1);
    }

    #[test]
    fn test_require_maps_denial_to_error() {
        let dir = tempdir().unwrap();
        let (guard, _) =
            guard_with(&dir, MapOwnership::new(&[("entry-1", "journal", "u2")]));

        assert!(guard.require(&user("u2"), "entry-1", "journal").is_ok());
        // Wrong kind: the (id, kind) pair must match.
        assert!(guard
            .require(&user("u2"), "entry-1", "achievement")
            .is_err());
        assert!(matches!(
            guard.require(&user("u1"), "entry-1", "journal"),
            Err(SecurityError::Unauthorized)
        ));
    }
}
