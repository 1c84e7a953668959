//! Audit event model.
//!
//! Events are immutable once recorded. On the wire each event is one JSON
//! object with at minimum `timestamp` (ISO-8601) and `event` (string);
//! any other fields are event-specific and consumers must tolerate ones
//! they do not know.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of a security-relevant occurrence.
///
/// Serialized as its SCREAMING_SNAKE_CASE name. Kinds recorded by
/// collaborators that this crate does not emit itself round-trip through
/// [`EventKind::Other`] and still filter exactly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    AuthSuccess,
    AuthFailure,
    LoginSuccess,
    LoginFailure,
    Logout,
    UnauthorizedAccess,
    SecurityAlert,
    SecurityReport,
    PersistenceError,
    Request,
    Response,
    Error,
    #[serde(untagged)]
    Other(String),
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::AuthSuccess => "AUTH_SUCCESS",
            EventKind::AuthFailure => "AUTH_FAILURE",
            EventKind::LoginSuccess => "LOGIN_SUCCESS",
            EventKind::LoginFailure => "LOGIN_FAILURE",
            EventKind::Logout => "LOGOUT",
            EventKind::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            EventKind::SecurityAlert => "SECURITY_ALERT",
            EventKind::SecurityReport => "SECURITY_REPORT",
            EventKind::PersistenceError => "PERSISTENCE_ERROR",
            EventKind::Request => "REQUEST",
            EventKind::Response => "RESPONSE",
            EventKind::Error => "ERROR",
            EventKind::Other(name) => name,
        }
    }

    /// Kinds that feed the suspicious-activity view of a report.
    pub fn is_suspicious(&self) -> bool {
        matches!(
            self,
            EventKind::AuthFailure
                | EventKind::LoginFailure
                | EventKind::UnauthorizedAccess
                | EventKind::SecurityAlert
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable audit record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (informational; ordering is by append).
    pub timestamp: DateTime<Utc>,

    /// What happened.
    pub event: EventKind,

    /// Acting identity, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub user_id: Option<String>,

    /// Origin address or actor key, when known.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ip: Option<String>,

    /// Event-specific fields. Unknown keys survive a round trip.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, Value>,
}

impl AuditEvent {
    pub fn new(event: EventKind) -> Self {
        Self::at(event, Utc::now())
    }

    pub fn at(event: EventKind, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            event,
            user_id: None,
            ip: None,
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}

/// Filter for querying audit events.
///
/// All criteria are optional and conjunctive; the timestamp range is
/// inclusive at both ends.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub event: Option<EventKind>,
    pub user_id: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event: EventKind) -> Self {
        self.event = Some(event);
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn since(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn until(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub(crate) fn matches(&self, event: &AuditEvent) -> bool {
        if let Some(kind) = &self.event {
            if &event.event != kind {
                return false;
            }
        }
        if let Some(user_id) = &self.user_id {
            if event.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if event.timestamp < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if event.timestamp > to {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_kind_wire_names() {
        let json = serde_json::to_string(&EventKind::UnauthorizedAccess).unwrap();
        assert_eq!(json, "\"UNAUTHORIZED_ACCESS\"");

        let parsed: EventKind = serde_json::from_str("\"LOGIN_FAILURE\"").unwrap();
        assert_eq!(parsed, EventKind::LoginFailure);
    }

    #[test]
    fn test_unknown_event_kind_round_trips() {
        let parsed: EventKind = serde_json::from_str("\"BACKUP_CREATED\"").unwrap();
        assert_eq!(parsed, EventKind::Other("BACKUP_CREATED".to_string()));
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            "\"BACKUP_CREATED\""
        );
    }

    #[test]
    fn test_event_serialization_shape() {
        let event = AuditEvent::new(EventKind::LoginSuccess)
            .with_user("u1")
            .with_ip("10.0.0.1")
            .with_field("method", "POST");

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "LOGIN_SUCCESS");
        assert_eq!(value["user_id"], "u1");
        assert_eq!(value["ip"], "10.0.0.1");
        assert_eq!(value["method"], "POST");
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let line = r#"{"timestamp":"2026-01-02T03:04:05Z","event":"REQUEST","url":"/journal/1","durationMs":12}"#;
        let event: AuditEvent = serde_json::from_str(line).unwrap();

        assert_eq!(event.event, EventKind::Request);
        assert_eq!(event.fields["url"], "/journal/1");

        let reserialized = serde_json::to_value(&event).unwrap();
        assert_eq!(reserialized["durationMs"], 12);
    }

    #[test]
    fn test_filter_matching() {
        let t0 = Utc::now();
        let event = AuditEvent::at(EventKind::AuthFailure, t0).with_user("u1");

        assert!(AuditFilter::new().matches(&event));
        assert!(AuditFilter::new()
            .with_event(EventKind::AuthFailure)
            .matches(&event));
        assert!(!AuditFilter::new()
            .with_event(EventKind::Logout)
            .matches(&event));
        assert!(AuditFilter::new().with_user("u1").matches(&event));
        assert!(!AuditFilter::new().with_user("u2").matches(&event));

        // Range is inclusive on both ends.
        assert!(AuditFilter::new().since(t0).until(t0).matches(&event));
        assert!(!AuditFilter::new()
            .since(t0 + chrono::Duration::seconds(1))
            .matches(&event));
    }
}
