//! Suspicious-activity tracking and security reporting.
//!
//! The monitor keeps one sliding window of tracked activities per actor
//! key. Reaching the threshold raises a `SECURITY_ALERT` audit event, and
//! unlike the lockout counter the window is not reset: while the pruned
//! count stays at or above the threshold, every further activity keeps
//! alerting.

pub mod scheduler;

pub use scheduler::MonitorScheduler;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditEvent, AuditFilter, AuditTrail, EventKind};
use crate::config::SecurityConfig;
use crate::error::{Result, SecurityError};

#[derive(Debug, Clone)]
struct TrackedActivity {
    activity: String,
    at: DateTime<Utc>,
}

/// Aggregated counters of a security report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_requests: usize,
    pub auth_failures: usize,
    pub unauthorized_access: usize,
    pub errors: usize,
    pub security_alerts: usize,
}

/// One actor and its event volume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorCount {
    pub actor: String,
    pub count: usize,
}

/// Point-in-time aggregation of the audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityReport {
    pub timestamp: DateTime<Utc>,
    /// Human-readable window, e.g. "24 hours".
    pub period: String,
    pub summary: ReportSummary,
    pub top_actors: Vec<ActorCount>,
    pub suspicious_activities: Vec<AuditEvent>,
}

/// How many actors a report lists.
const TOP_ACTOR_LIMIT: usize = 10;

/// How many recent suspicious events a report carries.
const SUSPICIOUS_EVENT_LIMIT: usize = 10;

/// Sliding-window counters of suspicious events per actor, plus periodic
/// reporting over the audit trail.
pub struct SecurityMonitor {
    windows: Mutex<HashMap<String, Vec<TrackedActivity>>>,
    audit: Arc<AuditTrail>,
    threshold: usize,
    window: Duration,
}

impl SecurityMonitor {
    pub fn new(config: &SecurityConfig, audit: Arc<AuditTrail>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            audit,
            threshold: config.suspicious_threshold,
            window: config.tracking_window,
        }
    }

    fn lock_windows(&self) -> Result<MutexGuard<'_, HashMap<String, Vec<TrackedActivity>>>> {
        self.windows
            .lock()
            .map_err(|_| SecurityError::Storage("Activity tracker lock poisoned".to_string()))
    }

    /// Track a suspicious activity for an actor.
    ///
    /// Raises a `SECURITY_ALERT` audit event whenever the pruned count is
    /// at or above the threshold. The counter is deliberately not reset
    /// on alert, so a sustained burst keeps alerting.
    pub fn track(&self, actor_key: &str, activity: &str) -> Result<()> {
        self.track_at(actor_key, activity, Utc::now())
    }

    /// [`track`](Self::track) with an explicit clock.
    pub fn track_at(&self, actor_key: &str, activity: &str, now: DateTime<Utc>) -> Result<()> {
        let (count, distinct_activities) = {
            let mut windows = self.lock_windows()?;
            let entries = windows.entry(actor_key.to_string()).or_default();
            entries.push(TrackedActivity {
                activity: activity.to_string(),
                at: now,
            });
            let cutoff = now - self.window;
            entries.retain(|entry| entry.at > cutoff);

            let distinct = entries
                .iter()
                .map(|entry| entry.activity.as_str())
                .collect::<std::collections::HashSet<_>>()
                .len();
            (entries.len(), distinct)
        };

        if count >= self.threshold {
            tracing::warn!(
                target: "keepsake_core::monitor",
                actor = actor_key,
                count,
                "suspicious activity threshold reached"
            );
            self.audit.record(
                AuditEvent::at(EventKind::SecurityAlert, now)
                    .with_field("alert", "SUSPICIOUS_ACTIVITY")
                    .with_field("actor", actor_key)
                    .with_field("activity", activity)
                    .with_field("count", count)
                    .with_field("distinct_activities", distinct_activities)
                    .with_field("window_seconds", self.window.num_seconds())
                    .with_field("severity", "CRITICAL"),
            );
        }

        Ok(())
    }

    /// Drop all sliding-window state. Invoked by the periodic cleanup
    /// task to bound memory.
    pub fn clear_windows(&self) -> Result<()> {
        self.lock_windows()?.clear();
        Ok(())
    }

    /// Number of actors currently tracked.
    pub fn tracked_actors(&self) -> Result<usize> {
        Ok(self.lock_windows()?.len())
    }

    /// Aggregate the last 24 hours of audit events into a report.
    pub fn generate_report(&self) -> SecurityReport {
        self.generate_report_at(Utc::now(), Duration::hours(24))
    }

    /// [`generate_report`](Self::generate_report) with an explicit clock
    /// and window. Read-only: queries the audit trail, records nothing.
    pub fn generate_report_at(&self, now: DateTime<Utc>, window: Duration) -> SecurityReport {
        let events = self
            .audit
            .query(&AuditFilter::new().since(now - window).until(now));

        let count_kind = |kind: EventKind| events.iter().filter(|e| e.event == kind).count();

        let summary = ReportSummary {
            total_requests: count_kind(EventKind::Request),
            // LOGIN_FAILURE and AUTH_FAILURE are both authentication
            // failures; the report folds them together.
            auth_failures: count_kind(EventKind::AuthFailure)
                + count_kind(EventKind::LoginFailure),
            unauthorized_access: count_kind(EventKind::UnauthorizedAccess),
            errors: count_kind(EventKind::Error),
            security_alerts: count_kind(EventKind::SecurityAlert),
        };

        let mut volumes: HashMap<&str, usize> = HashMap::new();
        for event in &events {
            if let Some(actor) = event.ip.as_deref().or(event.user_id.as_deref()) {
                *volumes.entry(actor).or_insert(0) += 1;
            }
        }
        let mut top_actors: Vec<ActorCount> = volumes
            .into_iter()
            .map(|(actor, count)| ActorCount {
                actor: actor.to_string(),
                count,
            })
            .collect();
        top_actors.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.actor.cmp(&b.actor)));
        top_actors.truncate(TOP_ACTOR_LIMIT);

        // `events` is already most-recent-first.
        let suspicious_activities: Vec<AuditEvent> = events
            .iter()
            .filter(|e| e.event.is_suspicious())
            .take(SUSPICIOUS_EVENT_LIMIT)
            .cloned()
            .collect();

        SecurityReport {
            timestamp: now,
            period: format!("{} hours", window.num_hours()),
            summary,
            top_actors,
            suspicious_activities,
        }
    }

    /// Generate the daily report and record it on the audit trail.
    pub fn record_report(&self) {
        let report = self.generate_report();
        tracing::info!(
            target: "keepsake_core::monitor",
            requests = report.summary.total_requests,
            alerts = report.summary.security_alerts,
            "daily security report generated"
        );

        let mut event = AuditEvent::at(EventKind::SecurityReport, report.timestamp);
        match serde_json::to_value(&report) {
            Ok(value) => {
                event = event.with_field("report", value);
            }
            Err(err) => {
                event = event.with_field("error", err.to_string());
            }
        }
        self.audit.record(event);
    }
}
