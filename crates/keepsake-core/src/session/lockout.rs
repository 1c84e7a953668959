//! Failed-login tracking and account lockout.
//!
//! One sliding window of attempt timestamps per actor key. Entries older
//! than the tracking window are pruned on every access; once the pruned
//! count reaches the threshold the key is locked for the configured
//! duration and authentication is refused outright, regardless of
//! credential correctness.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use crate::error::{Result, SecurityError};

#[derive(Debug, Default)]
struct AttemptWindow {
    timestamps: Vec<DateTime<Utc>>,
    locked_until: Option<DateTime<Utc>>,
}

/// Outcome of registering a failed attempt.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FailureOutcome {
    /// Attempts remaining in the window, including this one.
    pub attempts: usize,
    /// Set when this failure engaged the lock.
    pub locked_until: Option<DateTime<Utc>>,
}

/// Per-actor failed-attempt counters with lockout state.
///
/// All read-modify-write happens under one mutex so concurrent failures
/// are never under-counted.
pub(crate) struct LockoutTracker {
    entries: Mutex<HashMap<String, AttemptWindow>>,
    threshold: usize,
    window: Duration,
    duration: Duration,
}

impl LockoutTracker {
    pub fn new(threshold: usize, window: Duration, duration: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            threshold,
            window,
            duration,
        }
    }

    fn lock_entries(&self) -> Result<MutexGuard<'_, HashMap<String, AttemptWindow>>> {
        self.entries
            .lock()
            .map_err(|_| SecurityError::Storage("Lockout tracker lock poisoned".to_string()))
    }

    /// Active lock expiry for the key, if any.
    pub fn locked_until(&self, key: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>> {
        let mut entries = self.lock_entries()?;
        let Some(window) = entries.get_mut(key) else {
            return Ok(None);
        };

        match window.locked_until {
            Some(until) if now < until => Ok(Some(until)),
            Some(_) => {
                // Lock elapsed; forget it so a later single failure does
                // not resurrect it.
                window.locked_until = None;
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Record a failed attempt and evaluate the lockout threshold.
    pub fn register_failure(&self, key: &str, now: DateTime<Utc>) -> Result<FailureOutcome> {
        let mut entries = self.lock_entries()?;
        let window = entries.entry(key.to_string()).or_default();

        window.timestamps.push(now);
        let cutoff = now - self.window;
        window.timestamps.retain(|t| *t > cutoff);

        let attempts = window.timestamps.len();
        if attempts >= self.threshold && window.locked_until.is_none() {
            let until = now + self.duration;
            window.locked_until = Some(until);
            return Ok(FailureOutcome {
                attempts,
                locked_until: Some(until),
            });
        }

        Ok(FailureOutcome {
            attempts,
            locked_until: None,
        })
    }

    /// Clear all state for a key (successful authentication).
    pub fn clear(&self, key: &str) -> Result<()> {
        self.lock_entries()?.remove(key);
        Ok(())
    }

    /// Drop idle entries: no attempts left in the window and no active
    /// lock. Returns how many were removed.
    pub fn prune_idle(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.lock_entries()?;
        let cutoff = now - self.window;
        let before = entries.len();
        entries.retain(|_, window| {
            window.timestamps.retain(|t| *t > cutoff);
            let locked = matches!(window.locked_until, Some(until) if now < until);
            locked || !window.timestamps.is_empty()
        });
        Ok(before - entries.len())
    }

    #[cfg(test)]
    pub fn tracked_keys(&self) -> usize {
        self.entries.lock().unwrap().len()
    }
}
