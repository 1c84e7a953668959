//! Append-only audit trail.
//!
//! Every security-relevant occurrence lands here as one JSON line in the
//! audit log file. Recording never fails visibly: a durable-write failure
//! degrades observability, not availability, so the event is parked in an
//! in-memory fallback buffer (still visible to queries) together with a
//! synthesized `PERSISTENCE_ERROR` event, and the caller proceeds.
//!
//! Appends are atomic per entry: the file handle lives behind a mutex and
//! a whole line is written and flushed while it is held, so concurrent
//! writers never interleave bytes of two events. Total ordering is by
//! append order, not event timestamp.

mod event;

pub use event::{AuditEvent, AuditFilter, EventKind};

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

/// Append-only structured event sink with filtered retrieval.
pub struct AuditTrail {
    path: PathBuf,
    /// Lazily opened append handle; `None` until first write or after a
    /// write failure (the next record retries the open).
    writer: Mutex<Option<BufWriter<File>>>,
    /// Events that could not be written durably.
    fallback: Mutex<Vec<AuditEvent>>,
}

impl AuditTrail {
    /// Create a trail appending to the given file path.
    ///
    /// The file and its parent directory are created on first write, not
    /// here, so construction itself cannot fail.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(None),
            fallback: Mutex::new(Vec::new()),
        }
    }

    /// Path of the backing log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an event.
    ///
    /// Never returns an error. The entry is mirrored to the structured
    /// logger, appended to the log file, and kept in memory instead if
    /// the durable write fails.
    pub fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "keepsake_core::audit",
            event = %event.event,
            user_id = event.user_id.as_deref(),
            ip = event.ip.as_deref(),
            "audit"
        );

        let line = match serde_json::to_string(&event) {
            Ok(line) => line,
            Err(err) => {
                // A Map/DateTime payload cannot fail to serialize; keep
                // the event anyway if it somehow does.
                tracing::error!(target: "keepsake_core::audit", error = %err, "audit serialization failed");
                self.park(event, err.to_string());
                return;
            }
        };

        // A poisoned lock still holds a usable handle.
        let mut writer = self
            .writer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if writer.is_none() {
            match self.open_writer() {
                Ok(handle) => *writer = Some(handle),
                Err(err) => {
                    drop(writer);
                    tracing::error!(target: "keepsake_core::audit", error = %err, "audit log open failed");
                    self.park(event, err.to_string());
                    return;
                }
            }
        }

        let result = writer
            .as_mut()
            .map(|w| writeln!(w, "{}", line).and_then(|_| w.flush()))
            .unwrap_or(Ok(()));

        if let Err(err) = result {
            // Drop the broken handle; the next record retries the open.
            *writer = None;
            drop(writer);
            tracing::error!(target: "keepsake_core::audit", error = %err, "audit log write failed");
            self.park(event, err.to_string());
        }
    }

    /// Query recorded events, most recent first.
    ///
    /// Performs a full scan of the backing file plus the fallback buffer.
    /// Lines that do not parse (e.g. torn by a crashed writer) are
    /// skipped rather than poisoning the scan.
    pub fn query(&self, filter: &AuditFilter) -> Vec<AuditEvent> {
        let mut events: Vec<AuditEvent> = match std::fs::read_to_string(&self.path) {
            Ok(content) => content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect(),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => {
                tracing::error!(target: "keepsake_core::audit", error = %err, "audit log read failed");
                Vec::new()
            }
        };

        {
            let fallback = self
                .fallback
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            events.extend(fallback.iter().cloned());
        }

        events.retain(|event| filter.matches(event));
        events.reverse();
        events
    }

    /// Number of events parked in the in-memory fallback buffer.
    pub fn fallback_len(&self) -> usize {
        self.fallback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn open_writer(&self) -> std::io::Result<BufWriter<File>> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)?;
        Ok(BufWriter::new(file))
    }

    /// Keep an event in memory after a durable-write failure, along with
    /// a `PERSISTENCE_ERROR` marker describing the failure.
    fn park(&self, event: AuditEvent, error: String) {
        let mut fallback: MutexGuard<'_, Vec<AuditEvent>> = self
            .fallback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        fallback.push(event);
        fallback.push(
            AuditEvent::new(EventKind::PersistenceError).with_field("error", error),
        );
    }
}
