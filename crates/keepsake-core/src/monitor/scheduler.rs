//! Periodic reporting and cleanup.
//!
//! The original deployment drove these from cron-style timers; here they
//! run on one background thread started at process init and stopped at
//! shutdown. The thread coordinates with request handlers through the
//! same mutexes as every other caller, so cleanup never races a
//! concurrent `track` or lockout mutation.

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::monitor::SecurityMonitor;
use crate::session::SessionAuthority;

/// Daily security report interval.
const REPORT_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Hourly tracking-data cleanup interval.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Handle to the background reporting/cleanup thread.
///
/// Dropping the handle signals shutdown; [`stop`](Self::stop) also joins
/// the thread so callers can wait for a clean exit.
pub struct MonitorScheduler {
    shutdown: mpsc::Sender<()>,
    handle: Option<JoinHandle<()>>,
}

impl MonitorScheduler {
    /// Start the scheduler with production intervals: a report once per
    /// day, a cleanup once per hour.
    pub fn start(monitor: Arc<SecurityMonitor>, sessions: Arc<SessionAuthority>) -> Self {
        Self::start_with_intervals(monitor, sessions, REPORT_INTERVAL, CLEANUP_INTERVAL)
    }

    /// Start with explicit intervals.
    pub fn start_with_intervals(
        monitor: Arc<SecurityMonitor>,
        sessions: Arc<SessionAuthority>,
        report_every: Duration,
        cleanup_every: Duration,
    ) -> Self {
        let (shutdown, signal) = mpsc::channel();
        let handle =
            std::thread::spawn(move || run_loop(monitor, sessions, signal, report_every, cleanup_every));

        tracing::info!(target: "keepsake_core::monitor", "security monitoring started");

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Signal shutdown and wait for the thread to exit.
    pub fn stop(mut self) {
        let _ = self.shutdown.send(());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MonitorScheduler {
    fn drop(&mut self) {
        // stop() already joined if it ran; otherwise signal and let the
        // thread wind down on its own.
        let _ = self.shutdown.send(());
    }
}

fn run_loop(
    monitor: Arc<SecurityMonitor>,
    sessions: Arc<SessionAuthority>,
    signal: mpsc::Receiver<()>,
    report_every: Duration,
    cleanup_every: Duration,
) {
    let started = Instant::now();
    let mut next_report = started + report_every;
    let mut next_cleanup = started + cleanup_every;

    loop {
        let next_due = next_report.min(next_cleanup);
        let wait = next_due.saturating_duration_since(Instant::now());

        match signal.recv_timeout(wait) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                tracing::info!(target: "keepsake_core::monitor", "security monitoring stopped");
                return;
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        let now = Instant::now();
        if now >= next_report {
            monitor.record_report();
            next_report = now + report_every;
        }
        if now >= next_cleanup {
            if let Err(err) = monitor.clear_windows() {
                tracing::error!(target: "keepsake_core::monitor", error = %err, "window cleanup failed");
            }
            match sessions.prune_lockouts() {
                Ok(pruned) if pruned > 0 => {
                    tracing::debug!(target: "keepsake_core::monitor", pruned, "idle lockout counters pruned");
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::error!(target: "keepsake_core::monitor", error = %err, "lockout pruning failed");
                }
            }
            next_cleanup = now + cleanup_every;
        }
    }
}
