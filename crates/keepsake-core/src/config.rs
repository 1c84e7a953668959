//! Security configuration loading and validation.
//!
//! The master secret is required: the process must not serve requests
//! without it, since the encryption key cannot be derived. Every other
//! knob has a default and can be overridden with the builder methods.

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use std::path::PathBuf;

use crate::error::{Result, SecurityError};

/// Environment variable holding the master secret.
pub const MASTER_SECRET_ENV: &str = "ENCRYPTION_KEY";

/// Minimum master secret length in characters.
const MIN_SECRET_LENGTH: usize = 8;

/// Default location of the audit log, relative to the working directory.
const DEFAULT_AUDIT_LOG_PATH: &str = "logs/audit.log";

/// Runtime configuration for the security core.
///
/// Constructed once at process start and shared by reference with the
/// components that need it. The master secret is held behind
/// [`SecretString`] until key derivation and never appears in `Debug`
/// output.
#[derive(Debug)]
pub struct SecurityConfig {
    master_secret: SecretString,

    /// Failed attempts within the tracking window before lockout.
    pub lockout_threshold: usize,

    /// Sliding window over which failed attempts are counted.
    pub tracking_window: Duration,

    /// How long authentication is refused once locked.
    pub lockout_duration: Duration,

    /// Absolute session lifetime, fixed at login.
    pub session_timeout: Duration,

    /// Tracked suspicious activities within the window before alerting.
    pub suspicious_threshold: usize,

    /// Path of the append-only audit log file.
    pub audit_log_path: PathBuf,
}

impl SecurityConfig {
    /// Create a configuration with the given master secret and defaults
    /// for everything else (5 attempts / 15 min window / 15 min lockout,
    /// 30 min sessions, suspicious threshold 10).
    ///
    /// # Errors
    ///
    /// Returns `SecurityError::Configuration` if the secret is empty,
    /// whitespace-only, or shorter than 8 characters.
    pub fn new(master_secret: SecretString) -> Result<Self> {
        validate_master_secret(&master_secret)?;

        Ok(Self {
            master_secret,
            lockout_threshold: 5,
            tracking_window: Duration::minutes(15),
            lockout_duration: Duration::minutes(15),
            session_timeout: Duration::minutes(30),
            suspicious_threshold: 10,
            audit_log_path: PathBuf::from(DEFAULT_AUDIT_LOG_PATH),
        })
    }

    /// Load the configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns `SecurityError::Configuration` if `ENCRYPTION_KEY` is
    /// missing or invalid. This error is fatal at startup.
    pub fn from_env() -> Result<Self> {
        let secret = std::env::var(MASTER_SECRET_ENV).map_err(|_| {
            SecurityError::Configuration(format!(
                "{} environment variable is required",
                MASTER_SECRET_ENV
            ))
        })?;
        Self::new(SecretString::from(secret))
    }

    /// The configured master secret, for key derivation only.
    pub fn master_secret(&self) -> &SecretString {
        &self.master_secret
    }

    pub fn with_lockout_threshold(mut self, threshold: usize) -> Self {
        self.lockout_threshold = threshold;
        self
    }

    pub fn with_tracking_window(mut self, window: Duration) -> Self {
        self.tracking_window = window;
        self
    }

    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }

    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    pub fn with_suspicious_threshold(mut self, threshold: usize) -> Self {
        self.suspicious_threshold = threshold;
        self
    }

    pub fn with_audit_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.audit_log_path = path.into();
        self
    }
}

/// Validate that the master secret meets minimum requirements.
fn validate_master_secret(secret: &SecretString) -> Result<()> {
    let value = secret.expose_secret();

    if value.trim().is_empty() {
        return Err(SecurityError::Configuration(
            "Master secret cannot be empty".to_string(),
        ));
    }

    if value.len() < MIN_SECRET_LENGTH {
        return Err(SecurityError::Configuration(format!(
            "Master secret must be at least {} characters (got {})",
            MIN_SECRET_LENGTH,
            value.len()
        )));
    }

    Ok(())
}
