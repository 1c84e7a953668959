//! Error types for the Keepsake security core.
//!
//! This module defines the error hierarchy for all security operations.
//! Display messages stay generic on purpose: anything a client might see
//! carries no internal detail, which instead travels through the audit
//! trail for operators.

use thiserror::Error;

/// Result type alias for security-core operations.
pub type Result<T> = std::result::Result<T, SecurityError>;

/// Core error type for security operations.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// Credential validation failed. Covers unknown identifier and wrong
    /// secret alike so callers cannot enumerate accounts.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Authentication refused because the actor is locked out.
    #[error("Account temporarily locked")]
    AccountLocked,

    /// The session existed but its expiry has passed.
    #[error("Session expired")]
    SessionExpired,

    /// No session for the presented token.
    #[error("Session not found")]
    SessionNotFound,

    /// Envelope decryption failed. Never carries partial plaintext or
    /// cipher internals.
    #[error("Decryption failed")]
    Decryption,

    /// Encryption or key-derivation error
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// The identity is not allowed to touch the resource.
    #[error("Access denied")]
    Unauthorized,

    /// Durable-write or read failure on the audit trail. Non-fatal.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Fatal startup misconfiguration (e.g. missing master secret).
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal state error (poisoned lock, broken handle).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<std::io::Error> for SecurityError {
    fn from(err: std::io::Error) -> Self {
        SecurityError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for SecurityError {
    fn from(err: serde_json::Error) -> Self {
        SecurityError::Persistence(err.to_string())
    }
}
