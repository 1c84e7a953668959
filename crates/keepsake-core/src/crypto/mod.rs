//! Cryptographic operations for Keepsake.
//!
//! This module protects journal field values at rest using well-audited
//! libraries:
//! - **AES-256-GCM**: authenticated symmetric encryption
//! - **Argon2id**: memory-hard key derivation function
//!
//! ## Security Model
//!
//! - One process-wide master key, derived at startup from the configured
//!   secret with a fixed salt
//! - Fresh random IV per sealed value; tampering with any envelope
//!   component fails decryption outright
//! - Key material zeroized from memory on drop
//!
//! ## Threat Model
//!
//! We defend against:
//! - Theft of the encrypted data store or backups
//! - Modification of stored ciphertext
//!
//! We do NOT defend against:
//! - A compromised process with the master secret in its environment
//! - Access to plaintext within a live request scope

pub mod envelope;
pub mod key;

pub use envelope::{open, seal, Envelope};
pub use key::{derive_master_key, MasterKey};

use sha2::{Digest, Sha256};

/// Hash an identifier to its stable, non-reversible form.
///
/// Collaborators store the SHA-256 hex digest of user identifiers instead
/// of the raw value, so a leaked data store does not map back to accounts
/// directly.
pub fn hash_identity(identifier: &str) -> String {
    hex::encode(Sha256::digest(identifier.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_identity_stable() {
        assert_eq!(hash_identity("user-1"), hash_identity("user-1"));
        assert_ne!(hash_identity("user-1"), hash_identity("user-2"));
    }

    #[test]
    fn test_hash_identity_shape() {
        let digest = hash_identity("someone@example.com");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
