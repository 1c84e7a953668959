//! Master key derivation using Argon2id.
//!
//! The process-wide encryption key is derived once at startup from the
//! configured master secret. Derivation is deterministic: the salt is a
//! fixed constant, so every start of the process (and every deployment
//! sharing the secret) arrives at the same key and can open previously
//! sealed envelopes. Changing the salt breaks decryption of all existing
//! data.

use argon2::Argon2;
use secrecy::{ExposeSecret, SecretString};
use zeroize::ZeroizeOnDrop;

use crate::error::{Result, SecurityError};

/// Argon2id parameters.
///
/// These values balance security and startup latency:
/// - Memory: 64 MB (64 * 1024 KB)
/// - Iterations: 3
/// - Parallelism: 1 (derivation happens once, off the request path)
const ARGON2_MEMORY_KB: u32 = 64 * 1024;
const ARGON2_ITERATIONS: u32 = 3;
const ARGON2_PARALLELISM: u32 = 1;

/// Length of the derived key in bytes (32 bytes = 256 bits for AES-256).
const KEY_LENGTH: usize = 32;

/// Fixed derivation salt.
///
/// Deliberately non-random: stored envelopes carry no salt, so the key
/// must be recomputable from the secret alone. Do not change without a
/// data migration.
const MASTER_KEY_SALT: &[u8] = b"keepsake.master-key.v1";

/// The process-wide encryption key.
///
/// Key material is zeroized when dropped and redacted from `Debug`
/// output.
#[derive(Clone, ZeroizeOnDrop)]
pub struct MasterKey {
    /// The raw key bytes (zeroized on drop)
    key: [u8; KEY_LENGTH],
}

impl MasterKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self { key: bytes }
    }

    /// Get a reference to the raw key bytes.
    ///
    /// # Security
    ///
    /// Avoid storing or logging this value. Use only for immediate
    /// encryption operations.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MasterKey")
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Derive the master encryption key from the configured secret.
///
/// Same secret always produces the same key; see [`MASTER_KEY_SALT`].
///
/// # Errors
///
/// Returns `SecurityError::Crypto` if the Argon2 parameters are rejected
/// or derivation fails. Either is fatal at startup.
pub fn derive_master_key(secret: &SecretString) -> Result<MasterKey> {
    let params = argon2::Params::new(
        ARGON2_MEMORY_KB,
        ARGON2_ITERATIONS,
        ARGON2_PARALLELISM,
        Some(KEY_LENGTH),
    )
    .map_err(|e| SecurityError::Crypto(format!("Failed to create Argon2 params: {}", e)))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

    let mut key_bytes = [0u8; KEY_LENGTH];
    argon2
        .hash_password_into(
            secret.expose_secret().as_bytes(),
            MASTER_KEY_SALT,
            &mut key_bytes,
        )
        .map_err(|e| SecurityError::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(MasterKey::from_bytes(key_bytes))
}
