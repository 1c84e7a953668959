//! Authenticated encryption envelopes.
//!
//! A sealed value is a self-describing envelope of three hex segments,
//! `<iv>:<tag>:<ciphertext>`, storable as a single opaque string. The
//! cipher is AES-256-GCM with a 16-byte IV (the at-rest format predates
//! the 12-byte GCM convention) and a 16-byte authentication tag.

use std::fmt;
use std::str::FromStr;

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::Aead;
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, KeyInit, Nonce};

use crate::crypto::key::MasterKey;
use crate::error::{Result, SecurityError};

/// IV length in bytes (128 bits, fixed by the on-disk format).
const IV_LENGTH: usize = 16;

/// Authentication tag length in bytes.
const TAG_LENGTH: usize = 16;

/// Segment separator in the encoded form.
const SEPARATOR: char = ':';

/// AES-256-GCM parameterized with the format's 16-byte IV.
type EnvelopeCipher = AesGcm<Aes256, U16>;

/// A sealed value: IV, authentication tag, and ciphertext.
///
/// Value type with no identity; produced by [`seal`], consumed by
/// [`open`]. The encoded form is exactly three lowercase-hex segments
/// joined by `:`.
#[derive(Clone, PartialEq, Eq)]
pub struct Envelope {
    iv: [u8; IV_LENGTH],
    tag: [u8; TAG_LENGTH],
    ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encode as `<ivHex>:<tagHex>:<ciphertextHex>`.
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}{}{}",
            hex::encode(self.iv),
            SEPARATOR,
            hex::encode(self.tag),
            SEPARATOR,
            hex::encode(&self.ciphertext)
        )
    }

    /// Parse an encoded envelope.
    ///
    /// # Errors
    ///
    /// Returns `SecurityError::Decryption` if the input does not split
    /// into exactly three segments, any segment is not valid hex, or the
    /// IV/tag lengths are wrong. The error is the same in every case so
    /// a tampering caller learns nothing about which check failed.
    pub fn decode(encoded: &str) -> Result<Self> {
        let parts: Vec<&str> = encoded.split(SEPARATOR).collect();
        if parts.len() != 3 {
            return Err(SecurityError::Decryption);
        }

        let iv: [u8; IV_LENGTH] = hex::decode(parts[0])
            .map_err(|_| SecurityError::Decryption)?
            .try_into()
            .map_err(|_| SecurityError::Decryption)?;

        let tag: [u8; TAG_LENGTH] = hex::decode(parts[1])
            .map_err(|_| SecurityError::Decryption)?
            .try_into()
            .map_err(|_| SecurityError::Decryption)?;

        let ciphertext = hex::decode(parts[2]).map_err(|_| SecurityError::Decryption)?;

        Ok(Self {
            iv,
            tag,
            ciphertext,
        })
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Envelope {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self> {
        Self::decode(s)
    }
}

impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Ciphertext is opaque; length is the only useful detail.
        f.debug_struct("Envelope")
            .field("iv", &hex::encode(self.iv))
            .field("ciphertext_len", &self.ciphertext.len())
            .finish()
    }
}

/// Seal a plaintext under the master key.
///
/// A fresh random IV is generated per call; sealing the same plaintext
/// twice yields different envelopes.
///
/// # Errors
///
/// Returns `SecurityError::Crypto` if the OS RNG fails or encryption
/// fails. Neither is expected in normal operation.
pub fn seal(plaintext: &[u8], key: &MasterKey) -> Result<Envelope> {
    let mut iv = [0u8; IV_LENGTH];
    getrandom::getrandom(&mut iv)
        .map_err(|e| SecurityError::Crypto(format!("Failed to generate IV: {}", e)))?;

    let cipher = EnvelopeCipher::new(Key::<EnvelopeCipher>::from_slice(key.as_bytes()));
    let nonce = Nonce::<U16>::from_slice(&iv);

    // The AEAD appends the 16-byte tag to the ciphertext; the envelope
    // stores them as separate segments.
    let mut combined = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| SecurityError::Crypto("Encryption failed".to_string()))?;

    let tag_offset = combined.len() - TAG_LENGTH;
    let tag_bytes = combined.split_off(tag_offset);
    let tag: [u8; TAG_LENGTH] = tag_bytes
        .try_into()
        .map_err(|_| SecurityError::Crypto("Malformed authentication tag".to_string()))?;

    Ok(Envelope {
        iv,
        tag,
        ciphertext: combined,
    })
}

/// Open an envelope under the master key.
///
/// # Errors
///
/// Returns `SecurityError::Decryption` if the authentication tag does not
/// verify (wrong key, or any component tampered with). No partial
/// plaintext is ever returned.
pub fn open(envelope: &Envelope, key: &MasterKey) -> Result<Vec<u8>> {
    let cipher = EnvelopeCipher::new(Key::<EnvelopeCipher>::from_slice(key.as_bytes()));
    let nonce = Nonce::<U16>::from_slice(&envelope.iv);

    let mut combined = Vec::with_capacity(envelope.ciphertext.len() + TAG_LENGTH);
    combined.extend_from_slice(&envelope.ciphertext);
    combined.extend_from_slice(&envelope.tag);

    cipher
        .decrypt(nonce, combined.as_slice())
        .map_err(|_| SecurityError::Decryption)
}
