//! Session token generation and shape validation.

use crate::error::{Result, SecurityError};

/// Encoded token length: 256 bits of entropy as lowercase hex.
pub const TOKEN_LENGTH: usize = 64;

/// Raw entropy per token in bytes.
const TOKEN_BYTES: usize = 32;

/// Mint a fresh session token from the OS RNG.
///
/// # Errors
///
/// Returns `SecurityError::Crypto` if the OS RNG is unavailable.
pub fn mint_token() -> Result<String> {
    let mut bytes = [0u8; TOKEN_BYTES];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| SecurityError::Crypto(format!("Failed to generate token bytes: {}", e)))?;
    Ok(hex::encode(bytes))
}

/// Cheap shape check: exactly 64 lowercase hex characters.
///
/// Anything else is rejected before any session lookup happens.
pub fn is_valid_token_format(token: &str) -> bool {
    token.len() == TOKEN_LENGTH
        && token
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_token_shape() {
        let token = mint_token().unwrap();
        assert_eq!(token.len(), TOKEN_LENGTH);
        assert!(is_valid_token_format(&token));
    }

    #[test]
    fn test_minted_tokens_unique() {
        let a = mint_token().unwrap();
        let b = mint_token().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_format_rejections() {
        assert!(!is_valid_token_format(""));
        assert!(!is_valid_token_format("short"));
        assert!(!is_valid_token_format(&"a".repeat(63)));
        assert!(!is_valid_token_format(&"a".repeat(65)));
        // Uppercase hex is not the canonical form.
        assert!(!is_valid_token_format(&"A".repeat(64)));
        assert!(!is_valid_token_format(&"g".repeat(64)));
    }
}
