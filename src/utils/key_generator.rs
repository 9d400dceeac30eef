//! Short key generation.
//!
//! Keys are 6 bytes of OS entropy encoded as URL-safe base64 without padding,
//! which always yields 8 characters from `[A-Za-z0-9_-]`. Uniqueness is not
//! guaranteed here; storage enforces it and the service retries on collision.

use crate::error::AppError;
use base64::Engine as _;

/// Length of random bytes before base64 encoding.
const KEY_LENGTH_BYTES: usize = 6;

/// Length of an encoded key.
pub const KEY_LENGTH: usize = 8;

/// Source of short keys.
#[cfg_attr(test, mockall::automock)]
pub trait KeyGenerator: Send + Sync {
    /// Returns a new key.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::KeyGeneration`] if no key can be produced.
    fn generate(&self) -> Result<String, AppError>;
}

/// [`KeyGenerator`] backed by the operating system's random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomKeyGenerator;

impl KeyGenerator for RandomKeyGenerator {
    fn generate(&self) -> Result<String, AppError> {
        generate_key()
    }
}

/// Generates a cryptographically secure random short key.
///
/// # Errors
///
/// Returns [`AppError::KeyGeneration`] if the system random number generator
/// fails.
///
/// # Examples
///
/// ```ignore
/// let key = generate_key()?;
/// assert_eq!(key.len(), 8);
/// ```
pub fn generate_key() -> Result<String, AppError> {
    let mut buffer = [0u8; KEY_LENGTH_BYTES];

    getrandom::fill(&mut buffer)
        .map_err(|e| AppError::key_generation(format!("Entropy source unavailable: {e}")))?;

    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buffer))
}

/// Returns true if `key` has the shape of a generated key.
pub fn is_valid_key(key: &str) -> bool {
    key.len() == KEY_LENGTH
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
