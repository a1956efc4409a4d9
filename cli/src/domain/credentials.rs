//! Random password generation.

use rand::Rng;

use crate::domain::error::CredentialError;

pub const DEFAULT_PASSWORD_LENGTH: usize = 32;
pub const MIN_PASSWORD_LENGTH: usize = 16;

/// Alphanumerics without the visually ambiguous `I O l o 0 1`.
pub const PASSWORD_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnpqrstuvwxyz23456789";

/// Generate a password of `length` characters drawn uniformly from
/// [`PASSWORD_ALPHABET`] using the thread-local CSPRNG.
///
/// # Errors
///
/// Returns [`CredentialError::TooShort`] when `length` is below
/// [`MIN_PASSWORD_LENGTH`].
pub fn generate(length: usize) -> Result<String, CredentialError> {
    if length < MIN_PASSWORD_LENGTH {
        return Err(CredentialError::TooShort {
            length,
            minimum: MIN_PASSWORD_LENGTH,
        });
    }
    let mut rng = rand::thread_rng();
    Ok((0..length)
        .map(|_| char::from(PASSWORD_ALPHABET[rng.gen_range(0..PASSWORD_ALPHABET.len())]))
        .collect())
}
