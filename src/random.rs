//! Random tokens for file names and other identifiers an attacker should not
//! be able to guess.

use std::io;

use rand::{TryRngCore, rngs::OsRng};

use crate::error::Error;

/// 64 symbols, so each random byte maps to one symbol with no modulo bias.
const ALPHABET: &[u8; 64] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_+";

/// Returns `length` characters drawn uniformly from `[a-zA-Z0-9_+]`.
///
/// Bytes come straight from the operating system CSPRNG. If the OS cannot
/// supply them the call fails with [`Error::Entropy`] rather than falling back
/// to a weaker source.
///
/// ```rust
/// let token = toolkit::random_string(25).unwrap();
/// assert_eq!(token.len(), 25);
/// ```
pub fn random_string(length: usize) -> Result<String, Error> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Entropy(io::Error::other(e)))?;

    Ok(bytes
        .into_iter()
        .map(|b| char::from(ALPHABET[usize::from(b & 0x3f)]))
        .collect())
}
