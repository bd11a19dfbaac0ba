//! Errors raised while handling vault keys and sealed identities.

use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failures of the identity vault. Read paths turn these into an
/// "unreadable" marker rather than failing the request.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Argon2 rejected the parameters or failed.
    #[error("passphrase derivation failed: {0}")]
    KeyDerivation(String),

    /// Key material could not be decoded.
    #[error("invalid key encoding: {0}")]
    KeyEncoding(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (wrong key, tampered or truncated data).
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Invalid key length.
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Decrypted plaintext was not a valid identity record.
    #[error("invalid identity payload: {0}")]
    InvalidPayload(#[from] keyward_types::Error),
}
