//! Encryption layer for Keyward.
//!
//! Seals the holder-identity records that client applications submit when
//! applying for activation.
//!
//! # Design
//!
//! - **Algorithm**: ChaCha20-Poly1305 (AEAD), 256-bit key
//! - **Envelope**: version byte, then a 96-bit nonce drawn per sealed record,
//!   then ciphertext and tag
//! - **Key source**: base64 configuration or Argon2id over a passphrase
//! - **Key hygiene**: key bytes are zeroized on drop and redacted in `Debug`

mod cipher;
mod error;
mod key;
mod vault;

pub use cipher::{ENVELOPE_VERSION, Envelope, NONCE_SIZE, TAG_SIZE, open_bytes, seal_bytes};
pub use error::{CryptoError, CryptoResult};
pub use key::{KEY_SIZE, KdfParams, SALT_SIZE, Salt, VaultKey, derive_key};
pub use vault::{IdentityVault, SealedIdentity};
