//! Vault key material.
//!
//! Deployments normally configure the vault key as base64. Operators who
//! prefer a passphrase can derive it with Argon2id from the passphrase and a
//! stored salt.

use crate::error::{CryptoError, CryptoResult};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Vault key length (ChaCha20 takes 256-bit keys).
pub const KEY_SIZE: usize = 32;

/// Passphrase salt length.
pub const SALT_SIZE: usize = 16;

/// Decodes base64 into exactly `N` bytes. The intermediate buffer is wiped.
fn decode_exact<const N: usize>(encoded: &str) -> CryptoResult<[u8; N]> {
    let decoded = Zeroizing::new(
        BASE64
            .decode(encoded.trim())
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?,
    );
    if decoded.len() != N {
        return Err(CryptoError::InvalidKeyLength {
            expected: N,
            actual: decoded.len(),
        });
    }
    let mut bytes = [0u8; N];
    bytes.copy_from_slice(&decoded);
    Ok(bytes)
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    bytes
}

/// The key sealing holder identities. Wiped on drop, never printed.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    bytes: [u8; KEY_SIZE],
}

impl VaultKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Parses a configured key: base64 of exactly 32 bytes.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        decode_exact(encoded).map(Self::from_bytes)
    }

    pub fn generate() -> Self {
        Self::from_bytes(random_bytes())
    }

    /// The form `from_base64` accepts, for `keyward keygen`.
    pub fn to_base64(&self) -> String {
        BASE64.encode(self.bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("VaultKey([REDACTED])")
    }
}

/// Salt stored next to a passphrase-derived deployment. Not secret.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Salt([u8; SALT_SIZE]);

impl Salt {
    pub fn random() -> Self {
        Self(random_bytes())
    }

    pub fn from_bytes(bytes: [u8; SALT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parses base64 of exactly 16 bytes.
    pub fn from_base64(encoded: &str) -> CryptoResult<Self> {
        decode_exact(encoded).map(Self)
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; SALT_SIZE] {
        &self.0
    }
}

/// Argon2id cost parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdfParams {
    /// KiB of memory per derivation.
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// OWASP's Argon2id baseline: 19 MiB, two passes, one lane.
    fn default() -> Self {
        Self {
            memory_cost: 19 * 1024,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

/// Stretches a passphrase into a vault key with Argon2id.
///
/// The same passphrase, salt and parameters always yield the same key, so
/// all three must be kept to reopen existing identities.
pub fn derive_key(passphrase: &str, salt: &Salt, params: &KdfParams) -> CryptoResult<VaultKey> {
    let kdf_err = |e: argon2::Error| CryptoError::KeyDerivation(e.to_string());
    let cost = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        Some(KEY_SIZE),
    )
    .map_err(kdf_err)?;

    let mut bytes = [0u8; KEY_SIZE];
    Argon2::new(Algorithm::Argon2id, Version::V0x13, cost)
        .hash_password_into(passphrase.as_bytes(), salt.as_bytes(), &mut bytes)
        .map_err(kdf_err)?;
    let key = VaultKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}
