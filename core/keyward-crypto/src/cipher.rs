//! ChaCha20-Poly1305 envelopes for identity blobs.
//!
//! Layout of an encoded envelope:
//!
//! ```text
//! version (1) || nonce (12) || ciphertext || tag (16)
//! ```
//!
//! The nonce is drawn fresh for every envelope. The version byte is bound as
//! associated data, so rewriting it breaks authentication.

use crate::error::{CryptoError, CryptoResult};
use crate::key::VaultKey;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    ChaCha20Poly1305, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;

/// Current envelope format.
pub const ENVELOPE_VERSION: u8 = 1;

/// Nonce length (96 bits).
pub const NONCE_SIZE: usize = 12;

/// Poly1305 tag length.
pub const TAG_SIZE: usize = 16;

const HEADER_SIZE: usize = 1 + NONCE_SIZE;

/// A sealed payload together with its nonce.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext followed by the tag.
    pub ciphertext: Vec<u8>,
}

impl Envelope {
    /// Encoded length in bytes, before base64.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.ciphertext.len()
    }

    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        bytes.push(ENVELOPE_VERSION);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        BASE64.encode(bytes)
    }

    /// Parses an encoded envelope. Authentication happens in [`open_bytes`].
    pub fn decode(encoded: &str) -> CryptoResult<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| CryptoError::Decryption(format!("invalid base64: {e}")))?;

        let Some((&version, rest)) = bytes.split_first() else {
            return Err(CryptoError::Decryption("empty envelope".to_string()));
        };
        if version != ENVELOPE_VERSION {
            return Err(CryptoError::Decryption(format!(
                "unsupported envelope version {version}"
            )));
        }
        if rest.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::Decryption("envelope truncated".to_string()));
        }

        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        nonce_bytes.copy_from_slice(nonce);
        Ok(Self {
            nonce: nonce_bytes,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

fn aead(key: &VaultKey) -> ChaCha20Poly1305 {
    ChaCha20Poly1305::new(key.as_bytes().into())
}

/// Seals `plaintext` under `key` with a fresh nonce.
pub fn seal_bytes(key: &VaultKey, plaintext: &[u8]) -> CryptoResult<Envelope> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);

    let payload = Payload {
        msg: plaintext,
        aad: &[ENVELOPE_VERSION],
    };
    let ciphertext = aead(key)
        .encrypt(Nonce::from_slice(&nonce), payload)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    Ok(Envelope { nonce, ciphertext })
}

/// Opens an envelope produced by [`seal_bytes`] under the same key.
pub fn open_bytes(key: &VaultKey, envelope: &Envelope) -> CryptoResult<Vec<u8>> {
    let payload = Payload {
        msg: envelope.ciphertext.as_slice(),
        aad: &[ENVELOPE_VERSION],
    };
    aead(key)
        .decrypt(Nonce::from_slice(&envelope.nonce), payload)
        .map_err(|_| CryptoError::Decryption("wrong key or tampered envelope".to_string()))
}
