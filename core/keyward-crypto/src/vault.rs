//! Sealing of holder-identity records.
//!
//! [`IdentityVault`] owns the vault key for the lifetime of the process.
//! Callers hand it an identity record and get back an opaque
//! [`SealedIdentity`] suitable for a TEXT column, and vice versa.

use crate::cipher::{self, Envelope};
use crate::error::CryptoResult;
use crate::key::VaultKey;
use keyward_types::HolderIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An encrypted holder-identity blob as persisted on a license.
///
/// Holds a base64 [`Envelope`].
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SealedIdentity(String);

impl SealedIdentity {
    /// Wraps a value read back from storage.
    #[must_use]
    pub fn from_stored(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Returns the encoded blob.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper, returning the encoded blob.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for SealedIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SealedIdentity({} bytes)", self.0.len())
    }
}

/// Symmetric encryption of holder identities under one injected key.
pub struct IdentityVault {
    key: VaultKey,
}

impl IdentityVault {
    /// Creates a vault around `key`.
    #[must_use]
    pub fn new(key: VaultKey) -> Self {
        Self { key }
    }

    /// Serializes and encrypts an identity record.
    pub fn seal(&self, identity: &HolderIdentity) -> CryptoResult<SealedIdentity> {
        let plaintext = identity.to_json_bytes()?;
        let envelope = cipher::seal_bytes(&self.key, &plaintext)?;
        Ok(SealedIdentity(envelope.encode()))
    }

    /// Decrypts and parses a sealed record.
    ///
    /// Fails with a [`CryptoError`](crate::CryptoError) if the blob is not
    /// valid base64, is truncated, was sealed under a different key, or does
    /// not decrypt to a JSON object.
    pub fn open(&self, sealed: &SealedIdentity) -> CryptoResult<HolderIdentity> {
        let envelope = Envelope::decode(&sealed.0)?;
        let plaintext = cipher::open_bytes(&self.key, &envelope)?;
        Ok(HolderIdentity::from_json_bytes(&plaintext)?)
    }
}

impl fmt::Debug for IdentityVault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityVault").finish_non_exhaustive()
    }
}
