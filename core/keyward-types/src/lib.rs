//! Core type definitions for Keyward.
//!
//! This crate defines the small, storage-agnostic types shared by every
//! other crate in the workspace:
//! - Record identifiers (UUID v7) and the external application id
//! - The holder-identity record submitted by client applications
//! - A clock abstraction so expiry decisions can be tested deterministically

mod clock;
mod identity;
mod ids;

pub use clock::{Clock, FixedClock, SystemClock};
pub use identity::HolderIdentity;
pub use ids::{AccountId, AppId, ApplicationId, LicenseId};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),

    #[error("invalid app id: {0}")]
    InvalidAppId(String),

    #[error("holder identity must be a JSON object, got {0}")]
    IdentityNotObject(&'static str),
}
