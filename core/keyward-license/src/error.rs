//! Error types for the licensing crate.

use crate::format::FormatError;
use crate::lifecycle::LicenseStatus;
use crate::store::StoreError;
use keyward_crypto::CryptoError;
use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// License or application absent, or outside the caller's scope.
    #[error("not found: {0}")]
    NotFound(String),

    /// The license's current status forbids the requested action.
    #[error("license is {current}, cannot {action}")]
    InvalidState {
        current: LicenseStatus,
        action: String,
    },

    /// Malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No unique key could be allocated within the retry bound.
    #[error("could not allocate a unique license key after {attempts} attempts")]
    Conflict { attempts: u32 },

    /// The license kept changing underneath a status update.
    #[error("license changed concurrently {attempts} times, giving up")]
    Contended { attempts: u32 },

    /// A sealed identity could not be produced or opened.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    /// The caller may see the record but not act on it.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Deleting an application that still owns licenses.
    #[error("application still owns {0} license(s)")]
    ApplicationInUse(u64),

    /// Persistence failure.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LicenseError {
    pub(crate) fn invalid_state(current: LicenseStatus, action: impl Into<String>) -> Self {
        Self::InvalidState {
            current,
            action: action.into(),
        }
    }
}

impl From<FormatError> for LicenseError {
    fn from(err: FormatError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
