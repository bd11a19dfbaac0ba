//! Wire shapes of the public (unauthenticated) client API.
//!
//! Field names are camelCase to match what deployed client SDKs parse.

use crate::error::LicenseError;
use crate::lifecycle::LicenseStatus;
use crate::model::{Application, License};
use crate::workflow::Verification;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Response to `verify`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub valid: bool,
    pub status: LicenseStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl From<Verification> for VerifyResponse {
    fn from(v: Verification) -> Self {
        Self {
            success: true,
            valid: v.valid,
            status: v.status,
            expires_at: v.expires_at,
        }
    }
}

/// License summary echoed back by `apply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedLicense {
    pub license_key: String,
    pub status: LicenseStatus,
    pub app_id: String,
}

/// Response to `apply`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResponse {
    pub success: bool,
    pub message: String,
    pub license: AppliedLicense,
}

impl ApplyResponse {
    #[must_use]
    pub fn submitted(license: &License, application: &Application) -> Self {
        Self {
            success: true,
            message: "application submitted, awaiting review".to_string(),
            license: AppliedLicense {
                license_key: license.key.clone(),
                status: license.status,
                app_id: application.app_id.to_string(),
            },
        }
    }
}

/// An unclaimed key offered to client software.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingKey {
    pub license_key: String,
    pub created_at: DateTime<Utc>,
}

impl From<&License> for PendingKey {
    fn from(license: &License) -> Self {
        Self {
            license_key: license.key.clone(),
            created_at: license.created_at,
        }
    }
}

/// Response to the pending-keys listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingKeysResponse {
    pub success: bool,
    pub pending_licenses: Vec<PendingKey>,
}

impl From<Vec<PendingKey>> for PendingKeysResponse {
    fn from(pending_licenses: Vec<PendingKey>) -> Self {
        Self {
            success: true,
            pending_licenses,
        }
    }
}

/// Failure body for any public call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
    /// Present on verify failures, always `false`.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub valid: Option<bool>,
}

impl ErrorResponse {
    /// Builds a failure body. Storage and crypto internals are not echoed.
    #[must_use]
    pub fn from_error(err: &LicenseError, for_verify: bool) -> Self {
        let message = match err {
            LicenseError::Storage(_) | LicenseError::Crypto(_) => {
                "internal error".to_string()
            }
            other => other.to_string(),
        };
        Self {
            success: false,
            message,
            valid: for_verify.then_some(false),
        }
    }
}
