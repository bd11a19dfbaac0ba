//! Persisted records and the inputs that create or change them.

use crate::format::KeyFormat;
use crate::lifecycle::LicenseStatus;
use chrono::{DateTime, Utc};
use keyward_crypto::SealedIdentity;
use keyward_types::{AccountId, AppId, ApplicationId, LicenseId};
use serde::{Deserialize, Serialize};

/// A product definition that owns a key format and a set of licenses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: ApplicationId,
    /// External identifier client software sends with every request.
    pub app_id: AppId,
    pub name: String,
    pub description: Option<String>,
    /// Account that owns the application.
    pub owner: AccountId,
    pub format: KeyFormat,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for creating an application. Omitted format fields fall back to
/// the [`KeyFormat`] defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDraft {
    pub name: String,
    pub description: Option<String>,
    pub prefix: Option<String>,
    pub segments: Option<u8>,
    pub segment_length: Option<u8>,
    pub delimiter: Option<char>,
}

/// Partial update of an application. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub prefix: Option<String>,
    pub segments: Option<u8>,
    pub segment_length: Option<u8>,
    pub delimiter: Option<char>,
}

impl ApplicationPatch {
    pub(crate) fn touches_format(&self) -> bool {
        self.prefix.is_some()
            || self.segments.is_some()
            || self.segment_length.is_some()
            || self.delimiter.is_some()
    }
}

/// A single issued key record.
#[derive(Debug, Clone, PartialEq)]
pub struct License {
    pub id: LicenseId,
    /// The key string, unique across every application.
    pub key: String,
    pub status: LicenseStatus,
    /// Encrypted holder identity, present once the holder has applied.
    pub identity: Option<SealedIdentity>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub application_id: ApplicationId,
    pub created_by: Option<AccountId>,
}

impl License {
    /// A freshly issued, pending license.
    #[must_use]
    pub fn issue(
        key: String,
        application_id: ApplicationId,
        created_by: Option<AccountId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: LicenseId::new(),
            key,
            status: LicenseStatus::Pending,
            identity: None,
            created_at: now,
            updated_at: now,
            activated_at: None,
            expires_at: None,
            application_id,
            created_by,
        }
    }

    /// Returns true if a holder identity has been submitted.
    #[must_use]
    pub fn has_identity(&self) -> bool {
        self.identity.is_some()
    }
}

/// Administrative update of a license.
///
/// `expires_at` is tri-state: `None` keeps the current expiry,
/// `Some(None)` clears it, `Some(Some(t))` sets it.
#[derive(Debug, Clone, Default)]
pub struct LicensePatch {
    pub status: Option<LicenseStatus>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

/// Field changes applied by a conditional (compare-and-set) store write.
#[derive(Debug, Clone, PartialEq)]
pub struct LicenseChange {
    pub status: Option<LicenseStatus>,
    /// `Some(None)` clears the stored identity.
    pub identity: Option<Option<SealedIdentity>>,
    pub activated_at: Option<DateTime<Utc>>,
    /// `Some(None)` clears the expiry.
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub updated_at: DateTime<Utc>,
}

impl LicenseChange {
    /// Touches nothing but the update time.
    #[must_use]
    pub fn touch(now: DateTime<Utc>) -> Self {
        Self {
            status: None,
            identity: None,
            activated_at: None,
            expires_at: None,
            updated_at: now,
        }
    }

    /// Moves `license` to `status`. The activation time is stamped the first
    /// time the license becomes active.
    #[must_use]
    pub fn transition(license: &License, status: LicenseStatus, now: DateTime<Utc>) -> Self {
        let first_activation = status == LicenseStatus::Active && license.activated_at.is_none();
        Self {
            status: Some(status),
            activated_at: first_activation.then_some(now),
            ..Self::touch(now)
        }
    }

    /// Sets (`Some(t)`) or clears (`None`) the expiry as part of this change.
    #[must_use]
    pub fn with_expiry(mut self, expires_at: Option<DateTime<Utc>>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    /// Stores a sealed identity, status unchanged.
    #[must_use]
    pub fn attach_identity(sealed: SealedIdentity, now: DateTime<Utc>) -> Self {
        Self {
            identity: Some(Some(sealed)),
            ..Self::touch(now)
        }
    }

    /// Clears the stored identity, status unchanged.
    #[must_use]
    pub fn clear_identity(now: DateTime<Utc>) -> Self {
        Self {
            identity: Some(None),
            ..Self::touch(now)
        }
    }

    /// Moves to `active` and stamps the activation time.
    #[must_use]
    pub fn activate(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(LicenseStatus::Active),
            activated_at: Some(now),
            ..Self::touch(now)
        }
    }

    /// Moves to `expired`.
    #[must_use]
    pub fn expire(now: DateTime<Utc>) -> Self {
        Self {
            status: Some(LicenseStatus::Expired),
            ..Self::touch(now)
        }
    }

    /// Applies the change to an in-memory record.
    pub fn apply_to(&self, license: &mut License) {
        if let Some(status) = self.status {
            license.status = status;
        }
        if let Some(identity) = &self.identity {
            license.identity = identity.clone();
        }
        if let Some(at) = self.activated_at {
            license.activated_at = Some(at);
        }
        if let Some(expires_at) = self.expires_at {
            license.expires_at = expires_at;
        }
        license.updated_at = self.updated_at;
    }
}

/// Who is calling an authenticated operation.
///
/// Authentication happens upstream; this only carries the resolved account
/// and whether it holds the admin role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub account: AccountId,
    pub is_admin: bool,
}

impl Actor {
    /// An application owner.
    #[must_use]
    pub const fn owner(account: AccountId) -> Self {
        Self {
            account,
            is_admin: false,
        }
    }

    /// An administrator, who can see and act on every application.
    #[must_use]
    pub const fn admin(account: AccountId) -> Self {
        Self {
            account,
            is_admin: true,
        }
    }

    /// Returns true if this actor may manage `application`.
    #[must_use]
    pub fn can_manage(&self, application: &Application) -> bool {
        self.is_admin || application.owner == self.account
    }
}

/// Record of one administrative override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub license_id: LicenseId,
    pub actor: AccountId,
    pub from: LicenseStatus,
    pub to: LicenseStatus,
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

/// Store-level license filter. Every `Some` narrows the result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LicenseFilter {
    /// Restrict to these applications. `None` means all applications.
    pub applications: Option<Vec<ApplicationId>>,
    pub status: Option<LicenseStatus>,
    /// Substring match on the key string.
    pub key_contains: Option<String>,
    pub has_identity: Option<bool>,
    /// Only licenses created at or after this instant.
    pub created_since: Option<DateTime<Utc>>,
}

impl LicenseFilter {
    /// Returns true if `license` passes every set criterion.
    #[must_use]
    pub fn matches(&self, license: &License) -> bool {
        if let Some(apps) = &self.applications {
            if !apps.contains(&license.application_id) {
                return false;
            }
        }
        if let Some(status) = self.status {
            if license.status != status {
                return false;
            }
        }
        if let Some(needle) = &self.key_contains {
            if !license.key.contains(needle.as_str()) {
                return false;
            }
        }
        if let Some(has_identity) = self.has_identity {
            if license.has_identity() != has_identity {
                return false;
            }
        }
        if let Some(since) = self.created_since {
            if license.created_at < since {
                return false;
            }
        }
        true
    }
}

/// Per-status license counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub total: u64,
    pub pending: u64,
    pub active: u64,
    pub expired: u64,
    pub revoked: u64,
}

impl StatusCounts {
    /// Counts one license with `status`.
    pub fn record(&mut self, status: LicenseStatus) {
        self.total += 1;
        match status {
            LicenseStatus::Pending => self.pending += 1,
            LicenseStatus::Active => self.active += 1,
            LicenseStatus::Expired => self.expired += 1,
            LicenseStatus::Revoked => self.revoked += 1,
        }
    }
}
