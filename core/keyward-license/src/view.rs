//! Read models returned to authenticated (owner/admin) callers.

use crate::lifecycle::LicenseStatus;
use crate::model::{Application, License, StatusCounts};
use chrono::{DateTime, Utc};
use keyward_crypto::IdentityVault;
use keyward_types::{AccountId, AppId, ApplicationId, HolderIdentity, LicenseId};
use serde::Serialize;
use tracing::warn;

/// Holder identity as exposed on a read path.
///
/// A blob that cannot be opened degrades to an error marker instead of
/// failing the whole read.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum IdentityView {
    Revealed(HolderIdentity),
    Unreadable { error: String },
}

impl IdentityView {
    /// Opens the license's sealed identity, if any.
    pub(crate) fn open(vault: &IdentityVault, license: &License) -> Option<Self> {
        let sealed = license.identity.as_ref()?;
        Some(match vault.open(sealed) {
            Ok(identity) => Self::Revealed(identity),
            Err(e) => {
                warn!(license = %license.id, "failed to open holder identity: {e}");
                Self::Unreadable {
                    error: "unable to decrypt holder identity".to_string(),
                }
            }
        })
    }

    /// Returns the decrypted identity, if readable.
    #[must_use]
    pub fn revealed(&self) -> Option<&HolderIdentity> {
        match self {
            Self::Revealed(identity) => Some(identity),
            Self::Unreadable { .. } => None,
        }
    }
}

/// Short application reference embedded in license views.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationSummary {
    pub id: ApplicationId,
    pub name: String,
    pub app_id: AppId,
}

impl From<&Application> for ApplicationSummary {
    fn from(app: &Application) -> Self {
        Self {
            id: app.id,
            name: app.name.clone(),
            app_id: app.app_id.clone(),
        }
    }
}

/// A license as shown in listings and detail pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseView {
    pub id: LicenseId,
    pub license_key: String,
    pub status: LicenseStatus,
    pub created_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub application: Option<ApplicationSummary>,
    pub created_by: Option<AccountId>,
    /// Only populated while the license is active.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_identity: Option<IdentityView>,
}

impl LicenseView {
    pub(crate) fn build(
        vault: &IdentityVault,
        license: &License,
        application: Option<&Application>,
    ) -> Self {
        let holder_identity = if license.status == LicenseStatus::Active {
            IdentityView::open(vault, license)
        } else {
            None
        };
        Self {
            id: license.id,
            license_key: license.key.clone(),
            status: license.status,
            created_at: license.created_at,
            activated_at: license.activated_at,
            expires_at: license.expires_at,
            application: application.map(ApplicationSummary::from),
            created_by: license.created_by,
            holder_identity,
        }
    }
}

/// A submitted activation request awaiting review.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingApplication {
    pub id: LicenseId,
    pub license_key: String,
    pub status: LicenseStatus,
    pub created_at: DateTime<Utc>,
    pub application: Option<ApplicationSummary>,
    pub created_by: Option<AccountId>,
    /// Decrypted for the reviewer regardless of status.
    pub holder_identity: Option<IdentityView>,
}

impl PendingApplication {
    pub(crate) fn build(
        vault: &IdentityVault,
        license: &License,
        application: Option<&Application>,
    ) -> Self {
        Self {
            id: license.id,
            license_key: license.key.clone(),
            status: license.status,
            created_at: license.created_at,
            application: application.map(ApplicationSummary::from),
            created_by: license.created_by,
            holder_identity: IdentityView::open(vault, license),
        }
    }
}

/// An application together with its license counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDetail {
    #[serde(flatten)]
    pub application: Application,
    pub stats: StatusCounts,
}

/// Fleet-wide counts for a dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LicenseStats {
    #[serde(flatten)]
    pub counts: StatusCounts,
    pub issued_today: u64,
    pub issued_this_week: u64,
    pub issued_this_month: u64,
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub total_pages: u64,
    pub current_page: u32,
}
