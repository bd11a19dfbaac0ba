//! The public activation workflow: apply, review, verify.
//!
//! 1. Client software calls [`ActivationWorkflow::apply`] with a pending key
//!    and the holder's identity. The identity is sealed and stored; the
//!    license stays `pending`.
//! 2. An owner or admin calls [`ActivationWorkflow::process`] to approve
//!    (license becomes `active`) or reject (identity is cleared so the holder
//!    can apply again).
//! 3. Client software calls [`ActivationWorkflow::verify`] on every launch.
//!    Active licenses past their expiry are moved to `expired` here.

use crate::error::{LicenseError, LicenseResult};
use crate::lifecycle::{self, LicenseStatus};
use crate::model::{Actor, Application, License, LicenseChange, LicenseFilter};
use crate::responses::PendingKey;
use crate::store::LicenseStore;
use chrono::{DateTime, Utc};
use keyward_crypto::IdentityVault;
use keyward_types::{AppId, Clock, HolderIdentity, LicenseId};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reviewer decision on a submitted application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    #[must_use]
    pub fn from_approved(approved: bool) -> Self {
        if approved { Self::Approve } else { Self::Reject }
    }
}

/// Outcome of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    /// True only for an active, unexpired license.
    pub valid: bool,
    pub status: LicenseStatus,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Orchestrates the apply/approve/reject process and verification.
pub struct ActivationWorkflow<S> {
    store: Arc<S>,
    vault: Arc<IdentityVault>,
    clock: Arc<dyn Clock>,
}

impl<S> Clone for ActivationWorkflow<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            vault: Arc::clone(&self.vault),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: LicenseStore> ActivationWorkflow<S> {
    pub fn new(store: Arc<S>, vault: Arc<IdentityVault>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            vault,
            clock,
        }
    }

    /// Attaches a holder identity to a pending license.
    ///
    /// Re-applying while still pending replaces the previous submission.
    pub fn apply(
        &self,
        license_key: &str,
        app_id: &str,
        identity: &HolderIdentity,
    ) -> LicenseResult<(License, Application)> {
        let (application, license) = self.resolve(license_key, app_id)?;

        if license.status != LicenseStatus::Pending {
            return Err(LicenseError::invalid_state(license.status, "apply for activation"));
        }

        let sealed = self.vault.seal(identity)?;
        let change = LicenseChange::attach_identity(sealed, self.clock.now());
        let updated = self.swap_pending(license.id, &change, "apply for activation")?;

        info!(license = %updated.id, application = %application.id, "activation application submitted");
        Ok((updated, application))
    }

    /// Like [`apply`](Self::apply), accepting the identity as untyped JSON
    /// straight from a request body. Anything but an object is rejected.
    pub fn apply_json(
        &self,
        license_key: &str,
        app_id: &str,
        identity: Value,
    ) -> LicenseResult<(License, Application)> {
        let identity = HolderIdentity::try_from(identity)
            .map_err(|e| LicenseError::Validation(e.to_string()))?;
        self.apply(license_key, app_id, &identity)
    }

    /// Approves or rejects a pending license.
    ///
    /// The pending precondition is enforced atomically with the write, so of
    /// two concurrent approvals exactly one succeeds and the other observes
    /// `InvalidState`.
    pub fn process(
        &self,
        actor: &Actor,
        license_id: LicenseId,
        decision: Decision,
    ) -> LicenseResult<License> {
        let license = self
            .store
            .get_license(license_id)?
            .ok_or_else(|| LicenseError::NotFound(format!("license {license_id}")))?;

        let application = self
            .store
            .get_application(license.application_id)?
            .ok_or_else(|| LicenseError::NotFound(format!("application {}", license.application_id)))?;

        if !actor.can_manage(&application) {
            return Err(LicenseError::Forbidden(
                "not allowed to process applications for this application".to_string(),
            ));
        }

        if license.status != LicenseStatus::Pending {
            return Err(LicenseError::invalid_state(license.status, "process application"));
        }

        let now = self.clock.now();
        let change = match decision {
            Decision::Approve => LicenseChange::activate(now),
            Decision::Reject => LicenseChange::clear_identity(now),
        };
        let updated = self.swap_pending(license_id, &change, "process application")?;

        match decision {
            Decision::Approve => info!(license = %license_id, actor = %actor.account, "license approved"),
            Decision::Reject => info!(license = %license_id, actor = %actor.account, "license application rejected"),
        }
        Ok(updated)
    }

    /// Checks a key for client software.
    ///
    /// Read-only except for lazy expiry: an active license found past its
    /// expiry is persisted as `expired` before reporting.
    pub fn verify(&self, license_key: &str, app_id: &str) -> LicenseResult<Verification> {
        let (_, license) = self.resolve(license_key, app_id)?;
        let now = self.clock.now();

        let mut status = license.status;
        if lifecycle::expiry_due(&license, now) {
            status = LicenseStatus::Expired;
            // Best effort: if another verify already expired it, or the
            // write fails, the result is the same.
            match self
                .store
                .compare_and_swap(license.id, LicenseStatus::Active, &LicenseChange::expire(now))
            {
                Ok(Some(_)) => info!(license = %license.id, "license expired"),
                Ok(None) => debug!(license = %license.id, "license already moved off active"),
                Err(e) => warn!(license = %license.id, "failed to persist lazy expiry: {e}"),
            }
        }

        Ok(Verification {
            valid: status == LicenseStatus::Active,
            status,
            expires_at: license.expires_at,
        })
    }

    /// Lists the pending keys of an application, newest first.
    pub fn pending_keys(&self, app_id: &str) -> LicenseResult<Vec<PendingKey>> {
        let application = self.resolve_application(app_id)?;
        let filter = LicenseFilter {
            applications: Some(vec![application.id]),
            status: Some(LicenseStatus::Pending),
            ..LicenseFilter::default()
        };
        let (licenses, _) = self.store.list_licenses(&filter, 0, None)?;
        Ok(licenses.iter().map(PendingKey::from).collect())
    }

    fn resolve_application(&self, app_id: &str) -> LicenseResult<Application> {
        let app_id = app_id.trim();
        if app_id.is_empty() {
            return Err(LicenseError::Validation("app id must not be empty".to_string()));
        }
        self.store
            .find_application(&AppId::from_stored(app_id))?
            .ok_or_else(|| LicenseError::NotFound(format!("application {app_id}")))
    }

    fn resolve(&self, license_key: &str, app_id: &str) -> LicenseResult<(Application, License)> {
        let license_key = license_key.trim();
        if license_key.is_empty() {
            return Err(LicenseError::Validation("license key must not be empty".to_string()));
        }
        let application = self.resolve_application(app_id)?;

        debug!(application = %application.id, "resolving license key");
        let license = self
            .store
            .find_license(application.id, license_key)?
            .ok_or_else(|| {
                LicenseError::NotFound("license key for this application".to_string())
            })?;
        Ok((application, license))
    }

    fn swap_pending(
        &self,
        id: LicenseId,
        change: &LicenseChange,
        action: &str,
    ) -> LicenseResult<License> {
        if let Some(updated) = self
            .store
            .compare_and_swap(id, LicenseStatus::Pending, change)?
        {
            return Ok(updated);
        }
        // Lost a race: report whatever the license turned into.
        match self.store.get_license(id)? {
            Some(current) => Err(LicenseError::invalid_state(current.status, action)),
            None => Err(LicenseError::NotFound(format!("license {id}"))),
        }
    }
}
