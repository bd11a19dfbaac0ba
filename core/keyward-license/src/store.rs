//! The persistence seam.
//!
//! The licensing core never talks to a database directly; it depends on
//! `Arc<impl LicenseStore>`. [`MemoryStore`] backs tests and embedded use,
//! the `keyward-storage` crate provides a SQLite implementation.
//!
//! Implementations must make [`LicenseStore::compare_and_swap`] atomic with
//! respect to other writers: the status check and the write happen as one
//! step, so two concurrent approvals of the same pending license cannot both
//! succeed.

use crate::lifecycle::LicenseStatus;
use crate::model::{Application, AuditEntry, License, LicenseChange, LicenseFilter, StatusCounts};
use keyward_types::{AccountId, AppId, ApplicationId, LicenseId};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

/// Errors reported by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The license key is already taken.
    #[error("duplicate license key: {0}")]
    DuplicateKey(String),

    /// The external app id is already taken.
    #[error("duplicate app id: {0}")]
    DuplicateAppId(String),

    /// The application still owns this many licenses.
    #[error("application still owns {0} license(s)")]
    ApplicationInUse(u64),

    /// Any other backend failure.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence operations the licensing core relies on.
pub trait LicenseStore: Send + Sync {
    // ── Applications ────────────────────────────────────────────

    /// Inserts a new application. Fails with `DuplicateAppId` on collision.
    fn insert_application(&self, application: &Application) -> StoreResult<()>;

    /// Overwrites an existing application. Returns false if it is absent.
    fn update_application(&self, application: &Application) -> StoreResult<bool>;

    fn get_application(&self, id: ApplicationId) -> StoreResult<Option<Application>>;

    /// Resolves an application by its external id.
    fn find_application(&self, app_id: &AppId) -> StoreResult<Option<Application>>;

    /// Lists applications, newest first, optionally restricted to one owner.
    fn list_applications(&self, owner: Option<AccountId>) -> StoreResult<Vec<Application>>;

    /// Deletes an application. Fails with `ApplicationInUse` while any
    /// license references it; the check and the delete are one step.
    fn delete_application(&self, id: ApplicationId) -> StoreResult<bool>;

    // ── Licenses ────────────────────────────────────────────────

    /// Returns true if any application already uses `key`.
    fn key_exists(&self, key: &str) -> StoreResult<bool>;

    /// Inserts a license. Fails with `DuplicateKey` if the key is taken.
    fn insert_license(&self, license: &License) -> StoreResult<()>;

    fn get_license(&self, id: LicenseId) -> StoreResult<Option<License>>;

    /// Resolves a key scoped to one application.
    fn find_license(&self, application: ApplicationId, key: &str) -> StoreResult<Option<License>>;

    /// Lists matching licenses newest first, with the total match count.
    /// `limit: None` returns everything from `offset` on.
    fn list_licenses(
        &self,
        filter: &LicenseFilter,
        offset: u64,
        limit: Option<u64>,
    ) -> StoreResult<(Vec<License>, u64)>;

    /// Per-status counts of the licenses matching `filter`.
    fn count_licenses(&self, filter: &LicenseFilter) -> StoreResult<StatusCounts>;

    fn count_by_status(&self, application: ApplicationId) -> StoreResult<StatusCounts> {
        self.count_licenses(&LicenseFilter {
            applications: Some(vec![application]),
            ..LicenseFilter::default()
        })
    }

    /// Applies `change` only if the license currently has status `expected`.
    /// Returns the updated record, or `None` if the license is absent or its
    /// status differs.
    fn compare_and_swap(
        &self,
        id: LicenseId,
        expected: LicenseStatus,
        change: &LicenseChange,
    ) -> StoreResult<Option<License>>;

    fn delete_license(&self, id: LicenseId) -> StoreResult<bool>;

    // ── Audit ───────────────────────────────────────────────────

    fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()>;

    /// Override history of one license, oldest first.
    fn audit_trail(&self, id: LicenseId) -> StoreResult<Vec<AuditEntry>>;
}

#[derive(Default)]
struct MemoryInner {
    applications: HashMap<ApplicationId, Application>,
    licenses: HashMap<LicenseId, License>,
    keys: HashMap<String, LicenseId>,
    audit: Vec<AuditEntry>,
}

/// In-process store guarded by a single `RwLock`.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<MemoryInner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl LicenseStore for MemoryStore {
    fn insert_application(&self, application: &Application) -> StoreResult<()> {
        let mut inner = self.write();
        if inner
            .applications
            .values()
            .any(|existing| existing.app_id == application.app_id)
        {
            return Err(StoreError::DuplicateAppId(application.app_id.to_string()));
        }
        inner
            .applications
            .insert(application.id, application.clone());
        Ok(())
    }

    fn update_application(&self, application: &Application) -> StoreResult<bool> {
        let mut inner = self.write();
        match inner.applications.get_mut(&application.id) {
            Some(slot) => {
                *slot = application.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn get_application(&self, id: ApplicationId) -> StoreResult<Option<Application>> {
        Ok(self.read().applications.get(&id).cloned())
    }

    fn find_application(&self, app_id: &AppId) -> StoreResult<Option<Application>> {
        Ok(self
            .read()
            .applications
            .values()
            .find(|a| &a.app_id == app_id)
            .cloned())
    }

    fn list_applications(&self, owner: Option<AccountId>) -> StoreResult<Vec<Application>> {
        let mut apps: Vec<Application> = self
            .read()
            .applications
            .values()
            .filter(|a| owner.is_none_or(|o| a.owner == o))
            .cloned()
            .collect();
        apps.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(apps)
    }

    fn delete_application(&self, id: ApplicationId) -> StoreResult<bool> {
        let mut inner = self.write();
        let owned = inner
            .licenses
            .values()
            .filter(|l| l.application_id == id)
            .count() as u64;
        if owned > 0 {
            return Err(StoreError::ApplicationInUse(owned));
        }
        Ok(inner.applications.remove(&id).is_some())
    }

    fn key_exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.read().keys.contains_key(key))
    }

    fn insert_license(&self, license: &License) -> StoreResult<()> {
        let mut inner = self.write();
        if inner.keys.contains_key(&license.key) {
            return Err(StoreError::DuplicateKey(license.key.clone()));
        }
        inner.keys.insert(license.key.clone(), license.id);
        inner.licenses.insert(license.id, license.clone());
        Ok(())
    }

    fn get_license(&self, id: LicenseId) -> StoreResult<Option<License>> {
        Ok(self.read().licenses.get(&id).cloned())
    }

    fn find_license(&self, application: ApplicationId, key: &str) -> StoreResult<Option<License>> {
        let inner = self.read();
        Ok(inner
            .keys
            .get(key)
            .and_then(|id| inner.licenses.get(id))
            .filter(|l| l.application_id == application)
            .cloned())
    }

    fn list_licenses(
        &self,
        filter: &LicenseFilter,
        offset: u64,
        limit: Option<u64>,
    ) -> StoreResult<(Vec<License>, u64)> {
        let inner = self.read();
        let mut matching: Vec<&License> = inner
            .licenses
            .values()
            .filter(|l| filter.matches(l))
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);
        let page = matching.into_iter().skip(skip).take(take).cloned().collect();
        Ok((page, total))
    }

    fn count_licenses(&self, filter: &LicenseFilter) -> StoreResult<StatusCounts> {
        let mut counts = StatusCounts::default();
        for license in self.read().licenses.values().filter(|l| filter.matches(l)) {
            counts.record(license.status);
        }
        Ok(counts)
    }

    fn compare_and_swap(
        &self,
        id: LicenseId,
        expected: LicenseStatus,
        change: &LicenseChange,
    ) -> StoreResult<Option<License>> {
        let mut inner = self.write();
        match inner.licenses.get_mut(&id) {
            Some(license) if license.status == expected => {
                change.apply_to(license);
                Ok(Some(license.clone()))
            }
            _ => Ok(None),
        }
    }

    fn delete_license(&self, id: LicenseId) -> StoreResult<bool> {
        let mut inner = self.write();
        match inner.licenses.remove(&id) {
            Some(license) => {
                inner.keys.remove(&license.key);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
        self.write().audit.push(entry.clone());
        Ok(())
    }

    fn audit_trail(&self, id: LicenseId) -> StoreResult<Vec<AuditEntry>> {
        Ok(self
            .read()
            .audit
            .iter()
            .filter(|e| e.license_id == id)
            .cloned()
            .collect())
    }
}
