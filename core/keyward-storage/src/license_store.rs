//! SQLite-backed [`LicenseStore`].

use crate::error::{StorageError, StorageResult, is_unique_violation};
use crate::{queries, schema};
use keyward_license::{
    Application, AuditEntry, License, LicenseChange, LicenseFilter, LicenseStatus, LicenseStore,
    StatusCounts, StoreError, StoreResult,
};
use keyward_types::{AccountId, AppId, ApplicationId, LicenseId};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

/// License store over a single SQLite connection.
///
/// All access is serialized through a mutex. Conditional writes are
/// expressed in SQL (`WHERE status = ?`), so they stay atomic even when
/// another process shares the database file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a database file and initializes the schema.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened license database");
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> StorageResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StorageResult<Self> {
        schema::init_db(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Maps a UNIQUE violation to `duplicate`, anything else to a backend error.
fn on_unique(err: StorageError, duplicate: impl FnOnce() -> StoreError) -> StoreError {
    match &err {
        StorageError::Database(e) if is_unique_violation(e) => duplicate(),
        _ => err.into(),
    }
}

impl LicenseStore for SqliteStore {
    fn insert_application(&self, application: &Application) -> StoreResult<()> {
        queries::insert_application(&self.conn(), application).map_err(|e| {
            on_unique(e, || StoreError::DuplicateAppId(application.app_id.to_string()))
        })
    }

    fn update_application(&self, application: &Application) -> StoreResult<bool> {
        Ok(queries::update_application(&self.conn(), application)?)
    }

    fn get_application(&self, id: ApplicationId) -> StoreResult<Option<Application>> {
        Ok(queries::get_application(&self.conn(), id)?)
    }

    fn find_application(&self, app_id: &AppId) -> StoreResult<Option<Application>> {
        Ok(queries::find_application(&self.conn(), app_id)?)
    }

    fn list_applications(&self, owner: Option<AccountId>) -> StoreResult<Vec<Application>> {
        Ok(queries::list_applications(&self.conn(), owner)?)
    }

    fn delete_application(&self, id: ApplicationId) -> StoreResult<bool> {
        Ok(queries::delete_application(&self.conn(), id)?)
    }

    fn key_exists(&self, key: &str) -> StoreResult<bool> {
        Ok(queries::key_exists(&self.conn(), key)?)
    }

    fn insert_license(&self, license: &License) -> StoreResult<()> {
        queries::insert_license(&self.conn(), license)
            .map_err(|e| on_unique(e, || StoreError::DuplicateKey(license.key.clone())))
    }

    fn get_license(&self, id: LicenseId) -> StoreResult<Option<License>> {
        Ok(queries::get_license(&self.conn(), id)?)
    }

    fn find_license(&self, application: ApplicationId, key: &str) -> StoreResult<Option<License>> {
        debug!(application = %application, "looking up license key");
        Ok(queries::find_license(&self.conn(), application, key)?)
    }

    fn list_licenses(
        &self,
        filter: &LicenseFilter,
        offset: u64,
        limit: Option<u64>,
    ) -> StoreResult<(Vec<License>, u64)> {
        Ok(queries::list_licenses(&self.conn(), filter, offset, limit)?)
    }

    fn count_licenses(&self, filter: &LicenseFilter) -> StoreResult<StatusCounts> {
        Ok(queries::count_licenses(&self.conn(), filter)?)
    }

    fn compare_and_swap(
        &self,
        id: LicenseId,
        expected: LicenseStatus,
        change: &LicenseChange,
    ) -> StoreResult<Option<License>> {
        Ok(queries::compare_and_swap(&self.conn(), id, expected, change)?)
    }

    fn delete_license(&self, id: LicenseId) -> StoreResult<bool> {
        Ok(queries::delete_license(&self.conn(), id)?)
    }

    fn append_audit(&self, entry: &AuditEntry) -> StoreResult<()> {
        Ok(queries::append_audit(&self.conn(), entry)?)
    }

    fn audit_trail(&self, id: LicenseId) -> StoreResult<Vec<AuditEntry>> {
        Ok(queries::audit_trail(&self.conn(), id)?)
    }
}
