//! SQLite adapter errors and their mapping onto [`StoreError`].

use keyward_license::StoreError;
use thiserror::Error;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite: {0}")]
    Database(#[from] rusqlite::Error),

    /// Creating the database directory failed.
    #[error("database path: {0}")]
    Io(#[from] std::io::Error),

    /// A row held a value no record type accepts (bad uuid, status, format).
    #[error("corrupt row: {0}")]
    InvalidData(String),

    /// An application delete found licenses still referencing it.
    #[error("application still owns {0} license(s)")]
    ApplicationInUse(u64),
}

impl From<StorageError> for StoreError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ApplicationInUse(n) => StoreError::ApplicationInUse(n),
            other => StoreError::Backend(Box::new(other)),
        }
    }
}

/// Returns true if `err` is a UNIQUE constraint violation.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}
