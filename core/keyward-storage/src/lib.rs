//! SQLite storage layer for Keyward.
//!
//! Provides a persistent [`keyward_license::LicenseStore`] using SQLite via
//! `rusqlite` (bundled build, no system library required).
//!
//! # Architecture
//!
//! - Applications, licenses and the override audit trail live in three tables
//! - License keys carry a UNIQUE constraint, which is the final arbiter for
//!   key collisions during issuance
//! - Review and expiry writes are conditional `UPDATE ... WHERE status = ?`
//!   statements
//! - The schema is created automatically on open

mod error;
mod from_row;
mod license_store;
mod queries;
mod schema;

pub use error::{StorageError, StorageResult};
pub use license_store::SqliteStore;
