//! Row mapping for the licensing records.

use chrono::{DateTime, Utc};
use keyward_crypto::SealedIdentity;
use keyward_license::{Application, AuditEntry, KeyFormat, License, LicenseStatus};
use keyward_types::AppId;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, ToSql};

pub const APPLICATION_COLS: &str = "id, app_id, name, description, owner, key_prefix, segments, segment_length, delimiter, created_at, updated_at";

pub const LICENSE_COLS: &str = "id, license_key, status, identity, created_at, updated_at, activated_at, expires_at, application_id, created_by";

pub const AUDIT_COLS: &str = "license_id, actor, from_status, to_status, reason, at";

/// Constructs a record from a database row.
pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

/// Query for a single optional result.
pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> rusqlite::Result<Option<T>> {
    conn.query_row(sql, params, T::from_row).optional()
}

/// Query for multiple results.
pub fn query_all<T: FromRow, P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> rusqlite::Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, T::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn to_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn conversion<E>(col: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(col, Type::Text, Box::new(err))
}

fn timestamp(row: &Row, col: usize) -> rusqlite::Result<DateTime<Utc>> {
    let micros: i64 = row.get(col)?;
    DateTime::from_timestamp_micros(micros)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(col, micros))
}

fn opt_timestamp(row: &Row, col: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<i64>>(col)? {
        Some(micros) => DateTime::from_timestamp_micros(micros)
            .map(Some)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(col, micros)),
        None => Ok(None),
    }
}

fn uuid_col<T>(row: &Row, col: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    row.get::<_, String>(col)?
        .parse::<T>()
        .map_err(|e| conversion(col, e))
}

fn status(row: &Row, col: usize) -> rusqlite::Result<LicenseStatus> {
    row.get::<_, String>(col)?
        .parse::<LicenseStatus>()
        .map_err(|_| rusqlite::Error::InvalidColumnType(col, "status".to_string(), Type::Text))
}

impl FromRow for Application {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let delimiter: String = row.get(8)?;
        let delimiter = delimiter
            .chars()
            .next()
            .ok_or_else(|| rusqlite::Error::InvalidColumnType(8, "delimiter".into(), Type::Text))?;
        let format = KeyFormat::new(
            row.get::<_, String>(5)?,
            row.get(6)?,
            row.get(7)?,
            delimiter,
        )
        .map_err(|e| conversion(5, e))?;

        Ok(Self {
            id: uuid_col(row, 0)?,
            app_id: AppId::from_stored(row.get::<_, String>(1)?),
            name: row.get(2)?,
            description: row.get(3)?,
            owner: uuid_col(row, 4)?,
            format,
            created_at: timestamp(row, 9)?,
            updated_at: timestamp(row, 10)?,
        })
    }
}

impl FromRow for License {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_col(row, 0)?,
            key: row.get(1)?,
            status: status(row, 2)?,
            identity: row.get::<_, Option<String>>(3)?.map(SealedIdentity::from_stored),
            created_at: timestamp(row, 4)?,
            updated_at: timestamp(row, 5)?,
            activated_at: opt_timestamp(row, 6)?,
            expires_at: opt_timestamp(row, 7)?,
            application_id: uuid_col(row, 8)?,
            created_by: match row.get::<_, Option<String>>(9)? {
                Some(_) => Some(uuid_col(row, 9)?),
                None => None,
            },
        })
    }
}

impl FromRow for AuditEntry {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            license_id: uuid_col(row, 0)?,
            actor: uuid_col(row, 1)?,
            from: status(row, 2)?,
            to: status(row, 3)?,
            reason: row.get(4)?,
            at: timestamp(row, 5)?,
        })
    }
}
