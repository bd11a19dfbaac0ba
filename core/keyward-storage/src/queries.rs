use keyward_license::{
    Application, AuditEntry, License, LicenseChange, LicenseFilter, LicenseStatus, StatusCounts,
};
use keyward_types::{AccountId, AppId, ApplicationId, LicenseId};
use rusqlite::{
    Connection, OptionalExtension, Transaction, TransactionBehavior, params, params_from_iter,
    types::Value,
};

use crate::error::{StorageError, StorageResult};
use crate::from_row::{
    APPLICATION_COLS, AUDIT_COLS, FromRow, LICENSE_COLS, query_all, query_one, to_micros,
};

/// Builder for a conditional license UPDATE with optional fields.
struct LicenseUpdate {
    fields: Vec<(&'static str, Value)>,
}

impl LicenseUpdate {
    fn from_change(change: &LicenseChange) -> Self {
        let mut update = Self { fields: Vec::new() };
        if let Some(status) = change.status {
            update.set("status", status.as_str().to_string());
        }
        if let Some(identity) = &change.identity {
            let value = identity
                .as_ref()
                .map_or(Value::Null, |sealed| Value::from(sealed.as_str().to_string()));
            update.set("identity", value);
        }
        if let Some(at) = change.activated_at {
            update.set("activated_at", to_micros(at));
        }
        if let Some(expires_at) = change.expires_at {
            let value = expires_at.map_or(Value::Null, |at| Value::from(to_micros(at)));
            update.set("expires_at", value);
        }
        update.set("updated_at", to_micros(change.updated_at));
        update
    }

    fn set(&mut self, column: &'static str, value: impl Into<Value>) {
        self.fields.push((column, value.into()));
    }

    /// Applies the update if the license still has status `expected` and
    /// returns the updated row.
    fn execute_if(
        self,
        conn: &Connection,
        id: LicenseId,
        expected: LicenseStatus,
    ) -> StorageResult<Option<License>> {
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{col} = ?"))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(id.to_string().into());
        values.push(expected.as_str().to_string().into());
        let sql = format!(
            "UPDATE licenses SET {} WHERE id = ? AND status = ? RETURNING {LICENSE_COLS}",
            sets.join(", ")
        );
        Ok(conn
            .query_row(&sql, params_from_iter(values), License::from_row)
            .optional()?)
    }
}

/// Escapes `%`, `_` and `\` for a `LIKE ... ESCAPE '\'` pattern.
fn like_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Renders a license filter as a WHERE clause with positional parameters.
fn filter_clause(filter: &LicenseFilter) -> (String, Vec<Value>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(apps) = &filter.applications {
        if apps.is_empty() {
            conditions.push("0".to_string());
        } else {
            let marks = vec!["?"; apps.len()].join(", ");
            conditions.push(format!("application_id IN ({marks})"));
            values.extend(apps.iter().map(|id| Value::from(id.to_string())));
        }
    }
    if let Some(status) = filter.status {
        conditions.push("status = ?".to_string());
        values.push(status.as_str().to_string().into());
    }
    if let Some(needle) = &filter.key_contains {
        conditions.push("license_key LIKE ? ESCAPE '\\'".to_string());
        values.push(like_pattern(needle).into());
    }
    match filter.has_identity {
        Some(true) => conditions.push("identity IS NOT NULL".to_string()),
        Some(false) => conditions.push("identity IS NULL".to_string()),
        None => {}
    }
    if let Some(since) = filter.created_since {
        conditions.push("created_at >= ?".to_string());
        values.push(to_micros(since).into());
    }

    let clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    (clause, values)
}

// ============ Applications ============

pub fn insert_application(conn: &Connection, app: &Application) -> StorageResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO applications ({APPLICATION_COLS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
        ),
        params![
            app.id.to_string(),
            app.app_id.as_str(),
            &app.name,
            &app.description,
            app.owner.to_string(),
            app.format.prefix(),
            app.format.segments(),
            app.format.segment_length(),
            app.format.delimiter().to_string(),
            to_micros(app.created_at),
            to_micros(app.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_application(conn: &Connection, app: &Application) -> StorageResult<bool> {
    let affected = conn.execute(
        "UPDATE applications SET name = ?1, description = ?2, key_prefix = ?3, segments = ?4, \
         segment_length = ?5, delimiter = ?6, updated_at = ?7 WHERE id = ?8",
        params![
            &app.name,
            &app.description,
            app.format.prefix(),
            app.format.segments(),
            app.format.segment_length(),
            app.format.delimiter().to_string(),
            to_micros(app.updated_at),
            app.id.to_string(),
        ],
    )?;
    Ok(affected > 0)
}

pub fn get_application(conn: &Connection, id: ApplicationId) -> StorageResult<Option<Application>> {
    Ok(query_one(
        conn,
        &format!("SELECT {APPLICATION_COLS} FROM applications WHERE id = ?1"),
        &[&id.to_string()],
    )?)
}

pub fn find_application(conn: &Connection, app_id: &AppId) -> StorageResult<Option<Application>> {
    Ok(query_one(
        conn,
        &format!("SELECT {APPLICATION_COLS} FROM applications WHERE app_id = ?1"),
        &[&app_id.as_str()],
    )?)
}

pub fn list_applications(
    conn: &Connection,
    owner: Option<AccountId>,
) -> StorageResult<Vec<Application>> {
    Ok(match owner {
        Some(owner) => query_all(
            conn,
            &format!(
                "SELECT {APPLICATION_COLS} FROM applications WHERE owner = ?1 \
                 ORDER BY created_at DESC, id DESC"
            ),
            params![owner.to_string()],
        )?,
        None => query_all(
            conn,
            &format!(
                "SELECT {APPLICATION_COLS} FROM applications ORDER BY created_at DESC, id DESC"
            ),
            [],
        )?,
    })
}

/// Deletes an application with no licenses. The count and the delete share
/// an IMMEDIATE transaction, so no license can be inserted in between.
pub fn delete_application(conn: &Connection, id: ApplicationId) -> StorageResult<bool> {
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let owned: i64 = tx.query_row(
        "SELECT COUNT(*) FROM licenses WHERE application_id = ?1",
        params![id.to_string()],
        |row| row.get(0),
    )?;
    if owned > 0 {
        return Err(StorageError::ApplicationInUse(u64::try_from(owned).unwrap_or(0)));
    }
    let deleted = tx.execute("DELETE FROM applications WHERE id = ?1", params![id.to_string()])?;
    tx.commit()?;
    Ok(deleted > 0)
}

// ============ Licenses ============

pub fn key_exists(conn: &Connection, key: &str) -> StorageResult<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM licenses WHERE license_key = ?1)",
        params![key],
        |row| row.get(0),
    )?)
}

pub fn insert_license(conn: &Connection, license: &License) -> StorageResult<()> {
    conn.execute(
        &format!(
            "INSERT INTO licenses ({LICENSE_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
        ),
        params![
            license.id.to_string(),
            &license.key,
            license.status.as_str(),
            license.identity.as_ref().map(|s| s.as_str()),
            to_micros(license.created_at),
            to_micros(license.updated_at),
            license.activated_at.map(to_micros),
            license.expires_at.map(to_micros),
            license.application_id.to_string(),
            license.created_by.map(|a| a.to_string()),
        ],
    )?;
    Ok(())
}

pub fn get_license(conn: &Connection, id: LicenseId) -> StorageResult<Option<License>> {
    Ok(query_one(
        conn,
        &format!("SELECT {LICENSE_COLS} FROM licenses WHERE id = ?1"),
        &[&id.to_string()],
    )?)
}

pub fn find_license(
    conn: &Connection,
    application: ApplicationId,
    key: &str,
) -> StorageResult<Option<License>> {
    Ok(query_one(
        conn,
        &format!(
            "SELECT {LICENSE_COLS} FROM licenses WHERE license_key = ?1 AND application_id = ?2"
        ),
        &[&key, &application.to_string()],
    )?)
}

pub fn list_licenses(
    conn: &Connection,
    filter: &LicenseFilter,
    offset: u64,
    limit: Option<u64>,
) -> StorageResult<(Vec<License>, u64)> {
    let (clause, values) = filter_clause(filter);

    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM licenses {clause}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    // SQLite treats a negative LIMIT as unbounded.
    let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    let mut page_values = values;
    page_values.push(limit.into());
    page_values.push(offset.into());

    let items = query_all(
        conn,
        &format!(
            "SELECT {LICENSE_COLS} FROM licenses {clause} \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        ),
        params_from_iter(page_values),
    )?;
    Ok((items, u64::try_from(total).unwrap_or(0)))
}

pub fn count_licenses(conn: &Connection, filter: &LicenseFilter) -> StorageResult<StatusCounts> {
    let (clause, values) = filter_clause(filter);
    let mut stmt = conn.prepare(&format!(
        "SELECT status, COUNT(*) FROM licenses {clause} GROUP BY status"
    ))?;
    let rows = stmt.query_map(params_from_iter(values), |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    let mut counts = StatusCounts::default();
    for row in rows {
        let (status, n) = row?;
        let n = u64::try_from(n).unwrap_or(0);
        counts.total += n;
        match status.parse::<LicenseStatus>() {
            Ok(LicenseStatus::Pending) => counts.pending += n,
            Ok(LicenseStatus::Active) => counts.active += n,
            Ok(LicenseStatus::Expired) => counts.expired += n,
            Ok(LicenseStatus::Revoked) => counts.revoked += n,
            Err(_) => {
                return Err(StorageError::InvalidData(format!(
                    "unknown license status {status:?}"
                )));
            }
        }
    }
    Ok(counts)
}

pub fn compare_and_swap(
    conn: &Connection,
    id: LicenseId,
    expected: LicenseStatus,
    change: &LicenseChange,
) -> StorageResult<Option<License>> {
    LicenseUpdate::from_change(change).execute_if(conn, id, expected)
}

pub fn delete_license(conn: &Connection, id: LicenseId) -> StorageResult<bool> {
    let deleted = conn.execute("DELETE FROM licenses WHERE id = ?1", params![id.to_string()])?;
    Ok(deleted > 0)
}

// ============ Audit ============

pub fn append_audit(conn: &Connection, entry: &AuditEntry) -> StorageResult<()> {
    conn.execute(
        &format!("INSERT INTO license_audit ({AUDIT_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            entry.license_id.to_string(),
            entry.actor.to_string(),
            entry.from.as_str(),
            entry.to.as_str(),
            &entry.reason,
            to_micros(entry.at),
        ],
    )?;
    Ok(())
}

pub fn audit_trail(conn: &Connection, id: LicenseId) -> StorageResult<Vec<AuditEntry>> {
    Ok(query_all(
        conn,
        &format!("SELECT {AUDIT_COLS} FROM license_audit WHERE license_id = ?1 ORDER BY id"),
        params![id.to_string()],
    )?)
}

#[cfg(test)]
mod tests {
    use super::like_pattern;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("AB_C"), "%AB\\_C%");
        assert_eq!(like_pattern("50%"), "%50\\%%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
