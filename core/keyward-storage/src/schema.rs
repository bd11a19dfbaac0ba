use rusqlite::Connection;

/// Creates the schema if it does not exist yet.
///
/// Timestamps are stored as INTEGER microseconds since the Unix epoch.
pub fn init_db(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        -- Key search is a case-sensitive substring match
        PRAGMA case_sensitive_like = ON;

        -- Applications (product definitions owning a key format)
        CREATE TABLE IF NOT EXISTS applications (
            id TEXT PRIMARY KEY,
            app_id TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT,
            owner TEXT NOT NULL,
            key_prefix TEXT NOT NULL,
            segments INTEGER NOT NULL,
            segment_length INTEGER NOT NULL,
            delimiter TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_applications_owner ON applications(owner);

        -- Licenses (keys are unique across every application)
        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            license_key TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL CHECK (status IN ('pending', 'active', 'expired', 'revoked')),
            identity TEXT,  -- sealed holder identity, base64(nonce || ciphertext)
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            activated_at INTEGER,
            expires_at INTEGER,
            application_id TEXT NOT NULL REFERENCES applications(id),
            created_by TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_application ON licenses(application_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_licenses_status ON licenses(status);

        -- Override audit trail (kept after the license is deleted)
        CREATE TABLE IF NOT EXISTS license_audit (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            license_id TEXT NOT NULL,
            actor TEXT NOT NULL,
            from_status TEXT NOT NULL,
            to_status TEXT NOT NULL,
            reason TEXT,
            at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_license_audit_license ON license_audit(license_id);
        "#,
    )
}
