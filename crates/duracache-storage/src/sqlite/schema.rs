//! Table layout, PRAGMA tuning, and the v1→v2 migration

use rusqlite::Connection;

/// Current schema version. Bumping this requires adding a migration step
/// below, never rewriting history in place.
pub const SCHEMA_VERSION: i64 = 2;

/// Applies best-effort performance PRAGMAs, creates tables if absent, and
/// migrates a pre-existing v1 database forward. Idempotent: safe to call on
/// every open, including a database already at the current version.
///
/// Runs synchronously on the caller's thread — in this crate that is always
/// the dedicated queue worker thread, never a Tokio task (§5).
pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    apply_pragmas(conn);
    create_tables(conn)?;

    let version = read_schema_version(conn)?;
    if version < SCHEMA_VERSION {
        migrate_to_v2(conn)?;
    }

    Ok(())
}

fn apply_pragmas(conn: &Connection) {
    let pragmas: &[(&str, &str)] = &[
        ("journal_mode", "WAL"),
        ("temp_store", "MEMORY"),
        ("synchronous", "OFF"),
    ];
    for (name, value) in pragmas {
        if let Err(err) = conn.pragma_update(None, *name, *value) {
            tracing::debug!(pragma = %name, error = %err, "pragma rejected by this sqlite build, continuing");
        }
    }
}

fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS CacheElement (
            Key        TEXT    PRIMARY KEY,
            TypeName   TEXT    NULL,
            Value      BLOB    NOT NULL,
            Expiration INTEGER NOT NULL,
            CreatedAt  INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_cache_element_type ON CacheElement(TypeName);
        CREATE INDEX IF NOT EXISTS idx_cache_element_expiration ON CacheElement(Expiration);

        CREATE TABLE IF NOT EXISTS SchemaInfo (
            Version INTEGER NOT NULL
        );
        "#,
    )
}

fn read_schema_version(conn: &Connection) -> rusqlite::Result<i64> {
    let version: Option<i64> = conn
        .query_row("SELECT Version FROM SchemaInfo LIMIT 1", [], |row| row.get(0))
        .ok();
    Ok(version.unwrap_or(1))
}

fn migrate_to_v2(conn: &Connection) -> rusqlite::Result<()> {
    tracing::debug!("migrating cache schema to version 2");
    conn.execute_batch(
        r#"
        BEGIN IMMEDIATE;
        ALTER TABLE CacheElement RENAME TO VersionOneCacheElement;
        CREATE TABLE CacheElement (
            Key        TEXT    PRIMARY KEY,
            TypeName   TEXT    NULL,
            Value      BLOB    NOT NULL,
            Expiration INTEGER NOT NULL,
            CreatedAt  INTEGER NOT NULL
        );
        INSERT INTO CacheElement (Key, TypeName, Value, Expiration, CreatedAt)
            SELECT Key, TypeName, Value, Expiration, CAST(strftime('%s','now') AS INTEGER) * 10000000
            FROM VersionOneCacheElement;
        DROP TABLE VersionOneCacheElement;
        DELETE FROM SchemaInfo;
        INSERT INTO SchemaInfo (Version) VALUES (2);
        COMMIT;
        "#,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_database_ends_at_current_version() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT Version FROM SchemaInfo LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        initialize(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT Version FROM SchemaInfo LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn v1_database_migrates_and_preserves_rows() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE CacheElement (
                Key TEXT PRIMARY KEY,
                TypeName TEXT NULL,
                Value BLOB NOT NULL,
                Expiration INTEGER NOT NULL
            );
            INSERT INTO CacheElement (Key, TypeName, Value, Expiration) VALUES ('k1', NULL, X'01020304', 999999999999);
            "#,
        )
        .unwrap();

        initialize(&conn).unwrap();

        let version: i64 = conn
            .query_row("SELECT Version FROM SchemaInfo LIMIT 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let value: Vec<u8> = conn
            .query_row("SELECT Value FROM CacheElement WHERE Key = 'k1'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(value, vec![1, 2, 3, 4]);

        let created_at: i64 = conn
            .query_row("SELECT CreatedAt FROM CacheElement WHERE Key = 'k1'", [], |r| r.get(0))
            .unwrap();
        assert!(created_at > 0);
    }
}
