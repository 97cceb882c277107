//! v001 -- Initial schema creation.
//!
//! The cache is a single namespaced key/value table. Every value is a whole
//! serialized blob (a collection, the image table, a scalar) and is always
//! replaced wholesale.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Key/value cache
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS kv (
    key        TEXT PRIMARY KEY NOT NULL,   -- "<app id>_<name>"
    value      TEXT NOT NULL,               -- JSON or scalar text
    updated_at TEXT NOT NULL                -- ISO-8601 / RFC-3339
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
