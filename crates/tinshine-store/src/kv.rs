//! Namespaced key/value access.
//!
//! Every key is stored as `"<APP_ID>_<name>"` so the cache can share a file
//! with unrelated data. The free functions take a plain [`Connection`] so
//! they work the same inside and outside a transaction.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use tinshine_shared::constants::APP_ID;

use crate::database::Database;
use crate::error::Result;

pub(crate) fn namespaced(name: &str) -> String {
    format!("{APP_ID}_{name}")
}

pub(crate) fn get_raw(conn: &Connection, name: &str) -> Result<Option<String>> {
    let value = conn
        .query_row(
            "SELECT value FROM kv WHERE key = ?1",
            params![namespaced(name)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(value)
}

pub(crate) fn put_raw(conn: &Connection, name: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        params![namespaced(name), value, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

pub(crate) fn remove_raw(conn: &Connection, name: &str) -> Result<bool> {
    let affected = conn.execute("DELETE FROM kv WHERE key = ?1", params![namespaced(name)])?;
    Ok(affected > 0)
}

pub(crate) fn get_json<T: DeserializeOwned>(conn: &Connection, name: &str) -> Result<Option<T>> {
    match get_raw(conn, name)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub(crate) fn put_json<T: Serialize + ?Sized>(conn: &Connection, name: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    put_raw(conn, name, &raw)
}

impl Database {
    /// Read a raw value from the namespace.
    pub fn get_value(&self, name: &str) -> Result<Option<String>> {
        get_raw(self.conn(), name)
    }

    /// Replace a raw value in the namespace.
    pub fn put_value(&self, name: &str, value: &str) -> Result<()> {
        put_raw(self.conn(), name, value)
    }

    /// Remove a key; returns whether it existed.
    pub fn remove_value(&self, name: &str) -> Result<bool> {
        remove_raw(self.conn(), name)
    }

    /// All names currently stored in this application's namespace.
    pub fn names(&self) -> Result<Vec<String>> {
        let prefix = namespaced("");
        let mut stmt = self
            .conn()
            .prepare("SELECT key FROM kv WHERE substr(key, 1, ?1) = ?2 ORDER BY key ASC")?;
        let rows = stmt.query_map(params![prefix.len() as i64, prefix], |row| {
            row.get::<_, String>(0)
        })?;

        let mut names = Vec::new();
        for key in rows {
            let key = key?;
            names.push(key[prefix.len()..].to_string());
        }
        Ok(names)
    }
}
