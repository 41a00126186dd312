use super::KeyValueStore;
use crate::error::StorageError;

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// The structured backend: a single SQLite table.
#[derive(Debug)]
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Opens (or creates) the database at `path` and runs migrations.
  pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
      if !parent.as_os_str().is_empty() {
        std::fs::create_dir_all(parent)?;
      }
    }
    Self::from_connection(Connection::open(path)?)
  }

  /// An in-memory database, gone when the store is dropped.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self, StorageError> {
    conn.execute_batch(SCHEMA)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }
}

impl KeyValueStore for SqliteStore {
  fn name(&self) -> &'static str {
    "sqlite"
  }

  fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
    let conn = self.conn.lock();
    let value = conn
      .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
        row.get::<_, String>(0)
      })
      .optional()?;
    Ok(value)
  }

  fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
    let conn = self.conn.lock();
    conn.execute(
      "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
       ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
      params![key, value],
    )?;
    Ok(())
  }

  fn remove(&self, key: &str) -> Result<(), StorageError> {
    let conn = self.conn.lock();
    conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn upsert_and_remove() {
    let store = SqliteStore::open_in_memory().unwrap();
    assert_eq!(store.get("k").unwrap(), None);
    store.set("k", "one").unwrap();
    store.set("k", "two").unwrap();
    assert_eq!(store.get("k").unwrap().as_deref(), Some("two"));
    store.remove("k").unwrap();
    assert_eq!(store.get("k").unwrap(), None);
  }

  #[test]
  fn persists_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("cache.db");
    SqliteStore::open(&path).unwrap().set("k", "v").unwrap();
    let reopened = SqliteStore::open(&path).unwrap();
    assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
  }
}
