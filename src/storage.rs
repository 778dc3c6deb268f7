//! Persistent key-value slots backed by SQLite
//!
//! The history is a single JSON document under one key. Writes replace the
//! whole value in one statement, so a reader never sees a half-written slot.

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::DiabRiskError;

/// Named slots holding string values
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, DiabRiskError>;
    fn set(&self, key: &str, value: &str) -> Result<(), DiabRiskError>;
    fn remove(&self, key: &str) -> Result<(), DiabRiskError>;
}

/// SQLite database of key-value slots
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create or open a database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DiabRiskError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Private database that disappears with the connection
    #[cfg(test)]
    pub fn in_memory() -> Result<Self, DiabRiskError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, DiabRiskError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT DEFAULT CURRENT_TIMESTAMP
            );",
        )?;
        Ok(Self { conn })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, DiabRiskError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DiabRiskError> {
        self.conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DiabRiskError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Volatile store, used by tests and when the database cannot be opened
#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: RefCell<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, DiabRiskError> {
        Ok(self.slots.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DiabRiskError> {
        self.slots.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DiabRiskError> {
        self.slots.borrow_mut().remove(key);
        Ok(())
    }
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> Result<Option<String>, DiabRiskError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), DiabRiskError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), DiabRiskError> {
        (**self).remove(key)
    }
}
