//! Key-value persistence backends and the namespaced bookmark record layout.
//!
//! All conversations share one record (the namespace key) holding a JSON object
//! that maps conversation ids to bookmark lists. Writing a conversation replaces
//! only its own entry; the other entries are carried over untouched.

use rusqlite::{params, OptionalExtension};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::HashMap;

use super::connection::Database;
use crate::types::bookmark::{now_millis, Bookmark};
use crate::types::errors::PersistenceError;

/// Raw get/set persistence supplied by the host environment.
pub trait StorageBackend {
    fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError>;
    fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError>;
}

/// Backend storing records in the `kv_store` SQLite table.
pub struct SqliteStorage {
    db: Database,
}

impl SqliteStorage {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

impl StorageBackend for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        let raw: Option<String> = self
            .db
            .connection()
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        let text = serde_json::to_string(&value)?;
        self.db.connection().execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, text, now_millis()],
        )?;
        Ok(())
    }
}

/// Backend keeping records in process memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: RefCell<HashMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageBackend for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        self.entries.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}

impl<B: StorageBackend + ?Sized> StorageBackend for std::rc::Rc<B> {
    fn get(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        (**self).set(key, value)
    }
}

/// Outcome of reading one conversation's list.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConversation {
    pub bookmarks: Vec<Bookmark>,
    /// Entries dropped because they could not be decoded or broke `start < end`.
    pub discarded: usize,
}

fn read_record(backend: &dyn StorageBackend, namespace: &str) -> Result<Map<String, Value>, PersistenceError> {
    match backend.get(namespace)? {
        Some(Value::Object(map)) => Ok(map),
        Some(Value::Null) | None => Ok(Map::new()),
        Some(other) => Err(PersistenceError::SerializationError(format!(
            "record '{}' is not an object: {}",
            namespace, other
        ))),
    }
}

/// Reads the bookmark list of `conversation_id`; missing entries read as empty.
pub fn read_conversation(
    backend: &dyn StorageBackend,
    namespace: &str,
    conversation_id: &str,
) -> Result<LoadedConversation, PersistenceError> {
    let record = read_record(backend, namespace)?;
    let entries = match record.get(conversation_id) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    };

    let total = entries.len();
    let bookmarks: Vec<Bookmark> = entries
        .into_iter()
        .filter_map(|v| serde_json::from_value::<Bookmark>(v).ok())
        .filter(Bookmark::has_valid_offsets)
        .collect();

    Ok(LoadedConversation {
        discarded: total - bookmarks.len(),
        bookmarks,
    })
}

/// Replaces the bookmark list of `conversation_id`, leaving other conversations as they are.
pub fn write_conversation(
    backend: &dyn StorageBackend,
    namespace: &str,
    conversation_id: &str,
    bookmarks: &[Bookmark],
) -> Result<(), PersistenceError> {
    let mut record = read_record(backend, namespace)?;
    record.insert(conversation_id.to_string(), serde_json::to_value(bookmarks)?);
    backend.set(namespace, Value::Object(record))
}
