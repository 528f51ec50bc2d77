mod schema;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};

/// A serialized memory document together with the store revision it reflects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub revision: u64,
    pub body: String,
}

/// Key-value persistence for memory documents, one key per memory.
///
/// `set` must refuse a write whose revision is not newer than the stored one,
/// so a delayed write can never clobber a later state.
pub trait DocumentStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<StoredDocument>>;

    /// Returns `false` when the write was refused as stale.
    fn set(&self, key: &str, revision: u64, body: &str) -> Result<bool>;
}

/// SQLite-backed document store.
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn open_default() -> Result<Self> {
        let dirs = directories::ProjectDirs::from("", "", "voyage")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
        let db_path = dirs.data_dir().join("voyage.db");
        Self::open(db_path)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().expect("database lock poisoned");
        schema::run_migrations(&conn)
    }

    /// All stored keys, for diagnostics.
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let mut stmt = conn.prepare("SELECT key FROM memory_documents ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

impl DocumentStore for Database {
    fn get(&self, key: &str) -> Result<Option<StoredDocument>> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let doc = conn
            .query_row(
                "SELECT revision, body FROM memory_documents WHERE key = ?",
                [key],
                |row| {
                    Ok(StoredDocument {
                        revision: row.get::<_, i64>(0)?.max(0) as u64,
                        body: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(doc)
    }

    fn set(&self, key: &str, revision: u64, body: &str) -> Result<bool> {
        let conn = self.conn.lock().expect("database lock poisoned");
        let rows = conn.execute(
            "INSERT INTO memory_documents (key, revision, body, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(key) DO UPDATE SET
                revision = excluded.revision,
                body = excluded.body,
                updated_at = excluded.updated_at
             WHERE excluded.revision > memory_documents.revision",
            (key, revision as i64, body, Utc::now().to_rfc3339()),
        )?;
        Ok(rows > 0)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: self.conn.clone(),
        }
    }
}

/// Volatile document store for tests and ephemeral sessions.
#[derive(Default, Clone)]
pub struct MemoryStorage {
    docs: Arc<Mutex<HashMap<String, StoredDocument>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<StoredDocument>> {
        let docs = self.docs.lock().expect("storage lock poisoned");
        Ok(docs.get(key).cloned())
    }

    fn set(&self, key: &str, revision: u64, body: &str) -> Result<bool> {
        let mut docs = self.docs.lock().expect("storage lock poisoned");
        if docs.get(key).is_some_and(|d| d.revision >= revision) {
            return Ok(false);
        }
        docs.insert(
            key.to_string(),
            StoredDocument {
                revision,
                body: body.to_string(),
            },
        );
        Ok(true)
    }
}
