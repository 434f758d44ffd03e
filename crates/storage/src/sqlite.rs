use async_trait::async_trait;
use chrono::{DateTime, Utc};
use conductor_core::types::StoredMessage;
use conductor_core::{Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::backend::{rank_vectors, MemoryBackend, VectorHit};

fn db_err(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Memory(format!("{}: {}", context, e))
}

/// SQLite-backed session memory (state, message log, vectors).
#[derive(Clone)]
pub struct SqliteBackend {
    inner: Arc<Mutex<Connection>>,
    db_path: PathBuf,
}

impl SqliteBackend {
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| db_err("Failed to create db directory", e))?;
        }

        let conn = Connection::open(db_path).map_err(|e| db_err("Failed to open memory db", e))?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let backend = Self {
            inner: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
        };
        backend.init_schema()?;
        info!(path = %db_path.display(), "SQLite memory backend opened");
        Ok(backend)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| db_err("Failed to open memory db", e))?;
        let backend = Self {
            inner: Arc::new(Mutex::new(conn)),
            db_path: PathBuf::from(":memory:"),
        };
        backend.init_schema()?;
        Ok(backend)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.inner.lock().map_err(|e| db_err("Lock error", e))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS session_state (
                session_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_session ON session_messages(session_id, id);

            CREATE TABLE IF NOT EXISTS session_vectors (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                embedding TEXT NOT NULL,
                metadata TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_vectors_session ON session_vectors(session_id);
            ",
        )
        .map_err(|e| db_err("Failed to initialize schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl MemoryBackend for SqliteBackend {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load_state(&self, session_id: &str) -> Result<Option<Map<String, Value>>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT state FROM session_state WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| db_err("Failed to load state", e))?;

        match raw {
            None => Ok(None),
            Some(raw) => match serde_json::from_str::<Value>(&raw)? {
                Value::Object(map) => Ok(Some(map)),
                other => Err(Error::Memory(format!(
                    "Stored state for session '{}' is not an object: {}",
                    session_id, other
                ))),
            },
        }
    }

    async fn save_state(&self, session_id: &str, state: &Map<String, Value>) -> Result<()> {
        let raw = serde_json::to_string(state)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO session_state (session_id, state, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(session_id) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
            params![session_id, raw, Utc::now().to_rfc3339()],
        )
        .map_err(|e| db_err("Failed to save state", e))?;
        debug!(session_id = %session_id, keys = state.len(), "State saved");
        Ok(())
    }

    async fn clear_state(&self, session_id: &str) -> Result<()> {
        let conn = self.conn()?;
        for table in ["session_state", "session_messages", "session_vectors"] {
            conn.execute(
                &format!("DELETE FROM {} WHERE session_id = ?1", table),
                params![session_id],
            )
            .map_err(|e| db_err("Failed to clear session", e))?;
        }
        info!(session_id = %session_id, "Session memory cleared");
        Ok(())
    }

    async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<()> {
        let metadata = match metadata {
            Some(v) if !v.is_null() => Some(serde_json::to_string(&v)?),
            _ => None,
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO session_messages (session_id, role, content, metadata, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![session_id, role, content, metadata, Utc::now().to_rfc3339()],
        )
        .map_err(|e| db_err("Failed to append message", e))?;
        Ok(())
    }

    async fn get_messages(&self, session_id: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT role, content, metadata, created_at FROM session_messages
                 WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(|e| db_err("Failed to get messages", e))?;

        let rows = stmt
            .query_map(params![session_id, limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .map_err(|e| db_err("Failed to get messages", e))?;

        let mut messages = Vec::new();
        for row in rows {
            let (role, content, metadata, created_at) = row.map_err(|e| db_err("Failed to read message", e))?;
            let metadata = metadata
                .and_then(|m| serde_json::from_str(&m).ok())
                .unwrap_or(Value::Null);
            let timestamp = DateTime::parse_from_rfc3339(&created_at)
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or_else(|e| {
                    warn!(error = %e, raw = %created_at, "Bad message timestamp");
                    Utc::now()
                });
            messages.push(StoredMessage {
                role,
                content,
                metadata,
                timestamp,
            });
        }
        messages.reverse();
        Ok(messages)
    }

    async fn store_vector(&self, session_id: &str, embedding: Vec<f32>, metadata: Value) -> Result<()> {
        let embedding = serde_json::to_string(&embedding)?;
        let metadata = serde_json::to_string(&metadata)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO session_vectors (session_id, embedding, metadata, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![session_id, embedding, metadata, Utc::now().to_rfc3339()],
        )
        .map_err(|e| db_err("Failed to store vector", e))?;
        Ok(())
    }

    async fn search_vector(&self, session_id: &str, query: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT embedding, metadata FROM session_vectors WHERE session_id = ?1")
            .map_err(|e| db_err("Failed to search vectors", e))?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| db_err("Failed to search vectors", e))?;

        let mut entries: Vec<(Vec<f32>, Value)> = Vec::new();
        for row in rows {
            let (embedding, metadata) = row.map_err(|e| db_err("Failed to read vector", e))?;
            let embedding: Vec<f32> = serde_json::from_str(&embedding).unwrap_or_default();
            let metadata: Value = serde_json::from_str(&metadata).unwrap_or(Value::Null);
            entries.push((embedding, metadata));
        }

        Ok(rank_vectors(
            query,
            entries.iter().map(|(e, m)| (e.as_slice(), m)),
            top_k,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_state_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("memory.db");

        {
            let backend = SqliteBackend::open(&path).unwrap();
            assert!(backend.load_state("s1").await.unwrap().is_none());
            let state = json!({"query": "hello", "turns": 1}).as_object().cloned().unwrap();
            backend.save_state("s1", &state).await.unwrap();
            let state = json!({"query": "again", "turns": 2}).as_object().cloned().unwrap();
            backend.save_state("s1", &state).await.unwrap();
        }

        let backend = SqliteBackend::open(&path).unwrap();
        let loaded = backend.load_state("s1").await.unwrap().unwrap();
        assert_eq!(loaded["turns"], 2);
        assert_eq!(loaded["query"], "again");
    }

    #[tokio::test]
    async fn test_messages_window() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        for i in 0..4 {
            backend
                .append_message("s", "user", &format!("m{}", i), Some(json!({"i": i})))
                .await
                .unwrap();
        }
        let msgs = backend.get_messages("s", 3).await.unwrap();
        let contents: Vec<&str> = msgs.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m1", "m2", "m3"]);
        assert_eq!(msgs[2].metadata["i"], 3);
    }

    #[tokio::test]
    async fn test_clear_and_vectors() {
        let backend = SqliteBackend::open_in_memory().unwrap();
        let state = json!({"a": 1}).as_object().cloned().unwrap();
        backend.save_state("s", &state).await.unwrap();
        backend.append_message("s", "user", "x", None).await.unwrap();
        backend
            .store_vector("s", vec![1.0, 0.0], json!({"content": "east"}))
            .await
            .unwrap();
        backend
            .store_vector("s", vec![0.0, 1.0], json!({"content": "north"}))
            .await
            .unwrap();

        let hits = backend.search_vector("s", &[0.9, 0.1], 1).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].metadata["content"], "east");

        backend.clear_state("s").await.unwrap();
        assert!(backend.load_state("s").await.unwrap().is_none());
        assert!(backend.get_messages("s", 10).await.unwrap().is_empty());
        assert!(backend.search_vector("s", &[1.0, 0.0], 5).await.unwrap().is_empty());
    }
}
