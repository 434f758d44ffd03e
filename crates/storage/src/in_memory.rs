use async_trait::async_trait;
use conductor_core::types::StoredMessage;
use conductor_core::Result;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::backend::{rank_vectors, MemoryBackend, VectorHit};

/// Process-local backend. State is lost on exit.
#[derive(Default)]
pub struct InMemoryBackend {
    states: RwLock<HashMap<String, Map<String, Value>>>,
    messages: RwLock<HashMap<String, Vec<StoredMessage>>>,
    vectors: RwLock<HashMap<String, Vec<(Vec<f32>, Value)>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryBackend for InMemoryBackend {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn load_state(&self, session_id: &str) -> Result<Option<Map<String, Value>>> {
        Ok(self.states.read().await.get(session_id).cloned())
    }

    async fn save_state(&self, session_id: &str, state: &Map<String, Value>) -> Result<()> {
        self.states
            .write()
            .await
            .insert(session_id.to_string(), state.clone());
        debug!(session_id = %session_id, keys = state.len(), "State saved");
        Ok(())
    }

    async fn clear_state(&self, session_id: &str) -> Result<()> {
        self.states.write().await.remove(session_id);
        self.messages.write().await.remove(session_id);
        self.vectors.write().await.remove(session_id);
        Ok(())
    }

    async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<()> {
        self.messages
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(StoredMessage::new(role, content, metadata));
        Ok(())
    }

    async fn get_messages(&self, session_id: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        let messages = self.messages.read().await;
        let Some(all) = messages.get(session_id) else {
            return Ok(Vec::new());
        };
        let start = all.len().saturating_sub(limit);
        Ok(all[start..].to_vec())
    }

    async fn store_vector(&self, session_id: &str, embedding: Vec<f32>, metadata: Value) -> Result<()> {
        self.vectors
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push((embedding, metadata));
        Ok(())
    }

    async fn search_vector(&self, session_id: &str, query: &[f32], top_k: usize) -> Result<Vec<VectorHit>> {
        let vectors = self.vectors.read().await;
        let Some(entries) = vectors.get(session_id) else {
            return Ok(Vec::new());
        };
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

    #[tokio::test]
    async fn test_state_roundtrip_and_absence() {
        let backend = InMemoryBackend::new();
        assert!(backend.load_state("s1").await.unwrap().is_none());

        let state = json!({"query": "hi", "n": 1}).as_object().cloned().unwrap();
        backend.save_state("s1", &state).await.unwrap();
        assert_eq!(backend.load_state("s1").await.unwrap(), Some(state));
        assert!(backend.load_state("s2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_messages_returns_most_recent_oldest_first() {
        let backend = InMemoryBackend::new();
        for i in 0..5 {
            backend
                .append_message("s", "user", &format!("m{}", i), None)
                .await
                .unwrap();
        }
        let recent = backend.get_messages("s", 2).await.unwrap();
        let contents: Vec<&str> = recent.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m3", "m4"]);
        assert_eq!(backend.get_messages("s", 50).await.unwrap().len(), 5);
        assert!(backend.get_messages("other", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let backend = InMemoryBackend::new();
        let state = json!({"a": 1}).as_object().cloned().unwrap();
        backend.save_state("s", &state).await.unwrap();
        backend.append_message("s", "user", "x", None).await.unwrap();
        backend.store_vector("s", vec![1.0], json!({})).await.unwrap();

        backend.clear_state("s").await.unwrap();
        assert!(backend.load_state("s").await.unwrap().is_none());
        assert!(backend.get_messages("s", 10).await.unwrap().is_empty());
        assert!(backend.search_vector("s", &[1.0], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_vector_search() {
        let backend = InMemoryBackend::new();
        backend
            .store_vector("s", vec![1.0, 0.0], json!({"content": "east"}))
            .await
            .unwrap();
        backend
            .store_vector("s", vec![0.0, 1.0], json!({"content": "north"}))
            .await
            .unwrap();
        let hits = backend.search_vector("s", &[0.1, 0.9], 5).await.unwrap();
        assert_eq!(hits[0].metadata["content"], "north");
    }
}
