use conductor_core::{Error, Result, State, StepResult, StoredMessage};
use conductor_storage::MemoryBackend;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, warn};

const SUMMARY_MESSAGES: usize = 5;
const SUMMARY_CHARS: usize = 200;

/// Session state and message log on top of the active memory backend.
#[derive(Clone)]
pub struct StateBridge {
    backend: Arc<dyn MemoryBackend>,
}

impl StateBridge {
    pub fn new(backend: Arc<dyn MemoryBackend>) -> Self {
        Self { backend }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Empty state when the session has never been saved.
    pub async fn load(&self, session_id: &str) -> Result<State> {
        match self.backend.load_state(session_id).await {
            Ok(map) => {
                let state = State::from_map(map.unwrap_or_default());
                debug!(session_id = %session_id, keys = state.len(), "Loaded session state");
                Ok(state)
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "Failed to load state");
                Err(Error::Memory(format!("Failed to load state for session '{}': {}", session_id, e)))
            }
        }
    }

    pub async fn save(&self, session_id: &str, state: &State) -> Result<()> {
        self.backend
            .save_state(session_id, state.as_map())
            .await
            .map_err(|e| {
                error!(session_id = %session_id, error = %e, "Failed to save state");
                Error::Memory(format!("Failed to save state for session '{}': {}", session_id, e))
            })?;
        debug!(session_id = %session_id, state_size = state.len(), "State saved");
        Ok(())
    }

    pub async fn clear(&self, session_id: &str) -> Result<()> {
        self.backend.clear_state(session_id).await.map_err(|e| {
            Error::Memory(format!("Failed to clear session '{}': {}", session_id, e))
        })
    }

    pub async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<()> {
        self.backend
            .append_message(session_id, role, content, metadata)
            .await
            .map_err(|e| {
                error!(session_id = %session_id, role = %role, error = %e, "Failed to append message");
                Error::Memory(format!("Failed to append message for session '{}': {}", session_id, e))
            })?;
        debug!(session_id = %session_id, role = %role, "Message appended");
        Ok(())
    }

    /// Best-effort: backend failures yield an empty list.
    pub async fn recent_messages(&self, session_id: &str, limit: usize) -> Vec<StoredMessage> {
        match self.backend.get_messages(session_id, limit).await {
            Ok(msgs) => msgs,
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "Failed to get messages");
                Vec::new()
            }
        }
    }

    /// Best-effort vector-memory write of the run's reply content.
    pub async fn update_memory(&self, session_id: &str, result: &StepResult) {
        let content = match result.get("content").and_then(Value::as_str) {
            Some(c) if !c.is_empty() => c.to_string(),
            _ => Value::Object(result.clone()).to_string(),
        };
        match self
            .backend
            .store_vector(session_id, Vec::new(), json!({ "content": content }))
            .await
        {
            Ok(()) => debug!(session_id = %session_id, "Semantic memory updated"),
            Err(e) => warn!(session_id = %session_id, error = %e, "Skipped memory update"),
        }
    }

    pub async fn summarize_session(&self, session_id: &str, limit: usize) -> String {
        let msgs = self.recent_messages(session_id, limit).await;
        if msgs.is_empty() {
            return "No history available.".to_string();
        }
        let start = msgs.len().saturating_sub(SUMMARY_MESSAGES);
        let joined = msgs[start..]
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let truncated: String = joined.chars().take(SUMMARY_CHARS).collect();
        format!("Recent summary: {}", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use conductor_storage::{InMemoryBackend, SqliteBackend};
    use serde_json::Map;

    struct BrokenBackend;

    #[async_trait]
    impl MemoryBackend for BrokenBackend {
        fn name(&self) -> &str {
            "broken"
        }
        async fn load_state(&self, _: &str) -> Result<Option<Map<String, Value>>> {
            Err(Error::Other("down".to_string()))
        }
        async fn save_state(&self, _: &str, _: &Map<String, Value>) -> Result<()> {
            Err(Error::Other("down".to_string()))
        }
        async fn clear_state(&self, _: &str) -> Result<()> {
            Err(Error::Other("down".to_string()))
        }
        async fn append_message(&self, _: &str, _: &str, _: &str, _: Option<Value>) -> Result<()> {
            Err(Error::Other("down".to_string()))
        }
        async fn get_messages(&self, _: &str, _: usize) -> Result<Vec<StoredMessage>> {
            Err(Error::Other("down".to_string()))
        }
        async fn store_vector(&self, _: &str, _: Vec<f32>, _: Value) -> Result<()> {
            Err(Error::Other("down".to_string()))
        }
    }

    #[tokio::test]
    async fn test_load_absent_is_empty() {
        let bridge = StateBridge::new(Arc::new(InMemoryBackend::new()));
        assert!(bridge.load("nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let bridge = StateBridge::new(Arc::new(SqliteBackend::open_in_memory().unwrap()));
        let mut state = State::new();
        state.insert("intent", "greeting");
        bridge.save("s1", &state).await.unwrap();
        let loaded = bridge.load("s1").await.unwrap();
        assert_eq!(loaded.get_str("intent"), Some("greeting"));

        bridge.clear("s1").await.unwrap();
        assert!(bridge.load("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failures_wrapped_as_memory() {
        let bridge = StateBridge::new(Arc::new(BrokenBackend));
        assert_eq!(bridge.load("s").await.unwrap_err().kind(), "memory");
        assert_eq!(bridge.save("s", &State::new()).await.unwrap_err().kind(), "memory");
        assert_eq!(
            bridge.append_message("s", "user", "hi", None).await.unwrap_err().kind(),
            "memory"
        );
        assert!(bridge.recent_messages("s", 10).await.is_empty());
        bridge.update_memory("s", &StepResult::new()).await;
        assert_eq!(bridge.summarize_session("s", 10).await, "No history available.");
    }

    #[tokio::test]
    async fn test_summary_uses_last_five_messages() {
        let bridge = StateBridge::new(Arc::new(InMemoryBackend::new()));
        for i in 0..7 {
            bridge.append_message("s", "user", &format!("m{}", i), None).await.unwrap();
        }
        let summary = bridge.summarize_session("s", 10).await;
        assert_eq!(summary, "Recent summary: m2 m3 m4 m5 m6");

        let long = "x".repeat(500);
        bridge.append_message("t", "user", &long, None).await.unwrap();
        let summary = bridge.summarize_session("t", 10).await;
        assert_eq!(summary.len(), "Recent summary: ".len() + 200);
    }

    /// Records vector writes; everything else succeeds with nothing stored.
    #[derive(Default)]
    struct VectorLog {
        writes: std::sync::Mutex<Vec<(String, Vec<f32>, Value)>>,
    }

    #[async_trait]
    impl MemoryBackend for VectorLog {
        fn name(&self) -> &str {
            "vector_log"
        }
        async fn load_state(&self, _: &str) -> Result<Option<Map<String, Value>>> {
            Ok(None)
        }
        async fn save_state(&self, _: &str, _: &Map<String, Value>) -> Result<()> {
            Ok(())
        }
        async fn clear_state(&self, _: &str) -> Result<()> {
            Ok(())
        }
        async fn append_message(&self, _: &str, _: &str, _: &str, _: Option<Value>) -> Result<()> {
            Ok(())
        }
        async fn get_messages(&self, _: &str, _: usize) -> Result<Vec<StoredMessage>> {
            Ok(Vec::new())
        }
        async fn store_vector(&self, session_id: &str, embedding: Vec<f32>, metadata: Value) -> Result<()> {
            self.writes
                .lock()
                .unwrap()
                .push((session_id.to_string(), embedding, metadata));
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_update_memory_stores_content() {
        let backend = Arc::new(VectorLog::default());
        let bridge = StateBridge::new(backend.clone());
        let mut result = StepResult::new();
        result.insert("content".to_string(), json!("remember me"));
        bridge.update_memory("s", &result).await;

        let writes = backend.writes.lock().unwrap();
        assert_eq!(writes.len(), 1);
        let (session, embedding, metadata) = &writes[0];
        assert_eq!(session, "s");
        assert!(embedding.is_empty());
        assert_eq!(metadata["content"], "remember me");
    }

    #[tokio::test]
    async fn test_update_memory_without_content_stores_whole_result() {
        let backend = Arc::new(VectorLog::default());
        let bridge = StateBridge::new(backend.clone());
        let mut result = StepResult::new();
        result.insert("reply".to_string(), json!("hi"));
        bridge.update_memory("s", &result).await;

        let writes = backend.writes.lock().unwrap();
        assert_eq!(writes[0].2["content"], r#"{"reply":"hi"}"#);
    }
}
