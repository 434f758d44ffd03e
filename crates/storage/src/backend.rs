use async_trait::async_trait;
use conductor_core::types::StoredMessage;
use conductor_core::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorHit {
    pub score: f32,
    pub metadata: Value,
}

/// Session persistence used by the state bridge. Implementations must be safe
/// for concurrent use across sessions; no per-session locking is performed.
#[async_trait]
pub trait MemoryBackend: Send + Sync {
    fn name(&self) -> &str;

    /// `None` when the session has never been saved.
    async fn load_state(&self, session_id: &str) -> Result<Option<Map<String, Value>>>;

    async fn save_state(&self, session_id: &str, state: &Map<String, Value>) -> Result<()>;

    /// Removes state, messages and vectors of the session.
    async fn clear_state(&self, session_id: &str) -> Result<()>;

    async fn append_message(
        &self,
        session_id: &str,
        role: &str,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<()>;

    /// The most recent `limit` messages, oldest first.
    async fn get_messages(&self, session_id: &str, limit: usize) -> Result<Vec<StoredMessage>>;

    async fn store_vector(&self, _session_id: &str, _embedding: Vec<f32>, _metadata: Value) -> Result<()> {
        Ok(())
    }

    async fn search_vector(&self, _session_id: &str, _query: &[f32], _top_k: usize) -> Result<Vec<VectorHit>> {
        Ok(Vec::new())
    }
}

/// Returns `None` for empty or mismatched vectors, or a zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    Some(dot / (na * nb))
}

/// Ranks `(embedding, metadata)` pairs against `query`, best first.
pub(crate) fn rank_vectors<'a, I>(query: &[f32], entries: I, top_k: usize) -> Vec<VectorHit>
where
    I: IntoIterator<Item = (&'a [f32], &'a Value)>,
{
    let mut hits: Vec<VectorHit> = entries
        .into_iter()
        .filter_map(|(embedding, metadata)| {
            cosine_similarity(query, embedding).map(|score| VectorHit {
                score,
                metadata: metadata.clone(),
            })
        })
        .collect();
    hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    hits.truncate(top_k);
    hits
}
