use async_trait::async_trait;
use conductor_core::types::ChatMessage;
use conductor_core::{Error, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::Provider;

/// One-shot text completion, the only LLM surface the orchestrator consumes.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String>;
}

/// Bridge: wraps a chat `Provider` as a `Completion`. The prompt is sent as a
/// single user message with no system prompt.
pub struct ProviderCompletion {
    provider: Arc<dyn Provider>,
}

impl ProviderCompletion {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Completion for ProviderCompletion {
    async fn complete(&self, prompt: &str, model: Option<&str>) -> Result<String> {
        let messages = vec![ChatMessage::user(prompt)];
        let response = self.provider.chat(&messages, model).await?;
        Ok(response.content.unwrap_or_default())
    }
}

/// Used when no provider is configured. Every call fails, so callers take
/// their non-LLM path.
#[derive(Debug, Default, Clone)]
pub struct OfflineCompletion;

#[async_trait]
impl Completion for OfflineCompletion {
    async fn complete(&self, _prompt: &str, _model: Option<&str>) -> Result<String> {
        Err(Error::Provider("No LLM provider configured".to_string()))
    }
}

/// Extracts the JSON object from an LLM reply, tolerating ``` fences and
/// surrounding prose. Returns `None` when nothing parses.
pub fn parse_json_reply(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }

    let unfenced = strip_code_fence(trimmed);
    if let Ok(v) = serde_json::from_str::<Value>(unfenced) {
        return Some(v);
    }

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&unfenced[start..=end]) {
        Ok(v) => Some(v),
        Err(e) => {
            debug!(error = %e, "LLM reply is not JSON");
            None
        }
    }
}

fn strip_code_fence(s: &str) -> &str {
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // drop the language tag line, if any
    let rest = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest,
    };
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}
