use async_trait::async_trait;
use conductor_core::types::{ChatMessage, LLMResponse};
use conductor_core::{Error, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::client::build_http_client;
use crate::Provider;

/// Find the largest byte index <= `max_bytes` that is a valid char boundary.
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> usize {
    if max_bytes >= s.len() {
        return s.len();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    end
}

/// Wire dialect of an OpenAI-compatible endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStyle {
    /// `Authorization: Bearer`, `{base}/chat/completions`.
    OpenAI,
    /// `api-key` header, `{endpoint}/openai/deployments/{model}/chat/completions?api-version=...`.
    Azure { api_version: String },
}

pub struct OpenAIProvider {
    client: Client,
    api_key: String,
    api_base: String,
    style: ApiStyle,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAIProvider {
    pub fn new(api_key: &str, api_base: Option<&str>, model: &str, max_tokens: u32, temperature: f32) -> Self {
        Self::with_options(
            api_key,
            api_base,
            ApiStyle::OpenAI,
            model,
            max_tokens,
            temperature,
            None,
            Duration::from_secs(120),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_options(
        api_key: &str,
        api_base: Option<&str>,
        style: ApiStyle,
        model: &str,
        max_tokens: u32,
        temperature: f32,
        proxy: Option<&str>,
        timeout: Duration,
    ) -> Self {
        let resolved_base = api_base
            .unwrap_or("https://api.openai.com/v1")
            .trim_end_matches('/')
            .to_string();
        let client = build_http_client(proxy, &resolved_base, timeout);
        Self {
            client,
            api_key: api_key.to_string(),
            api_base: resolved_base,
            style,
            model: model.to_string(),
            max_tokens,
            temperature,
        }
    }

    pub fn style(&self) -> &ApiStyle {
        &self.style
    }

    fn endpoint(&self, model: &str) -> String {
        match &self.style {
            ApiStyle::OpenAI => format!("{}/chat/completions", self.api_base),
            ApiStyle::Azure { api_version } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.api_base, model, api_version
            ),
        }
    }

    fn parse_response(raw_body: &str) -> Result<LLMResponse> {
        let chat_response: ChatResponse = serde_json::from_str(raw_body).map_err(|e| {
            let end = truncate_at_char_boundary(raw_body, 500);
            Error::Provider(format!("Failed to parse response: {}. Body: {}", e, &raw_body[..end]))
        })?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::Provider("No choices in response".to_string()))?;

        Ok(LLMResponse {
            content: choice.message.content.filter(|c| !c.is_empty()),
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".to_string()),
            usage: chat_response.usage.unwrap_or(Value::Null),
        })
    }
}

#[async_trait]
impl Provider for OpenAIProvider {
    async fn chat(&self, messages: &[ChatMessage], model: Option<&str>) -> Result<LLMResponse> {
        let model = model.unwrap_or(&self.model);
        let url = self.endpoint(model);

        let request = ChatRequest {
            model: model.to_string(),
            messages: messages.to_vec(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        info!(url = %url, model = %model, messages_count = messages.len(), "Calling LLM");

        let request_body = serde_json::to_string(&request)
            .map_err(|e| Error::Provider(format!("Failed to serialize request: {}", e)))?;
        debug!(body_len = request_body.len(), "Request body prepared");

        let builder = self.client.post(&url).header("Content-Type", "application/json");
        let builder = match self.style {
            ApiStyle::OpenAI => builder.header("Authorization", format!("Bearer {}", self.api_key)),
            ApiStyle::Azure { .. } => builder.header("api-key", &self.api_key),
        };

        let response = builder
            .body(request_body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("Request failed: {}", e)))?;

        let status = response.status();
        let raw_body = response.text().await.unwrap_or_default();

        if !status.is_success() {
            error!(status = %status, body = %raw_body, "LLM API error");
            return Err(Error::Provider(format!("API error {}: {}", status, raw_body)));
        }

        {
            let end = truncate_at_char_boundary(&raw_body, 500);
            debug!(body_len = raw_body.len(), preview = %&raw_body[..end], "LLM raw response");
        }

        Self::parse_response(&raw_body)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}
