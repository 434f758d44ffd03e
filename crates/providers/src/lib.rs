pub mod client;
pub mod completion;
pub mod factory;
pub mod openai;

use async_trait::async_trait;
use conductor_core::types::{ChatMessage, LLMResponse};
use conductor_core::Result;

#[async_trait]
pub trait Provider: Send + Sync {
    /// `model` overrides the provider's configured default for this call.
    async fn chat(&self, messages: &[ChatMessage], model: Option<&str>) -> Result<LLMResponse>;
}

pub use completion::{parse_json_reply, Completion, OfflineCompletion, ProviderCompletion};
pub use factory::{create_completion, create_provider};
pub use openai::{ApiStyle, OpenAIProvider};
