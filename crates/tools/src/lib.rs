pub mod current_time;
pub mod registry;
pub mod text_stats;

use async_trait::async_trait;
use conductor_core::Result;
use serde_json::Value;

pub use current_time::CurrentTimeTool;
pub use registry::ToolRegistry;
pub use text_stats::TextStatsTool;

/// Per-call context handed to a tool by the agent invoking it.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    pub session_id: String,
    pub domain: String,
}

impl ToolContext {
    pub fn new(session_id: &str, domain: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            domain: domain.to_string(),
        }
    }
}

pub struct ToolSchema {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> ToolSchema;
    fn validate(&self, params: &Value) -> Result<()>;
    async fn execute(&self, ctx: ToolContext, params: Value) -> Result<Value>;
}
