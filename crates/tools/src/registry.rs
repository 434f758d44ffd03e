use conductor_core::{Error, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::current_time::CurrentTimeTool;
use crate::text_stats::TextStatsTool;
use crate::{Tool, ToolContext};

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in tools.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_override(Arc::new(CurrentTimeTool));
        registry.register_override(Arc::new(TextStatsTool));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<()> {
        let name = tool.schema().name;
        if self.tools.contains_key(name) {
            return Err(Error::Registry(format!("tool '{}' already registered", name)));
        }
        debug!(name = name, "Registering tool");
        self.tools.insert(name.to_string(), tool);
        Ok(())
    }

    pub fn register_override(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.schema().name;
        if self.tools.insert(name.to_string(), tool).is_some() {
            info!(name = name, "Tool overridden");
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(&self, name: &str, ctx: ToolContext, params: Value) -> Result<Value> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::Tool(format!("Unknown tool: {}", name)))?;

        if let Err(e) = tool.validate(&params) {
            warn!(tool = name, error = %e, "Tool validation failed");
            return Err(e);
        }

        debug!(tool = name, session_id = %ctx.session_id, "Executing tool");
        tool.execute(ctx, params).await
    }
}
