use async_trait::async_trait;
use chrono::Utc;
use conductor_core::{Result, State, StepResult};
use conductor_providers::Completion;
use conductor_tools::{ToolContext, ToolRegistry};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::{Agent, AgentHooks};

/// Minimal demo agent: asks the LLM for a cheerful reply to the query.
/// Never fails; when the LLM is unavailable the reply says so.
pub struct HelloAgent {
    completion: Arc<dyn Completion>,
    tools: Arc<ToolRegistry>,
}

impl HelloAgent {
    pub const NAME: &'static str = "HelloAgent";

    pub fn new(completion: Arc<dyn Completion>, tools: Arc<ToolRegistry>) -> Self {
        Self { completion, tools }
    }

    async fn timestamp(&self, state: &State) -> String {
        let ctx = ToolContext::new(
            state.get_str("session_id").unwrap_or_default(),
            state.get_str("domain").unwrap_or_default(),
        );
        match self.tools.execute("current_time", ctx, json!({})).await {
            Ok(out) => match out.get("time").and_then(Value::as_str) {
                Some(t) => t.to_string(),
                None => Utc::now().to_rfc3339(),
            },
            Err(e) => {
                debug!(error = %e, "current_time tool unavailable");
                Utc::now().to_rfc3339()
            }
        }
    }
}

fn normalize(query: &str) -> String {
    query.trim().to_string()
}

fn tag_agent(agent: &str, mut output: StepResult) -> StepResult {
    output.insert("agent".to_string(), json!(agent));
    output
}

#[async_trait]
impl Agent for HelloAgent {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn description(&self) -> &str {
        "A minimal demo agent that asks the LLM to greet users."
    }

    fn hooks(&self) -> AgentHooks {
        AgentHooks {
            pre_process: normalize,
            post_process: tag_agent,
        }
    }

    async fn run(&self, query: &str, state: &State) -> Result<StepResult> {
        let timestamp = self.timestamp(state).await;
        let prompt = format!(
            "You are a friendly assistant. Reply to: '{}' in a cheerful tone.",
            query
        );

        let (reply, llm_used) = match self.completion.complete(&prompt, None).await {
            Ok(text) => {
                info!(agent = Self::NAME, chars = text.len(), "Got LLM response");
                (format!("Hello! You said: '{}'.\nLLM says: {}", query, text.trim()), true)
            }
            Err(e) => {
                warn!(agent = Self::NAME, error = %e, "LLM call failed");
                (format!("Hello! You said: '{}', but the LLM call failed: {}", query, e), false)
            }
        };

        let mut out = StepResult::new();
        out.insert("reply".to_string(), json!(reply));
        out.insert("timestamp".to_string(), json!(timestamp));
        out.insert("llm_used".to_string(), json!(llm_used));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::run_agent;
    use crate::testing::{FailingCompletion, ScriptedCompletion};

    #[tokio::test]
    async fn test_reply_with_llm() {
        let llm = Arc::new(ScriptedCompletion::new(vec!["Hi friend!"]));
        let agent = HelloAgent::new(llm.clone(), Arc::new(ToolRegistry::with_defaults()));
        let out = run_agent(&agent, "  hello there ", &State::new()).await.unwrap();
        assert_eq!(out["reply"], "Hello! You said: 'hello there'.\nLLM says: Hi friend!");
        assert_eq!(out["llm_used"], true);
        assert_eq!(out["agent"], "HelloAgent");
        assert!(llm.prompts()[0].contains("Reply to: 'hello there'"));
        let ts = out["timestamp"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[tokio::test]
    async fn test_llm_failure_still_replies() {
        let agent = HelloAgent::new(
            Arc::new(FailingCompletion::default()),
            Arc::new(ToolRegistry::new()),
        );
        let out = run_agent(&agent, "hello", &State::new()).await.unwrap();
        assert_eq!(out["llm_used"], false);
        let reply = out["reply"].as_str().unwrap();
        assert!(reply.contains("'hello'"));
        assert!(reply.contains("LLM call failed"));
        // timestamp falls back when the tool is missing
        assert!(out["timestamp"].as_str().is_some());
    }
}
