use async_trait::async_trait;
use conductor_core::{Result, State, StepResult};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info};

use crate::agent::{run_agent, Agent};
use crate::node::ControlNode;

const GREETING_WORDS: [&str; 4] = ["hi", "hello", "hey", "morning"];
const FAREWELL_WORDS: [&str; 2] = ["bye", "goodbye"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Salutation {
    Greeting,
    Farewell,
    Other,
}

fn classify(query: &str) -> Salutation {
    let lower = query.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    if words.iter().any(|w| GREETING_WORDS.contains(w)) {
        Salutation::Greeting
    } else if words.iter().any(|w| FAREWELL_WORDS.contains(w)) || lower.contains("see you") {
        Salutation::Farewell
    } else {
        Salutation::Other
    }
}

/// Greets by rule, then asks the wrapped agent for a reply. Farewells end
/// the turn without calling the agent.
pub struct GreetingNode {
    agent: Arc<dyn Agent>,
}

impl GreetingNode {
    pub const NAME: &'static str = "GreetingNode";

    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl ControlNode for GreetingNode {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn execute(&self, state: &State) -> Result<StepResult> {
        let query = state.get_str("query").unwrap_or_default().trim().to_string();
        info!(node = Self::NAME, query = %query, "Executing");

        let greeting = match classify(&query) {
            Salutation::Greeting => "Hello there! Let me think about that for you...".to_string(),
            Salutation::Farewell => {
                let mut out = StepResult::new();
                out.insert("query".to_string(), json!(query));
                out.insert("response".to_string(), json!("Goodbye! Have a great day ahead!"));
                return Ok(out);
            }
            Salutation::Other => format!("You said: {}", query),
        };

        let mut out = StepResult::new();
        out.insert("query".to_string(), json!(query));
        out.insert("greeting".to_string(), json!(greeting));

        match run_agent(self.agent.as_ref(), &query, state).await {
            Ok(reply) => {
                info!(node = Self::NAME, agent = %self.agent.name(), "Agent replied");
                out.insert("agent_reply".to_string(), reply.get("reply").cloned().unwrap_or(Value::Null));
                out.insert("timestamp".to_string(), reply.get("timestamp").cloned().unwrap_or(Value::Null));
                out.insert(
                    "llm_used".to_string(),
                    reply.get("llm_used").cloned().unwrap_or(json!(false)),
                );
            }
            Err(e) => {
                error!(node = Self::NAME, agent = %self.agent.name(), error = %e, "Agent call failed");
                out.insert("error".to_string(), json!(e.to_string()));
                out.insert("llm_used".to_string(), json!(false));
            }
        }
        Ok(out)
    }
}
