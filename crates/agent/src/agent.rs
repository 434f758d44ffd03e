use async_trait::async_trait;
use conductor_core::{Error, Result, State, StepResult};
use tracing::{debug, error, info};

/// Pre/post hooks applied by [`run_agent`] around [`Agent::run`].
#[derive(Clone, Copy)]
pub struct AgentHooks {
    pub pre_process: fn(&str) -> String,
    /// Receives the agent name and its raw output.
    pub post_process: fn(&str, StepResult) -> StepResult,
}

fn identity_query(query: &str) -> String {
    query.to_string()
}

fn identity_output(_agent: &str, output: StepResult) -> StepResult {
    output
}

impl Default for AgentHooks {
    fn default() -> Self {
        Self {
            pre_process: identity_query,
            post_process: identity_output,
        }
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str {
        ""
    }

    fn hooks(&self) -> AgentHooks {
        AgentHooks::default()
    }

    async fn run(&self, query: &str, state: &State) -> Result<StepResult>;
}

/// Runs an agent with its hooks. Failures are reported as `Error::Agent`.
pub async fn run_agent(agent: &dyn Agent, query: &str, state: &State) -> Result<StepResult> {
    let name = agent.name();
    let hooks = agent.hooks();

    let query = (hooks.pre_process)(query);
    info!(agent = %name, query = %query, "Agent started");

    match agent.run(&query, state).await {
        Ok(output) => {
            let output = (hooks.post_process)(name, output);
            debug!(agent = %name, keys = output.len(), "Agent completed");
            Ok(output)
        }
        Err(Error::Agent(msg)) => {
            error!(agent = %name, error = %msg, "Agent failed");
            Err(Error::Agent(msg))
        }
        Err(e) => {
            error!(agent = %name, error = %e, "Agent failed");
            Err(Error::Agent(format!("{}: {}", name, e)))
        }
    }
}
