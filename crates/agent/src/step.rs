use async_trait::async_trait;
use conductor_core::{Result, State, StepResult};
use std::sync::Arc;

use crate::agent::{run_agent, Agent};
use crate::node::{ControlNode, SyncControlNode};

/// Uniform async calling convention for every resolved graph handler.
#[async_trait]
pub trait StepHandler: Send + Sync {
    fn label(&self) -> &str;
    async fn call(&self, state: &State) -> Result<StepResult>;
}

/// Runs an agent on the `query` key of the current state.
pub struct AgentStep {
    agent: Arc<dyn Agent>,
}

impl AgentStep {
    pub fn new(agent: Arc<dyn Agent>) -> Self {
        Self { agent }
    }
}

#[async_trait]
impl StepHandler for AgentStep {
    fn label(&self) -> &str {
        self.agent.name()
    }

    async fn call(&self, state: &State) -> Result<StepResult> {
        let query = state.get_str("query").unwrap_or_default();
        run_agent(self.agent.as_ref(), query, state).await
    }
}

pub struct NodeStep {
    node: Arc<dyn ControlNode>,
}

impl NodeStep {
    pub fn new(node: Arc<dyn ControlNode>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl StepHandler for NodeStep {
    fn label(&self) -> &str {
        self.node.name()
    }

    async fn call(&self, state: &State) -> Result<StepResult> {
        self.node.execute(state).await
    }
}

/// Lifts a synchronous node into the async convention. The node runs inline
/// on the calling task.
pub struct SyncNodeStep {
    node: Arc<dyn SyncControlNode>,
}

impl SyncNodeStep {
    pub fn new(node: Arc<dyn SyncControlNode>) -> Self {
        Self { node }
    }
}

#[async_trait]
impl StepHandler for SyncNodeStep {
    fn label(&self) -> &str {
        self.node.name()
    }

    async fn call(&self, state: &State) -> Result<StepResult> {
        self.node.execute(state)
    }
}
