use conductor_core::state::is_truthy;
use conductor_core::{Error, MergePolicy, Predicate, Result, State, StepResult};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::builder::ExecutableGraph;

pub const DEFAULT_MAX_STEPS: usize = 50;

/// Final state of a run plus the keys its steps wrote, in first-write order.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub state: State,
    pub written: Vec<String>,
}

impl RunOutput {
    pub fn wrote(&self, key: &str) -> bool {
        self.written.iter().any(|k| k == key)
    }

    /// String value of `key`, only if a step of this run wrote it.
    pub fn written_str(&self, key: &str) -> Option<&str> {
        if self.wrote(key) {
            self.state.get_str(key)
        } else {
            None
        }
    }
}

/// Walks an [`ExecutableGraph`] one node at a time, merging each step result
/// into the running state.
#[derive(Debug, Clone)]
pub struct GraphEngine {
    max_steps: usize,
    policy: MergePolicy,
}

impl Default for GraphEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STEPS)
    }
}

impl GraphEngine {
    pub fn new(max_steps: usize) -> Self {
        Self {
            max_steps: max_steps.max(1),
            policy: MergePolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: MergePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub async fn run(&self, graph: &ExecutableGraph, initial: State) -> Result<State> {
        Ok(self.run_traced(graph, initial).await?.state)
    }

    pub async fn run_traced(&self, graph: &ExecutableGraph, initial: State) -> Result<RunOutput> {
        let mut state = initial;
        let mut written: Vec<String> = Vec::new();
        let mut current = graph.entry().to_string();
        let mut steps = 0usize;

        info!(domain = %graph.domain, intent = %graph.intent, entry = %current, "Graph run started");

        loop {
            if steps >= self.max_steps {
                error!(node = %current, max_steps = self.max_steps, "Step limit exceeded");
                return Err(Error::Graph(format!(
                    "Step limit of {} exceeded at node '{}'",
                    self.max_steps, current
                )));
            }
            steps += 1;

            let node = graph
                .node(&current)
                .ok_or_else(|| Error::Graph(format!("Node '{}' is not part of the graph", current)))?;

            debug!(node = %node.name, class = %node.class, step = steps, "Executing node");
            let result = node.handler.call(&state).await?;
            let next = next_node(graph, &current, &result);
            for key in result.keys() {
                if !written.contains(key) {
                    written.push(key.clone());
                }
            }
            state.merge_with(result, &self.policy);

            match next {
                Some(dst) => {
                    debug!(from = %current, to = %dst, "Following edge");
                    current = dst;
                }
                None => break,
            }
        }

        info!(
            domain = %graph.domain,
            intent = %graph.intent,
            last_node = %current,
            steps,
            version = state.version(),
            "Graph run finished"
        );
        Ok(RunOutput { state, written })
    }
}

/// Conditional edges in declaration order, then the unconditional successor.
fn next_node(graph: &ExecutableGraph, current: &str, result: &StepResult) -> Option<String> {
    let out = graph.outgoing(current)?;
    out.conditional
        .iter()
        .find(|(pred, _)| predicate_matches(pred, result))
        .map(|(_, dst)| dst.clone())
        .or_else(|| out.next.clone())
}

pub fn predicate_matches(pred: &Predicate, result: &StepResult) -> bool {
    let Some(value) = result.get(&pred.key) else {
        return false;
    };
    match &pred.equals {
        None => is_truthy(value),
        Some(expected) => match value {
            Value::String(s) => s == expected,
            Value::Null => false,
            other => other.to_string() == *expected,
        },
    }
}
