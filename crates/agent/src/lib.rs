pub mod agent;
pub mod agents;
pub mod builder;
pub mod engine;
pub mod feedback;
pub mod node;
pub mod nodes;
pub mod pipeline;
pub mod reflection;
pub mod registry;
pub mod router;
pub mod state_bridge;
pub mod step;

#[cfg(test)]
mod testing;

pub use agent::{run_agent, Agent, AgentHooks};
pub use agents::HelloAgent;
pub use builder::{ExecutableGraph, GraphBuilder, GraphNode, Outgoing};
pub use engine::{GraphEngine, RunOutput, DEFAULT_MAX_STEPS};
pub use feedback::{FeedbackManager, NextAction};
pub use node::{BuiltinNode, ControlNode, NodeHandler, SyncControlNode};
pub use nodes::GreetingNode;
pub use pipeline::{ChatResponse, Orchestrator, PipelineHooks, PipelineOptions, ResponseStatus};
pub use reflection::{Evaluation, ReflectionNode};
pub use registry::{AgentRegistry, NodeRegistry, Registry};
pub use router::{IntentRouter, RouteDecision, RouteMethod};
pub use state_bridge::StateBridge;
pub use step::{AgentStep, NodeStep, StepHandler, SyncNodeStep};
