//! Test fakes shared by the orchestration tests.

use async_trait::async_trait;
use conductor_core::{
    DomainCatalog, DomainConfig, EdgeSpec, Error, GraphSpec, IntentSpec, NodeSpec, Result,
};
use conductor_providers::Completion;
use conductor_storage::MemoryBackend;
use conductor_tools::ToolRegistry;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::agent::Agent;
use crate::agents::HelloAgent;
use crate::builder::GraphBuilder;
use crate::engine::GraphEngine;
use crate::feedback::FeedbackManager;
use crate::node::ControlNode;
use crate::nodes::GreetingNode;
use crate::pipeline::Orchestrator;
use crate::reflection::ReflectionNode;
use crate::registry::{AgentRegistry, NodeRegistry};
use crate::router::IntentRouter;
use crate::state_bridge::StateBridge;

/// Replays canned replies in order; fails once the script runs out.
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<&str>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(String::from).collect()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Completion for ScriptedCompletion {
    async fn complete(&self, prompt: &str, _model: Option<&str>) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Provider("script exhausted".to_string()))
    }
}

#[derive(Default)]
pub struct FailingCompletion {
    calls: AtomicUsize,
}

impl FailingCompletion {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Completion for FailingCompletion {
    async fn complete(&self, _prompt: &str, _model: Option<&str>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(Error::Provider("connection refused".to_string()))
    }
}

/// The `hello` domain as shipped under `data/hello`.
pub fn hello_catalog() -> DomainCatalog {
    let greeting = GraphSpec::new(
        vec![
            NodeSpec::node("greet", "GreetingNode"),
            NodeSpec::node("feedback", "FeedbackManager"),
        ],
        vec![EdgeSpec::new("greet", "feedback")],
    );
    let farewell = GraphSpec::new(vec![NodeSpec::node("farewell", "GreetingNode")], vec![]);
    let qa = GraphSpec::new(
        vec![
            NodeSpec::agent("answer", "HelloAgent"),
            NodeSpec::node("reflect", "ReflectionNode"),
            NodeSpec::agent("clarify", "HelloAgent"),
            NodeSpec::node("feedback", "FeedbackManager"),
        ],
        vec![
            EdgeSpec::new("answer", "reflect"),
            EdgeSpec::when("reflect", "clarify", "if:clarify_question").unwrap(),
            EdgeSpec::new("reflect", "feedback"),
            EdgeSpec::new("clarify", "feedback"),
        ],
    );

    let domain = DomainConfig::new("hello")
        .with_intent(IntentSpec::new("greeting", &["hi", "hello", "hey", "morning"], "User greets the assistant"))
        .with_intent(IntentSpec::new("farewell", &["bye", "goodbye", "see you"], "User ends the conversation"))
        .with_intent(IntentSpec::new("qa", &[], "General question answering"))
        .with_workflow("greeting", greeting)
        .with_workflow("farewell", farewell)
        .with_workflow("qa", qa);

    DomainCatalog::new("hello", vec![domain]).unwrap()
}

pub fn test_registries(completion: Arc<dyn Completion>) -> (AgentRegistry, NodeRegistry) {
    let hello: Arc<dyn Agent> = Arc::new(HelloAgent::new(
        completion,
        Arc::new(ToolRegistry::with_defaults()),
    ));
    let mut agents = AgentRegistry::default();
    agents.register(HelloAgent::NAME, hello.clone()).unwrap();

    let greeting: Arc<dyn ControlNode> = Arc::new(GreetingNode::new(hello));
    let mut nodes = NodeRegistry::default();
    nodes.register(GreetingNode::NAME, greeting.into()).unwrap();
    (agents, nodes)
}

pub fn test_builder(catalog: Arc<DomainCatalog>, completion: Arc<dyn Completion>) -> GraphBuilder {
    let (agents, nodes) = test_registries(completion.clone());
    GraphBuilder::new(
        catalog,
        Arc::new(agents),
        Arc::new(nodes),
        Arc::new(ReflectionNode::new(completion)),
        Arc::new(FeedbackManager::new()),
    )
}

pub fn test_orchestrator(
    catalog: Arc<DomainCatalog>,
    completion: Arc<dyn Completion>,
    backend: Arc<dyn MemoryBackend>,
) -> Orchestrator {
    let router = IntentRouter::new(catalog.clone(), completion.clone());
    let builder = test_builder(catalog, completion);
    Orchestrator::new(router, builder, GraphEngine::default(), StateBridge::new(backend))
}
