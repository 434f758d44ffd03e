//! Turns a declarative workflow into an executable graph by resolving every
//! node spec to a step handler.

use conductor_core::{DomainCatalog, Error, GraphSpec, NodeKind, NodeSpec, Predicate, Result};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::feedback::FeedbackManager;
use crate::node::{BuiltinNode, NodeHandler};
use crate::reflection::ReflectionNode;
use crate::registry::{AgentRegistry, NodeRegistry};
use crate::step::{AgentStep, NodeStep, StepHandler, SyncNodeStep};

pub struct GraphNode {
    pub name: String,
    pub kind: NodeKind,
    pub class: String,
    pub handler: Arc<dyn StepHandler>,
}

/// Outgoing edges of one node. Conditional edges keep declaration order.
#[derive(Debug, Clone, Default)]
pub struct Outgoing {
    pub conditional: Vec<(Predicate, String)>,
    pub next: Option<String>,
}

pub struct ExecutableGraph {
    pub domain: String,
    pub intent: String,
    entry: String,
    order: Vec<String>,
    nodes: HashMap<String, GraphNode>,
    outgoing: HashMap<String, Outgoing>,
}

impl ExecutableGraph {
    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.nodes.get(name)
    }

    /// Node names in declaration order.
    pub fn node_names(&self) -> &[String] {
        &self.order
    }

    pub fn outgoing(&self, name: &str) -> Option<&Outgoing> {
        self.outgoing.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn describe(&self) -> Value {
        let nodes: Vec<Value> = self
            .order
            .iter()
            .filter_map(|n| self.nodes.get(n))
            .map(|n| json!({"name": n.name, "type": n.kind.to_string(), "class": n.class}))
            .collect();

        let mut edges = Vec::new();
        for name in &self.order {
            let Some(out) = self.outgoing.get(name) else { continue };
            for (pred, dst) in &out.conditional {
                edges.push(json!([name, dst, pred.to_string()]));
            }
            if let Some(dst) = &out.next {
                edges.push(json!([name, dst]));
            }
        }

        json!({
            "domain": self.domain,
            "intent": self.intent,
            "entry": self.entry,
            "nodes": nodes,
            "edges": edges,
        })
    }
}

pub struct GraphBuilder {
    catalog: Arc<DomainCatalog>,
    agents: Arc<AgentRegistry>,
    nodes: Arc<NodeRegistry>,
    reflection: Arc<ReflectionNode>,
    feedback: Arc<FeedbackManager>,
}

impl GraphBuilder {
    pub fn new(
        catalog: Arc<DomainCatalog>,
        agents: Arc<AgentRegistry>,
        nodes: Arc<NodeRegistry>,
        reflection: Arc<ReflectionNode>,
        feedback: Arc<FeedbackManager>,
    ) -> Self {
        Self {
            catalog,
            agents,
            nodes,
            reflection,
            feedback,
        }
    }

    /// Looks up the workflow for `intent` in `domain`, then in the default domain.
    fn find_spec(&self, intent: &str, domain: &str) -> Result<(&str, &GraphSpec)> {
        let config = self.catalog.resolve(Some(domain));
        if let Some(spec) = config.workflow(intent) {
            return Ok((config.name.as_str(), spec));
        }

        let default = self.catalog.resolve(None);
        if default.name != config.name {
            if let Some(spec) = default.workflow(intent) {
                warn!(
                    domain = %config.name,
                    intent = %intent,
                    fallback = %default.name,
                    "Workflow not found in domain, using default domain"
                );
                return Ok((default.name.as_str(), spec));
            }
        }

        Err(Error::Config(format!(
            "No workflow for intent '{}' in domain '{}' or default domain '{}'",
            intent, config.name, default.name
        )))
    }

    pub fn build(&self, intent: &str, domain: &str) -> Result<ExecutableGraph> {
        let (resolved_domain, spec) = self.find_spec(intent, domain)?;
        spec.validate(resolved_domain, intent)?;

        let mut nodes = HashMap::new();
        let mut order = Vec::with_capacity(spec.nodes.len());
        for node in &spec.nodes {
            let handler = self.resolve_handler(resolved_domain, node)?;
            debug!(domain = %resolved_domain, node = %node.name, class = %node.class, "Resolved node");
            order.push(node.name.clone());
            nodes.insert(
                node.name.clone(),
                GraphNode {
                    name: node.name.clone(),
                    kind: node.kind,
                    class: node.class.clone(),
                    handler,
                },
            );
        }

        let mut outgoing: HashMap<String, Outgoing> = HashMap::new();
        for edge in &spec.edges {
            let out = outgoing.entry(edge.src.clone()).or_default();
            match &edge.condition {
                Some(pred) => out.conditional.push((pred.clone(), edge.dst.clone())),
                None if out.next.is_some() => {
                    warn!(
                        domain = %resolved_domain,
                        node = %edge.src,
                        ignored = %edge.dst,
                        "Multiple unconditional edges, keeping the first"
                    );
                }
                None => out.next = Some(edge.dst.clone()),
            }
        }

        // validate() guarantees at least one node.
        let entry = order.first().cloned().unwrap_or_default();
        info!(
            domain = %resolved_domain,
            intent = %intent,
            entry = %entry,
            nodes = order.len(),
            edges = spec.edges.len(),
            "Graph built"
        );

        Ok(ExecutableGraph {
            domain: resolved_domain.to_string(),
            intent: intent.to_string(),
            entry,
            order,
            nodes,
            outgoing,
        })
    }

    fn resolve_handler(&self, domain: &str, node: &NodeSpec) -> Result<Arc<dyn StepHandler>> {
        match node.kind {
            NodeKind::Agent => {
                let agent = self.agents.get(&node.class).ok_or_else(|| {
                    Error::build(domain, &node.name, format!("unknown agent class '{}'", node.class))
                })?;
                Ok(Arc::new(AgentStep::new(agent)))
            }
            NodeKind::Node => {
                if let Some(builtin) = BuiltinNode::from_class(&node.class) {
                    let handler: Arc<dyn StepHandler> = match builtin {
                        BuiltinNode::Reflection => Arc::new(NodeStep::new(self.reflection.clone())),
                        BuiltinNode::Feedback => Arc::new(NodeStep::new(self.feedback.clone())),
                    };
                    return Ok(handler);
                }
                match self.nodes.get(&node.class) {
                    Some(NodeHandler::Async(n)) => Ok(Arc::new(NodeStep::new(n))),
                    Some(NodeHandler::Sync(n)) => Ok(Arc::new(SyncNodeStep::new(n))),
                    None => Err(Error::build(
                        domain,
                        &node.name,
                        format!("unknown node class '{}'", node.class),
                    )),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hello_catalog, test_builder, FailingCompletion};
    use conductor_core::{DomainConfig, EdgeSpec, IntentSpec};

    #[test]
    fn test_build_is_deterministic() {
        let builder = test_builder(Arc::new(hello_catalog()), Arc::new(FailingCompletion::default()));
        let a = builder.build("greeting", "hello").unwrap();
        let b = builder.build("greeting", "hello").unwrap();
        assert_eq!(a.entry(), "greet");
        assert_eq!(a.entry(), b.entry());
        assert_eq!(a.describe(), b.describe());
        assert_eq!(a.node_names(), &["greet".to_string(), "feedback".to_string()]);
        assert_eq!(a.outgoing("greet").unwrap().next.as_deref(), Some("feedback"));
        assert!(a.outgoing("feedback").is_none());
    }

    #[test]
    fn test_conditional_edges_kept_in_order() {
        let builder = test_builder(Arc::new(hello_catalog()), Arc::new(FailingCompletion::default()));
        let g = builder.build("qa", "hello").unwrap();
        let out = g.outgoing("reflect").unwrap();
        assert_eq!(out.conditional.len(), 1);
        assert_eq!(out.conditional[0].0.key, "clarify_question");
        assert_eq!(out.conditional[0].1, "clarify");
        assert_eq!(out.next.as_deref(), Some("feedback"));
    }

    #[test]
    fn test_missing_workflow_falls_back_to_default_domain() {
        let other = DomainConfig::new("other").with_intent(IntentSpec::new("greeting", &["yo"], "Greeting"));
        let mut domains = vec![other];
        domains.extend(hello_catalog().domains().cloned());
        let catalog = DomainCatalog::new("hello", domains).unwrap();
        let builder = test_builder(Arc::new(catalog), Arc::new(FailingCompletion::default()));

        let g = builder.build("greeting", "other").unwrap();
        assert_eq!(g.domain, "hello");

        let err = builder.build("billing", "other").err().unwrap();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_zero_node_workflow_is_config_error() {
        let domain = DomainConfig::new("hello")
            .with_intent(IntentSpec::new("qa", &[], "Questions"))
            .with_workflow("qa", GraphSpec::default());
        let catalog = DomainCatalog::new("hello", vec![domain]).unwrap();
        let builder = test_builder(Arc::new(catalog), Arc::new(FailingCompletion::default()));
        let err = builder.build("qa", "hello").err().unwrap();
        assert_eq!(err.kind(), "config");
    }

    #[test]
    fn test_unknown_class_names_node_and_domain() {
        let spec = GraphSpec::new(
            vec![NodeSpec::agent("a", "HelloAgent"), NodeSpec::node("b", "MissingNode")],
            vec![EdgeSpec::new("a", "b")],
        );
        let domain = DomainConfig::new("hello")
            .with_intent(IntentSpec::new("qa", &[], "Questions"))
            .with_workflow("qa", spec);
        let catalog = DomainCatalog::new("hello", vec![domain]).unwrap();
        let builder = test_builder(Arc::new(catalog), Arc::new(FailingCompletion::default()));

        match builder.build("qa", "hello") {
            Err(Error::Build { domain, node, reason }) => {
                assert_eq!(domain, "hello");
                assert_eq!(node, "b");
                assert!(reason.contains("MissingNode"));
            }
            other => panic!("expected build error, got {:?}", other.map(|g| g.describe())),
        }

        let spec = GraphSpec::new(vec![NodeSpec::agent("x", "NoSuchAgent")], vec![]);
        let domain = DomainConfig::new("hello")
            .with_intent(IntentSpec::new("qa", &[], "Questions"))
            .with_workflow("qa", spec);
        let catalog = DomainCatalog::new("hello", vec![domain]).unwrap();
        let builder = test_builder(Arc::new(catalog), Arc::new(FailingCompletion::default()));
        assert_eq!(builder.build("qa", "hello").err().unwrap().kind(), "build");
    }

    #[test]
    fn test_shipped_hello_domain_matches_fixture() {
        let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../data");
        let shipped = DomainCatalog::load_dir(&dir, "hello").unwrap();
        let llm: Arc<dyn conductor_providers::Completion> = Arc::new(FailingCompletion::default());
        let from_disk = test_builder(Arc::new(shipped), llm.clone());
        let fixture = test_builder(Arc::new(hello_catalog()), llm);

        for intent in ["greeting", "farewell", "qa"] {
            let a = from_disk.build(intent, "hello").unwrap();
            let b = fixture.build(intent, "hello").unwrap();
            assert_eq!(a.describe(), b.describe(), "workflow '{}' differs", intent);
        }
    }

    #[test]
    fn test_first_unconditional_edge_wins() {
        let spec = GraphSpec::new(
            vec![
                NodeSpec::agent("a", "HelloAgent"),
                NodeSpec::agent("b", "HelloAgent"),
                NodeSpec::agent("c", "HelloAgent"),
            ],
            vec![EdgeSpec::new("a", "b"), EdgeSpec::new("a", "c")],
        );
        let domain = DomainConfig::new("hello")
            .with_intent(IntentSpec::new("qa", &[], "Questions"))
            .with_workflow("qa", spec);
        let catalog = DomainCatalog::new("hello", vec![domain]).unwrap();
        let builder = test_builder(Arc::new(catalog), Arc::new(FailingCompletion::default()));
        let g = builder.build("qa", "hello").unwrap();
        assert_eq!(g.outgoing("a").unwrap().next.as_deref(), Some("b"));
    }
}
