use async_trait::async_trait;
use conductor_core::{Result, State, StepResult};
use std::sync::Arc;

/// Custom control node executed as a graph step.
#[async_trait]
pub trait ControlNode: Send + Sync {
    fn name(&self) -> &str;
    async fn execute(&self, state: &State) -> Result<StepResult>;
}

/// Control node without suspension points. The builder adapts it to the
/// async step convention.
pub trait SyncControlNode: Send + Sync {
    fn name(&self) -> &str;
    fn execute(&self, state: &State) -> Result<StepResult>;
}

#[derive(Clone)]
pub enum NodeHandler {
    Async(Arc<dyn ControlNode>),
    Sync(Arc<dyn SyncControlNode>),
}

impl NodeHandler {
    pub fn name(&self) -> &str {
        match self {
            NodeHandler::Async(n) => n.name(),
            NodeHandler::Sync(n) => n.name(),
        }
    }
}

impl From<Arc<dyn ControlNode>> for NodeHandler {
    fn from(node: Arc<dyn ControlNode>) -> Self {
        NodeHandler::Async(node)
    }
}

impl From<Arc<dyn SyncControlNode>> for NodeHandler {
    fn from(node: Arc<dyn SyncControlNode>) -> Self {
        NodeHandler::Sync(node)
    }
}

/// Node classes resolved without a registry lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinNode {
    Reflection,
    Feedback,
}

impl BuiltinNode {
    pub fn from_class(class: &str) -> Option<Self> {
        match class {
            "ReflectionNode" => Some(BuiltinNode::Reflection),
            "FeedbackManager" => Some(BuiltinNode::Feedback),
            _ => None,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            BuiltinNode::Reflection => "ReflectionNode",
            BuiltinNode::Feedback => "FeedbackManager",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_classes() {
        assert_eq!(BuiltinNode::from_class("ReflectionNode"), Some(BuiltinNode::Reflection));
        assert_eq!(BuiltinNode::from_class("FeedbackManager"), Some(BuiltinNode::Feedback));
        assert_eq!(BuiltinNode::from_class("GreetingNode"), None);
        assert_eq!(BuiltinNode::Feedback.class_name(), "FeedbackManager");
    }
}
