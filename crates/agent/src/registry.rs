use conductor_core::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::node::NodeHandler;

/// Name → implementation map, filled by the composition root at startup and
/// read-only afterwards.
pub struct Registry<T: Clone> {
    component: &'static str,
    entries: HashMap<String, T>,
}

impl<T: Clone> Registry<T> {
    pub fn new(component: &'static str) -> Self {
        Self {
            component,
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, entry: T) -> Result<()> {
        if self.entries.contains_key(name) {
            return Err(Error::Registry(format!(
                "{} '{}' already registered",
                self.component, name
            )));
        }
        debug!(component = self.component, name = %name, "Registered");
        self.entries.insert(name.to_string(), entry);
        Ok(())
    }

    /// Inserts or replaces.
    pub fn register_override(&mut self, name: &str, entry: T) {
        if self.entries.insert(name.to_string(), entry).is_some() {
            info!(component = self.component, name = %name, "Registration overridden");
        }
    }

    pub fn get(&self, name: &str) -> Option<T> {
        self.entries.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type AgentRegistry = Registry<Arc<dyn Agent>>;
pub type NodeRegistry = Registry<NodeHandler>;

impl Default for AgentRegistry {
    fn default() -> Self {
        Registry::new("agent")
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Registry::new("node")
    }
}
