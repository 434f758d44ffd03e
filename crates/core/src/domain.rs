//! Declarative per-domain configuration: intent tables and workflow graph specs.
//!
//! On disk a domain is a directory:
//!
//! ```text
//! <data_dir>/<domain>/intents.yaml
//! <data_dir>/<domain>/workflows/<domain>_workflow.yaml
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSpec {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub description: String,
}

impl IntentSpec {
    pub fn new(name: &str, keywords: &[&str], description: &str) -> Self {
        Self {
            name: name.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            description: description.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct IntentBody {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Agent,
    Node,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Agent => f.write_str("agent"),
            NodeKind::Node => f.write_str("node"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub class: String,
}

impl NodeSpec {
    pub fn agent(name: &str, class: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Agent,
            class: class.to_string(),
        }
    }

    pub fn node(name: &str, class: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: NodeKind::Node,
            class: class.to_string(),
        }
    }
}

/// Edge guard written as `if:<key>` or `if:<key>=<value>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    pub key: String,
    pub equals: Option<String>,
}

impl Predicate {
    pub fn parse(raw: &str) -> Result<Self> {
        let body = raw
            .trim()
            .strip_prefix("if:")
            .ok_or_else(|| Error::Config(format!("Edge condition must start with 'if:': {}", raw)))?;
        let (key, equals) = match body.split_once('=') {
            Some((k, v)) => (k.trim(), Some(v.trim().to_string())),
            None => (body.trim(), None),
        };
        if key.is_empty() {
            return Err(Error::Config(format!("Edge condition has no key: {}", raw)));
        }
        Ok(Self {
            key: key.to_string(),
            equals,
        })
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.equals {
            Some(v) => write!(f, "if:{}={}", self.key, v),
            None => write!(f, "if:{}", self.key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct EdgeSpec {
    pub src: String,
    pub dst: String,
    pub condition: Option<Predicate>,
}

impl EdgeSpec {
    pub fn new(src: &str, dst: &str) -> Self {
        Self {
            src: src.to_string(),
            dst: dst.to_string(),
            condition: None,
        }
    }

    pub fn when(src: &str, dst: &str, condition: &str) -> Result<Self> {
        Ok(Self {
            src: src.to_string(),
            dst: dst.to_string(),
            condition: Some(Predicate::parse(condition)?),
        })
    }

    pub fn is_conditional(&self) -> bool {
        self.condition.is_some()
    }
}

impl TryFrom<Vec<String>> for EdgeSpec {
    type Error = Error;

    fn try_from(parts: Vec<String>) -> Result<Self> {
        match parts.as_slice() {
            [src, dst] => Ok(EdgeSpec::new(src, dst)),
            [src, dst, cond] => EdgeSpec::when(src, dst, cond),
            other => Err(Error::Config(format!(
                "Edge must be [src, dst] or [src, dst, \"if:<key>\"], got {:?}",
                other
            ))),
        }
    }
}

impl From<EdgeSpec> for Vec<String> {
    fn from(edge: EdgeSpec) -> Self {
        let mut parts = vec![edge.src, edge.dst];
        if let Some(cond) = edge.condition {
            parts.push(cond.to_string());
        }
        parts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub nodes: Vec<NodeSpec>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

impl GraphSpec {
    pub fn new(nodes: Vec<NodeSpec>, edges: Vec<EdgeSpec>) -> Self {
        Self { nodes, edges }
    }

    pub fn entry(&self) -> Option<&NodeSpec> {
        self.nodes.first()
    }

    /// Structural checks done before any handler is resolved.
    pub fn validate(&self, domain: &str, intent: &str) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Config(format!(
                "Workflow '{}' in domain '{}' declares no nodes",
                intent, domain
            )));
        }

        let mut seen = HashSet::new();
        for node in &self.nodes {
            if node.name.trim().is_empty() || node.class.trim().is_empty() {
                return Err(Error::build(domain, &node.name, "node name and class must be non-empty"));
            }
            if !seen.insert(node.name.as_str()) {
                return Err(Error::build(domain, &node.name, "duplicate node name"));
            }
        }

        for edge in &self.edges {
            for end in [&edge.src, &edge.dst] {
                if !seen.contains(end.as_str()) {
                    return Err(Error::build(
                        domain,
                        end,
                        format!("edge {} -> {} references an undeclared node", edge.src, edge.dst),
                    ));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct DomainConfig {
    pub name: String,
    /// Declaration order is significant for rule matching.
    pub intents: Vec<IntentSpec>,
    pub workflows: BTreeMap<String, GraphSpec>,
}

impl DomainConfig {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_intent(mut self, intent: IntentSpec) -> Self {
        self.intents.push(intent);
        self
    }

    pub fn with_workflow(mut self, intent: &str, graph: GraphSpec) -> Self {
        self.workflows.insert(intent.to_string(), graph);
        self
    }

    pub fn intent(&self, name: &str) -> Option<&IntentSpec> {
        self.intents.iter().find(|i| i.name == name)
    }

    pub fn has_intent(&self, name: &str) -> bool {
        self.intent(name).is_some()
    }

    pub fn workflow(&self, intent: &str) -> Option<&GraphSpec> {
        self.workflows.get(intent)
    }

    /// Loads `<dir>/intents.yaml` and, if present, `<dir>/workflows/<name>_workflow.yaml`.
    pub fn load(name: &str, dir: &Path) -> Result<Self> {
        let intents_path = dir.join("intents.yaml");
        let content = std::fs::read_to_string(&intents_path)?;
        let intents = parse_intents(&content)?;

        let workflow_path = dir.join("workflows").join(format!("{}_workflow.yaml", name));
        let workflows = if workflow_path.exists() {
            let content = std::fs::read_to_string(&workflow_path)?;
            parse_workflows(&content)?
        } else {
            warn!(domain = %name, path = %workflow_path.display(), "No workflow file for domain");
            BTreeMap::new()
        };

        Ok(Self {
            name: name.to_string(),
            intents,
            workflows,
        })
    }
}

pub fn parse_intents(content: &str) -> Result<Vec<IntentSpec>> {
    let doc: serde_yaml::Value = serde_yaml::from_str(content)?;
    let mapping = match doc.get("intents") {
        Some(serde_yaml::Value::Mapping(m)) => m.clone(),
        Some(serde_yaml::Value::Null) | None => serde_yaml::Mapping::new(),
        Some(_) => return Err(Error::Config("'intents' must be a mapping".to_string())),
    };

    let mut intents = Vec::with_capacity(mapping.len());
    for (key, body) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| Error::Config(format!("Intent name must be a string: {:?}", key)))?
            .to_string();
        let body: IntentBody = if body.is_null() {
            IntentBody {
                keywords: Vec::new(),
                description: String::new(),
            }
        } else {
            serde_yaml::from_value(body)?
        };
        intents.push(IntentSpec {
            name,
            keywords: body.keywords,
            description: body.description,
        });
    }
    Ok(intents)
}

pub fn parse_workflows(content: &str) -> Result<BTreeMap<String, GraphSpec>> {
    let workflows: Option<BTreeMap<String, GraphSpec>> = serde_yaml::from_str(content)?;
    Ok(workflows.unwrap_or_default())
}

/// All known domains plus the one used when a request names none or an unknown one.
#[derive(Debug, Clone)]
pub struct DomainCatalog {
    domains: BTreeMap<String, DomainConfig>,
    default_domain: String,
}

impl DomainCatalog {
    pub fn new(default_domain: &str, domains: Vec<DomainConfig>) -> Result<Self> {
        let domains: BTreeMap<String, DomainConfig> =
            domains.into_iter().map(|d| (d.name.clone(), d)).collect();
        if domains.is_empty() {
            return Err(Error::Config("No valid domain configurations found".to_string()));
        }
        if !domains.contains_key(default_domain) {
            return Err(Error::Config(format!(
                "Default domain '{}' is not configured",
                default_domain
            )));
        }
        Ok(Self {
            domains,
            default_domain: default_domain.to_string(),
        })
    }

    /// Scans `dir` for domain sub-directories. Directories without an
    /// `intents.yaml`, or whose files fail to parse, are skipped.
    pub fn load_dir(dir: &Path, default_domain: &str) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::Config(format!("Data directory not found: {}", dir.display())));
        }

        let mut domains = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !path.join("intents.yaml").exists() {
                warn!(domain = %name, "No intents.yaml found for domain");
                continue;
            }
            match DomainConfig::load(&name, &path) {
                Ok(domain) if domain.intents.is_empty() => {
                    warn!(domain = %name, "Empty intents table, skipping domain");
                }
                Ok(domain) => {
                    debug!(
                        domain = %name,
                        intents = domain.intents.len(),
                        workflows = domain.workflows.len(),
                        "Loaded domain"
                    );
                    domains.push(domain);
                }
                Err(e) => {
                    warn!(domain = %name, error = %e, "Failed to load domain, skipping");
                }
            }
        }

        let catalog = Self::new(default_domain, domains)?;
        info!(
            domains = ?catalog.names(),
            default_domain = %catalog.default_domain,
            "Domain catalog loaded"
        );
        Ok(catalog)
    }

    pub fn default_domain(&self) -> &str {
        &self.default_domain
    }

    pub fn get(&self, name: &str) -> Option<&DomainConfig> {
        self.domains.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.domains.keys().map(|k| k.as_str()).collect()
    }

    pub fn domains(&self) -> impl Iterator<Item = &DomainConfig> {
        self.domains.values()
    }

    /// Returns the named domain, or the default one when `name` is absent or unknown.
    pub fn resolve(&self, name: Option<&str>) -> &DomainConfig {
        let requested = name.map(str::trim).filter(|n| !n.is_empty());
        if let Some(domain) = requested.and_then(|n| self.domains.get(n)) {
            return domain;
        }
        if let Some(n) = requested {
            warn!(domain = %n, default = %self.default_domain, "Unknown domain, falling back to default");
        }
        // `new` guarantees the default domain is present.
        &self.domains[&self.default_domain]
    }
}
