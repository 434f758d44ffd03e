use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Memory error: {0}")]
    Memory(String),

    #[error("Build error in domain '{domain}', node '{node}': {reason}")]
    Build {
        domain: String,
        node: String,
        reason: String,
    },

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Node error: {0}")]
    Node(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn build(domain: &str, node: &str, reason: impl Into<String>) -> Self {
        Error::Build {
            domain: domain.to_string(),
            node: node.to_string(),
            reason: reason.into(),
        }
    }

    /// Short machine-readable tag for the error category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::Yaml(_) => "config",
            Error::Provider(_) => "provider",
            Error::Memory(_) => "memory",
            Error::Build { .. } => "build",
            Error::Graph(_) => "graph",
            Error::Node(_) => "node",
            Error::Agent(_) => "agent",
            Error::Tool(_) => "tool",
            Error::Registry(_) => "registry",
            Error::Validation(_) => "validation",
            Error::Io(_) | Error::Json(_) | Error::Other(_) => "internal",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
