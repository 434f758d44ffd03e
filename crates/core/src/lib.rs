pub mod config;
pub mod domain;
pub mod error;
pub mod paths;
pub mod state;
pub mod types;

pub use config::{Config, MemoryBackendKind, ProviderConfig};
pub use domain::{DomainCatalog, DomainConfig, EdgeSpec, GraphSpec, IntentSpec, NodeKind, NodeSpec, Predicate};
pub use error::{Error, Result};
pub use paths::Paths;
pub use state::{MergePolicy, MergeRule, State, StepResult};
pub use types::{ChatMessage, Decision, FeedbackRecord, LLMResponse, StoredMessage};
