use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    /// Set for Azure-style deployments; selects the `api-key` header and the
    /// deployment URL layout.
    #[serde(default)]
    pub api_version: Option<String>,
    /// `None` follows the environment, `Some("")` forces a direct connection.
    #[serde(default)]
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// Key into `providers`. If not set, the first provider with an api key wins.
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.2
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    #[serde(default = "default_domain")]
    pub default_domain: String,
    /// Directory holding one sub-directory per domain. Falls back to
    /// `~/.conductor/data` when unset.
    #[serde(default)]
    pub data_dir: Option<String>,
    /// Hop limit for a single graph run.
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_record_history")]
    pub record_history: bool,
}

fn default_domain() -> String {
    "hello".to_string()
}

fn default_max_steps() -> usize {
    50
}

fn default_history_limit() -> usize {
    10
}

fn default_record_history() -> bool {
    true
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            default_domain: default_domain(),
            data_dir: None,
            max_steps: default_max_steps(),
            history_limit: default_history_limit(),
            record_history: default_record_history(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MemoryBackendKind {
    #[default]
    InMemory,
    Sqlite,
}

impl MemoryBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryBackendKind::InMemory => "in_memory",
            MemoryBackendKind::Sqlite => "sqlite",
        }
    }
}

impl std::str::FromStr for MemoryBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "in_memory" | "memory" | "inmemory" => Ok(MemoryBackendKind::InMemory),
            "sqlite" => Ok(MemoryBackendKind::Sqlite),
            other => Err(Error::Config(format!("Unknown memory backend: {}", other))),
        }
    }
}

impl std::fmt::Display for MemoryBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MemoryConfig {
    #[serde(default)]
    pub backend: MemoryBackendKind,
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackConfig {
    #[serde(default = "default_log_enabled")]
    pub log_enabled: bool,
}

fn default_log_enabled() -> bool {
    true
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            log_enabled: default_log_enabled(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Applies `CONDUCTOR_*` and provider key overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(domain) = get("CONDUCTOR_DEFAULT_DOMAIN") {
            self.orchestrator.default_domain = domain.trim().to_string();
        }
        if let Some(dir) = get("CONDUCTOR_DATA_DIR") {
            self.orchestrator.data_dir = Some(dir);
        }
        if let Some(backend) = get("CONDUCTOR_MEMORY_BACKEND") {
            self.memory.backend = backend.parse()?;
        }
        if let Some(model) = get("CONDUCTOR_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.providers.entry("openai".to_string()).or_default().api_key = key;
        }
        if let Some(key) = get("AZURE_OPENAI_API_KEY") {
            self.providers.entry("azure".to_string()).or_default().api_key = key;
        }
        if let Some(endpoint) = get("AZURE_OPENAI_ENDPOINT") {
            let azure = self.providers.entry("azure".to_string()).or_default();
            azure.api_base = Some(endpoint);
            if azure.api_version.is_none() {
                azure.api_version = Some(default_azure_api_version());
            }
        }
        Ok(())
    }

    /// Returns the configured provider, or the first one carrying an api key.
    pub fn get_api_key(&self) -> Option<(&str, &ProviderConfig)> {
        if let Some(name) = self.llm.provider.as_deref() {
            return self
                .providers
                .get_key_value(name)
                .filter(|(_, p)| !p.api_key.is_empty())
                .map(|(k, p)| (k.as_str(), p));
        }

        let priority = ["openai", "azure"];
        for name in priority {
            if let Some(provider) = self.providers.get(name) {
                if !provider.api_key.is_empty() {
                    return Some((name, provider));
                }
            }
        }

        let mut names: Vec<&String> = self.providers.keys().collect();
        names.sort();
        names
            .into_iter()
            .filter_map(|n| self.providers.get(n).map(|p| (n.as_str(), p)))
            .find(|(_, p)| !p.api_key.is_empty())
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }

    pub fn data_dir(&self, paths: &Paths) -> PathBuf {
        match self.orchestrator.data_dir.as_deref() {
            Some(dir) => expand_home(dir),
            None => paths.data_dir(),
        }
    }

    pub fn sqlite_path(&self, paths: &Paths) -> PathBuf {
        match self.memory.sqlite_path.as_deref() {
            Some(path) => expand_home(path),
            None => paths.memory_db(),
        }
    }
}

pub fn default_azure_api_version() -> String {
    "2025-01-01-preview".to_string()
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
