use conductor_agent::{
    Agent, AgentRegistry, ControlNode, FeedbackManager, GraphBuilder, GraphEngine, GreetingNode,
    HelloAgent, IntentRouter, NodeRegistry, Orchestrator, PipelineOptions, ReflectionNode, StateBridge,
};
use conductor_core::{Config, DomainCatalog, Paths};
use conductor_providers::{create_completion, Completion};
use conductor_storage::{BackendRegistry, FeedbackLog, MemoryBackend};
use conductor_tools::ToolRegistry;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Domain files shipped next to the binary's working directory.
const BUNDLED_DATA_DIR: &str = "data";

/// Loads `~/.conductor/config.json` with environment overrides applied.
pub fn load_config() -> anyhow::Result<(Config, Paths)> {
    let paths = Paths::new();
    let mut config = Config::load_or_default(&paths)
        .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", paths.config_file().display(), e))?;
    config.apply_env()?;
    Ok((config, paths))
}

/// An explicit `--data-dir` always wins. Otherwise the configured directory is
/// used when it exists, then `./data`.
fn resolve_data_dir(explicit: Option<PathBuf>, configured: PathBuf, bundled: &Path) -> PathBuf {
    if let Some(dir) = explicit {
        return dir;
    }
    if configured.is_dir() || !bundled.is_dir() {
        return configured;
    }
    warn!(
        configured = %configured.display(),
        fallback = %bundled.display(),
        "Configured data directory missing, using bundled domains"
    );
    bundled.to_path_buf()
}

pub fn load_catalog(config: &Config, paths: &Paths, data_dir: Option<PathBuf>) -> anyhow::Result<DomainCatalog> {
    let dir = resolve_data_dir(data_dir, config.data_dir(paths), Path::new(BUNDLED_DATA_DIR));
    let catalog = DomainCatalog::load_dir(&dir, &config.orchestrator.default_domain)
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to load domains from {}: {} (pass --data-dir or set orchestrator.dataDir)",
                dir.display(),
                e
            )
        })?;
    Ok(catalog)
}

pub fn open_backend(config: &Config, paths: &Paths) -> anyhow::Result<Arc<dyn MemoryBackend>> {
    let backends = BackendRegistry::from_config(config, paths)?;
    Ok(backends.active(config.memory.backend)?)
}

/// Everything the pipeline needs, constructed once per process.
pub struct App {
    pub config: Config,
    pub catalog: Arc<DomainCatalog>,
    pub orchestrator: Orchestrator,
}

impl App {
    pub fn build(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let (config, paths) = load_config()?;
        let catalog = Arc::new(load_catalog(&config, &paths, data_dir)?);
        let completion = create_completion(&config);
        let backend = open_backend(&config, &paths)?;

        let (agents, nodes) = register_components(completion.clone())?;
        let feedback = if config.feedback.log_enabled {
            FeedbackManager::with_sink(Arc::new(FeedbackLog::new(paths.clone())))
        } else {
            FeedbackManager::new()
        };

        let router = IntentRouter::new(catalog.clone(), completion.clone());
        let builder = GraphBuilder::new(
            catalog.clone(),
            Arc::new(agents),
            Arc::new(nodes),
            Arc::new(ReflectionNode::new(completion)),
            Arc::new(feedback),
        );
        let engine = GraphEngine::new(config.orchestrator.max_steps);
        let orchestrator = Orchestrator::new(router, builder, engine, StateBridge::new(backend))
            .with_options(PipelineOptions {
                record_history: config.orchestrator.record_history,
            });

        info!(
            domains = ?catalog.names(),
            backend = %config.memory.backend,
            "Application assembled"
        );

        Ok(Self {
            config,
            catalog,
            orchestrator,
        })
    }
}

fn register_components(completion: Arc<dyn Completion>) -> anyhow::Result<(AgentRegistry, NodeRegistry)> {
    let tools = Arc::new(ToolRegistry::with_defaults());
    let hello: Arc<dyn Agent> = Arc::new(HelloAgent::new(completion, tools));

    let mut agents = AgentRegistry::default();
    agents.register(HelloAgent::NAME, hello.clone())?;

    let greeting: Arc<dyn ControlNode> = Arc::new(GreetingNode::new(hello));
    let mut nodes = NodeRegistry::default();
    nodes.register(GreetingNode::NAME, greeting.into())?;

    Ok((agents, nodes))
}
