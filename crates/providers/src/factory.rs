use conductor_core::config::{default_azure_api_version, ProviderConfig};
use conductor_core::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::{ApiStyle, Completion, OfflineCompletion, OpenAIProvider, Provider, ProviderCompletion};

fn default_api_base(provider_name: &str) -> &'static str {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "groq" => "https://api.groq.com/openai/v1",
        _ => "https://api.openai.com/v1",
    }
}

fn api_style(name: &str, cfg: &ProviderConfig) -> ApiStyle {
    match (&cfg.api_version, name) {
        (Some(v), _) => ApiStyle::Azure {
            api_version: v.clone(),
        },
        (None, "azure") => ApiStyle::Azure {
            api_version: default_azure_api_version(),
        },
        _ => ApiStyle::OpenAI,
    }
}

/// Provider selection: `llm.provider` if set, otherwise the first provider with
/// an api key.
pub fn create_provider(config: &Config) -> anyhow::Result<Box<dyn Provider>> {
    let (name, cfg) = match config.llm.provider.as_deref() {
        Some(explicit) => {
            let cfg = config.get_provider(explicit).ok_or_else(|| {
                anyhow::anyhow!(
                    "Provider '{}' is explicitly configured but not found in providers section",
                    explicit
                )
            })?;
            if cfg.api_key.is_empty() {
                return Err(anyhow::anyhow!(
                    "Provider '{}' is explicitly configured but has no API key",
                    explicit
                ));
            }
            (explicit, cfg)
        }
        None => config.get_api_key().ok_or_else(|| {
            anyhow::anyhow!("No LLM provider configured. Add an API key to the providers section.")
        })?,
    };

    let style = api_style(name, cfg);
    let api_base = match (&style, cfg.api_base.as_deref()) {
        (_, Some(base)) => base,
        (ApiStyle::Azure { .. }, None) => {
            return Err(anyhow::anyhow!("Provider '{}' uses the Azure layout but has no apiBase", name));
        }
        (ApiStyle::OpenAI, None) => default_api_base(name),
    };

    info!(provider = %name, model = %config.llm.model, style = ?style, "Creating LLM provider");

    Ok(Box::new(OpenAIProvider::with_options(
        &cfg.api_key,
        Some(api_base),
        style,
        &config.llm.model,
        config.llm.max_tokens,
        config.llm.temperature,
        cfg.proxy.as_deref(),
        Duration::from_secs(config.llm.timeout_secs),
    )))
}

/// Completion capability for the composition root. Falls back to
/// `OfflineCompletion` when no provider can be built.
pub fn create_completion(config: &Config) -> Arc<dyn Completion> {
    match create_provider(config) {
        Ok(provider) => Arc::new(ProviderCompletion::new(Arc::from(provider))),
        Err(e) => {
            warn!(error = %e, "LLM disabled, running offline");
            Arc::new(OfflineCompletion)
        }
    }
}
