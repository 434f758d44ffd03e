//! Intent routing: keyword rules first, then the LLM, then a fixed default.
//!
//! Rule matching walks the domain's intents in declaration order and each
//! intent's keywords in declaration order; the first case-insensitive
//! substring hit wins. The LLM pass only runs when no rule matched, and any
//! failure there (transport, malformed JSON, unknown intent) falls through to
//! the default decision instead of surfacing.

use conductor_core::{DomainCatalog, DomainConfig};
use conductor_providers::{parse_json_reply, Completion};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const DEFAULT_INTENT: &str = "qa";
pub const DEFAULT_CONFIDENCE: f64 = 0.5;
const LLM_DEFAULT_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteMethod {
    Rule,
    Llm,
    Default,
}

impl std::fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RouteMethod::Rule => f.write_str("rule"),
            RouteMethod::Llm => f.write_str("llm"),
            RouteMethod::Default => f.write_str("default"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub domain: String,
    pub intent: String,
    pub confidence: f64,
    pub method: RouteMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_keyword: Option<String>,
}

pub struct IntentRouter {
    catalog: Arc<DomainCatalog>,
    completion: Arc<dyn Completion>,
}

impl IntentRouter {
    pub fn new(catalog: Arc<DomainCatalog>, completion: Arc<dyn Completion>) -> Self {
        Self {
            catalog,
            completion,
        }
    }

    pub fn catalog(&self) -> &DomainCatalog {
        &self.catalog
    }

    /// Never fails: an unknown or missing domain resolves to the default one.
    pub async fn classify(&self, query: &str, domain: Option<&str>) -> RouteDecision {
        let config = self.catalog.resolve(domain);
        let query_lower = query.trim().to_lowercase();
        debug!(domain = %config.name, query = %query, "Starting intent classification");

        if let Some(decision) = match_rules(config, &query_lower) {
            return decision;
        }

        match self.classify_with_llm(config, query).await {
            Some(decision) => decision,
            None => {
                warn!(domain = %config.name, query = %query, "No intent matched; using default fallback");
                RouteDecision {
                    domain: config.name.clone(),
                    intent: DEFAULT_INTENT.to_string(),
                    confidence: DEFAULT_CONFIDENCE,
                    method: RouteMethod::Default,
                    matched_keyword: None,
                }
            }
        }
    }

    async fn classify_with_llm(&self, config: &DomainConfig, query: &str) -> Option<RouteDecision> {
        let prompt = build_prompt(config, query);
        let raw = match self.completion.complete(&prompt, None).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(domain = %config.name, error = %e, "LLM-based intent classification failed");
                return None;
            }
        };

        let Some((intent, confidence)) = parse_llm_reply(&raw) else {
            warn!(domain = %config.name, raw_output = %raw, "LLM returned unusable classification");
            return None;
        };

        if !config.has_intent(&intent) {
            warn!(domain = %config.name, intent = %intent, "LLM named an intent outside the domain table");
            return None;
        }

        info!(domain = %config.name, intent = %intent, confidence, "LLM classified intent");
        Some(RouteDecision {
            domain: config.name.clone(),
            intent,
            confidence,
            method: RouteMethod::Llm,
            matched_keyword: None,
        })
    }
}

fn match_rules(config: &DomainConfig, query_lower: &str) -> Option<RouteDecision> {
    for intent in &config.intents {
        for keyword in &intent.keywords {
            let kw = keyword.trim().to_lowercase();
            if kw.is_empty() {
                continue;
            }
            if query_lower.contains(&kw) {
                info!(domain = %config.name, intent = %intent.name, keyword = %keyword, "Rule-based intent matched");
                return Some(RouteDecision {
                    domain: config.name.clone(),
                    intent: intent.name.clone(),
                    confidence: 1.0,
                    method: RouteMethod::Rule,
                    matched_keyword: Some(keyword.clone()),
                });
            }
        }
    }
    None
}

fn build_prompt(config: &DomainConfig, query: &str) -> String {
    let options: Vec<&str> = config.intents.iter().map(|i| i.name.as_str()).collect();
    let descriptions: Vec<String> = config
        .intents
        .iter()
        .map(|i| format!("{}: {}", i.name, i.description))
        .collect();

    format!(
        "You are an intent classifier for the domain '{domain}'.\n\n\
         Possible intents: {options:?}\n\n\
         Descriptions:\n{descriptions}\n\n\
         Task:\n\
         Identify which intent best fits this user query.\n\
         Return ONLY JSON in this structure:\n\
         {{\"intent\": \"<one of {options:?}>\", \"confidence\": <float 0.0 - 1.0>}}\n\n\
         Query: {query}",
        domain = config.name,
        options = options,
        descriptions = descriptions.join("\n"),
        query = query,
    )
}

/// `(intent, confidence)` from the LLM reply. Confidence defaults to 0.8 and
/// is clamped into `[0, 1]`.
fn parse_llm_reply(raw: &str) -> Option<(String, f64)> {
    let parsed = parse_json_reply(raw)?;
    let intent = parsed.get("intent")?.as_str()?.trim().to_string();
    if intent.is_empty() {
        return None;
    }
    let confidence = match parsed.get("confidence") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(LLM_DEFAULT_CONFIDENCE),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(LLM_DEFAULT_CONFIDENCE),
        _ => LLM_DEFAULT_CONFIDENCE,
    };
    Some((intent, confidence.clamp(0.0, 1.0)))
}
