//! Request pipeline: route, load, build, run, persist. The only place a
//! user-facing error shape is produced.

use conductor_core::{Error, Result, State};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::panic::AssertUnwindSafe;
use tracing::{debug, error, info, warn};

use crate::builder::GraphBuilder;
use crate::engine::{GraphEngine, RunOutput};
use crate::reflection::VERDICT_KEYS;
use crate::router::{IntentRouter, RouteDecision, RouteMethod};
use crate::state_bridge::StateBridge;

/// Keys checked, in order, for the assistant reply of a turn. Only keys the
/// current run wrote count; values carried over from earlier turns do not.
const REPLY_KEYS: [&str; 4] = ["reply", "agent_reply", "response", "greeting"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub status: ResponseStatus,
    pub session_id: String,
    pub query: String,
    pub domain: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<RouteMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn is_ok(&self) -> bool {
        self.status == ResponseStatus::Ok
    }

    /// Reply text of a successful turn, if the workflow produced one.
    pub fn reply(&self) -> Option<&str> {
        self.reply.as_deref()
    }
}

#[derive(Clone, Copy)]
pub struct PipelineHooks {
    pub pre_process: fn(&str) -> String,
    pub post_process: fn(State) -> State,
}

fn trim_query(query: &str) -> String {
    query.trim().to_string()
}

fn keep_state(state: State) -> State {
    state
}

impl Default for PipelineHooks {
    fn default() -> Self {
        Self {
            pre_process: trim_query,
            post_process: keep_state,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub record_history: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self { record_history: true }
    }
}

pub struct Orchestrator {
    router: IntentRouter,
    builder: GraphBuilder,
    engine: GraphEngine,
    bridge: StateBridge,
    hooks: PipelineHooks,
    options: PipelineOptions,
}

impl Orchestrator {
    pub fn new(router: IntentRouter, builder: GraphBuilder, engine: GraphEngine, bridge: StateBridge) -> Self {
        info!(backend = %bridge.backend_name(), max_steps = engine.max_steps(), "Orchestrator initialized");
        Self {
            router,
            builder,
            engine,
            bridge,
            hooks: PipelineHooks::default(),
            options: PipelineOptions::default(),
        }
    }

    pub fn with_hooks(mut self, hooks: PipelineHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn router(&self) -> &IntentRouter {
        &self.router
    }

    pub fn builder(&self) -> &GraphBuilder {
        &self.builder
    }

    pub fn bridge(&self) -> &StateBridge {
        &self.bridge
    }

    /// Never returns an error or unwinds: failures become `status: error`.
    pub async fn handle(&self, session_id: &str, query: &str, domain: Option<&str>) -> ChatResponse {
        info!(session_id = %session_id, query = %query, domain = ?domain, "Received user query");

        let outcome = AssertUnwindSafe(self.run_turn(session_id, query, domain))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Error::Other(panic_message(panic))));

        match outcome {
            Ok(turn) => ChatResponse {
                status: ResponseStatus::Ok,
                session_id: session_id.to_string(),
                query: turn.query,
                domain: turn.route.domain,
                intent: Some(turn.route.intent),
                method: Some(turn.route.method),
                reply: turn.reply,
                result: Some(turn.state.to_value()),
                error: None,
            },
            Err(e) => {
                let domain = domain
                    .map(str::trim)
                    .filter(|d| self.router.catalog().get(d).is_some())
                    .unwrap_or(self.router.catalog().default_domain())
                    .to_string();
                error!(session_id = %session_id, domain = %domain, kind = e.kind(), error = %e, "Error in orchestrator pipeline");
                ChatResponse {
                    status: ResponseStatus::Error,
                    session_id: session_id.to_string(),
                    query: query.trim().to_string(),
                    domain,
                    intent: None,
                    method: None,
                    reply: None,
                    result: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn run_turn(
        &self,
        session_id: &str,
        query: &str,
        domain: Option<&str>,
    ) -> Result<Turn> {
        let clean_query = (self.hooks.pre_process)(query);
        if clean_query.is_empty() {
            return Err(Error::Validation("Query must not be empty".to_string()));
        }
        debug!(session_id = %session_id, clean_query = %clean_query, "Query pre-processed");

        let route = self.router.classify(&clean_query, domain).await;
        info!(
            session_id = %session_id,
            domain = %route.domain,
            intent = %route.intent,
            method = %route.method,
            confidence = route.confidence,
            "Intent classified"
        );

        let mut state = self.bridge.load(session_id).await?;
        let graph = self.builder.build(&route.intent, &route.domain)?;

        for key in VERDICT_KEYS {
            if state.remove(key).is_some() {
                debug!(session_id = %session_id, key = key, "Dropped previous turn's verdict key");
            }
        }
        state.insert("query", clean_query.as_str());
        state.insert("domain", route.domain.as_str());
        state.insert("session_id", session_id);

        let output = self.engine.run_traced(&graph, state).await?;
        info!(
            session_id = %session_id,
            domain = %route.domain,
            intent = %route.intent,
            written = output.written.len(),
            "Workflow execution complete"
        );

        self.bridge.update_memory(session_id, output.state.as_map()).await;
        let reply = turn_reply(&output);
        if self.options.record_history {
            self.record_history(session_id, &clean_query, &route, reply.as_deref()).await;
        }

        let state = (self.hooks.post_process)(output.state);
        self.bridge.save(session_id, &state).await?;
        info!(session_id = %session_id, domain = %route.domain, "Session state persisted");

        Ok(Turn {
            query: clean_query,
            route,
            reply,
            state,
        })
    }

    async fn record_history(&self, session_id: &str, query: &str, route: &RouteDecision, reply: Option<&str>) {
        let meta = json!({"domain": route.domain, "intent": route.intent});
        if let Err(e) = self
            .bridge
            .append_message(session_id, "user", query, Some(meta.clone()))
            .await
        {
            warn!(session_id = %session_id, error = %e, "Failed to record user message");
            return;
        }

        if let Some(reply) = reply {
            if let Err(e) = self
                .bridge
                .append_message(session_id, "assistant", reply, Some(meta))
                .await
            {
                warn!(session_id = %session_id, error = %e, "Failed to record assistant message");
            }
        }
    }
}

struct Turn {
    query: String,
    route: RouteDecision,
    reply: Option<String>,
    state: State,
}

fn turn_reply(output: &RunOutput) -> Option<String> {
    REPLY_KEYS
        .iter()
        .filter_map(|k| output.written_str(k))
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("Internal error: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("Internal error: {}", s)
    } else {
        "Internal error".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{hello_catalog, test_orchestrator, FailingCompletion, ScriptedCompletion};
    use conductor_core::{DomainCatalog, DomainConfig, GraphSpec, IntentSpec};
    use conductor_storage::{InMemoryBackend, MemoryBackend};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_hello_greeting_end_to_end() {
        let llm = Arc::new(FailingCompletion::default());
        let backend = Arc::new(InMemoryBackend::new());
        let orch = test_orchestrator(Arc::new(hello_catalog()), llm.clone(), backend.clone());

        let resp = orch.handle("s1", "hello there", Some("hello")).await;
        assert!(resp.is_ok(), "{:?}", resp.error);
        assert_eq!(resp.intent.as_deref(), Some("greeting"));
        assert_eq!(resp.method, Some(RouteMethod::Rule));
        let result = resp.result.as_ref().unwrap();
        assert!(result["agent_reply"].as_str().unwrap().contains("hello there"));
        assert_eq!(result["session_id"], "s1");
        assert_eq!(result["next_action"], "proceed");

        let saved = backend.load_state("s1").await.unwrap().unwrap();
        assert_eq!(saved["greeting"], result["greeting"]);

        let history = backend.get_messages("s1", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, "user");
        assert_eq!(history[0].content, "hello there");
        assert_eq!(history[1].role, "assistant");
    }

    #[tokio::test]
    async fn test_repeat_session_keeps_prior_keys() {
        let llm = Arc::new(ScriptedCompletion::new(vec![
            "Hi!",
            r#"{"intent": "qa", "confidence": 0.9}"#,
            "It depends.",
            r#"{"score": 0.9, "decision": "ok"}"#,
        ]));
        let backend = Arc::new(InMemoryBackend::new());
        let orch = test_orchestrator(Arc::new(hello_catalog()), llm, backend);

        let first = orch.handle("s2", "hello", None).await;
        assert!(first.is_ok(), "{:?}", first.error);

        let second = orch.handle("s2", "what is rust", None).await;
        assert!(second.is_ok(), "{:?}", second.error);
        assert_eq!(second.intent.as_deref(), Some("qa"));
        assert_eq!(second.method, Some(RouteMethod::Llm));
        let result = second.result.unwrap();
        // greeting came from the first turn
        assert_eq!(result["greeting"], "Hello there! Let me think about that for you...");
        assert_eq!(result["query"], "what is rust");
        assert!(result["reply"].as_str().unwrap().contains("what is rust"));
    }

    #[tokio::test]
    async fn test_reply_comes_from_current_turn() {
        let llm = Arc::new(ScriptedCompletion::new(vec!["Hi!"]));
        let backend = Arc::new(InMemoryBackend::new());
        let orch = test_orchestrator(Arc::new(hello_catalog()), llm, backend.clone());

        let first = orch.handle("s7", "hello", None).await;
        assert!(first.is_ok(), "{:?}", first.error);
        assert_eq!(first.reply(), Some("Hello! You said: 'hello'.\nLLM says: Hi!"));

        let second = orch.handle("s7", "goodbye", None).await;
        assert!(second.is_ok(), "{:?}", second.error);
        assert_eq!(second.intent.as_deref(), Some("farewell"));
        assert_eq!(second.reply(), Some("Goodbye! Have a great day ahead!"));
        // earlier keys are still part of the session state
        assert!(second.result.unwrap()["agent_reply"].is_string());

        let history = backend.get_messages("s7", 10).await.unwrap();
        let contents: Vec<&str> = history.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "hello",
                "Hello! You said: 'hello'.\nLLM says: Hi!",
                "goodbye",
                "Goodbye! Have a great day ahead!",
            ]
        );
    }

    #[tokio::test]
    async fn test_verdict_does_not_leak_into_next_turn() {
        let llm = Arc::new(ScriptedCompletion::new(vec![
            r#"{"intent": "qa", "confidence": 0.9}"#,
            "It depends.",
            r#"{"score": 0.2, "decision": "reask", "comment": "Vague."}"#,
            "Which part of Rust?",
            "Rust is a language.",
            "Hi!",
        ]));
        let orch = test_orchestrator(Arc::new(hello_catalog()), llm, Arc::new(InMemoryBackend::new()));

        let first = orch.handle("s8", "what is rust", None).await;
        assert!(first.is_ok(), "{:?}", first.error);
        let result = first.result.unwrap();
        assert_eq!(result["next_action"], "retry");
        assert_eq!(result["clarify_question"], "Which part of Rust?");

        let second = orch.handle("s8", "hello", None).await;
        assert!(second.is_ok(), "{:?}", second.error);
        assert_eq!(second.intent.as_deref(), Some("greeting"));
        let result = second.result.unwrap();
        assert_eq!(result["next_action"], "proceed");
        assert_eq!(result["feedback_record"]["source"], "system");
        assert_eq!(result["feedback_record"]["decision"], "ok");
        assert_eq!(result["feedback_record"]["score"], 0.8);
        assert!(result.get("clarify_question").is_none());
    }

    #[tokio::test]
    async fn test_unknown_domain_falls_back() {
        let orch = test_orchestrator(
            Arc::new(hello_catalog()),
            Arc::new(FailingCompletion::default()),
            Arc::new(InMemoryBackend::new()),
        );
        let resp = orch.handle("s3", "hey", Some("nowhere")).await;
        assert!(resp.is_ok(), "{:?}", resp.error);
        assert_eq!(resp.domain, "hello");
    }

    #[tokio::test]
    async fn test_zero_node_workflow_reports_error() {
        let domain = DomainConfig::new("hello")
            .with_intent(IntentSpec::new("greeting", &["hello"], "Greeting"))
            .with_workflow("greeting", GraphSpec::default());
        let catalog = DomainCatalog::new("hello", vec![domain]).unwrap();
        let llm = Arc::new(FailingCompletion::default());
        let backend = Arc::new(InMemoryBackend::new());
        let orch = test_orchestrator(Arc::new(catalog), llm.clone(), backend.clone());

        let resp = orch.handle("s4", "hello", Some("hello")).await;
        assert_eq!(resp.status, ResponseStatus::Error);
        assert_eq!(resp.domain, "hello");
        assert!(resp.error.unwrap().contains("declares no nodes"));
        assert_eq!(llm.calls(), 0);
        assert!(backend.load_state("s4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_query_is_error_response() {
        let orch = test_orchestrator(
            Arc::new(hello_catalog()),
            Arc::new(FailingCompletion::default()),
            Arc::new(InMemoryBackend::new()),
        );
        let resp = orch.handle("s5", "   ", None).await;
        assert_eq!(resp.status, ResponseStatus::Error);
        let v = serde_json::to_value(&resp).unwrap();
        assert_eq!(v["status"], "error");
        assert!(v.get("result").is_none());
    }

    #[tokio::test]
    async fn test_post_process_hook_applied() {
        fn stamp(mut state: State) -> State {
            state.insert("post_processed", true);
            state
        }
        let backend = Arc::new(InMemoryBackend::new());
        let orch = test_orchestrator(
            Arc::new(hello_catalog()),
            Arc::new(FailingCompletion::default()),
            backend.clone(),
        )
        .with_hooks(PipelineHooks {
            post_process: stamp,
            ..PipelineHooks::default()
        })
        .with_options(PipelineOptions { record_history: false });

        let resp = orch.handle("s6", "hi", None).await;
        assert_eq!(resp.result.unwrap()["post_processed"], true);
        assert!(backend.get_messages("s6", 10).await.unwrap().is_empty());
    }
}
