use async_trait::async_trait;
use chrono::Utc;
use conductor_core::{Decision, Error, FeedbackRecord, Result, State, StepResult};
use conductor_storage::FeedbackSink;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::node::{BuiltinNode, ControlNode};

const DEFAULT_SCORE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NextAction {
    Retry,
    Review,
    Proceed,
}

impl NextAction {
    /// `reask` or a score below 0.5 retries; below 0.8 asks for review.
    pub fn decide(decision: Decision, score: f64) -> Self {
        if decision == Decision::Reask || score < 0.5 {
            NextAction::Retry
        } else if score < 0.8 {
            NextAction::Review
        } else {
            NextAction::Proceed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NextAction::Retry => "retry",
            NextAction::Review => "review",
            NextAction::Proceed => "proceed",
        }
    }
}

/// Records quality feedback and derives the next orchestration action.
#[derive(Default)]
pub struct FeedbackManager {
    sink: Option<Arc<dyn FeedbackSink>>,
}

impl FeedbackManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sink(sink: Arc<dyn FeedbackSink>) -> Self {
        Self { sink: Some(sink) }
    }

    pub async fn record(&self, record: FeedbackRecord) -> Result<(FeedbackRecord, NextAction)> {
        info!(
            session_id = %record.session_id,
            source = %record.source,
            decision = %record.decision,
            score = record.score,
            comment = %record.comment,
            "Feedback collected"
        );

        match &self.sink {
            Some(sink) => {
                sink.persist(&record).await.map_err(|e| {
                    warn!(session_id = %record.session_id, error = %e, "Failed to persist feedback");
                    Error::Node(format!(
                        "Failed to persist feedback for session '{}': {}",
                        record.session_id, e
                    ))
                })?;
                debug!(session_id = %record.session_id, "Feedback persisted");
            }
            None => debug!(session_id = %record.session_id, "No feedback sink configured"),
        }

        let next = NextAction::decide(record.decision, record.score);
        debug!(session_id = %record.session_id, next_action = next.as_str(), "Feedback processed");
        Ok((record, next))
    }
}

#[async_trait]
impl ControlNode for FeedbackManager {
    fn name(&self) -> &str {
        BuiltinNode::Feedback.class_name()
    }

    async fn execute(&self, state: &State) -> Result<StepResult> {
        let record = record_from_state(state);
        let (record, next) = self.record(record).await?;

        let mut out = StepResult::new();
        out.insert("status".to_string(), json!("recorded"));
        out.insert("next_action".to_string(), json!(next.as_str()));
        out.insert("feedback_record".to_string(), serde_json::to_value(&record)?);
        Ok(out)
    }
}

fn record_from_state(state: &State) -> FeedbackRecord {
    let text = |key: &str, default: &str| {
        state
            .get_str(key)
            .filter(|s| !s.is_empty())
            .unwrap_or(default)
            .to_string()
    };

    let decision = match state.get_str("decision") {
        None => Decision::Ok,
        Some(raw) => Decision::parse(raw).unwrap_or_else(|| {
            warn!(decision = %raw, "Unknown feedback decision, treating as ok");
            Decision::Ok
        }),
    };

    let score = match state.get("score") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(DEFAULT_SCORE),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_SCORE),
        _ => DEFAULT_SCORE,
    };

    FeedbackRecord {
        session_id: text("session_id", "unknown"),
        decision,
        score,
        comment: text("comment", ""),
        source: text("source", "system"),
        timestamp: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::Paths;
    use conductor_storage::{FeedbackLog, FnSink};
    use std::sync::Mutex;

    #[test]
    fn test_threshold_policy() {
        assert_eq!(NextAction::decide(Decision::Ok, 0.4), NextAction::Retry);
        assert_eq!(NextAction::decide(Decision::Ok, 0.5), NextAction::Review);
        assert_eq!(NextAction::decide(Decision::Ok, 0.79), NextAction::Review);
        assert_eq!(NextAction::decide(Decision::Ok, 0.8), NextAction::Proceed);
        assert_eq!(NextAction::decide(Decision::Reask, 1.0), NextAction::Retry);
        assert_eq!(NextAction::decide(Decision::Error, 0.9), NextAction::Proceed);
    }

    #[tokio::test]
    async fn test_defaults_from_empty_state() {
        let out = FeedbackManager::new().execute(&State::new()).await.unwrap();
        assert_eq!(out["status"], "recorded");
        assert_eq!(out["next_action"], "proceed");
        let record = &out["feedback_record"];
        assert_eq!(record["session_id"], "unknown");
        assert_eq!(record["decision"], "ok");
        assert_eq!(record["score"], 0.8);
        assert_eq!(record["source"], "system");
    }

    #[tokio::test]
    async fn test_reads_reflection_output() {
        let mut state = State::new();
        state.insert("session_id", "s1");
        state.insert("decision", "reask");
        state.insert("score", "0.9");
        state.insert("source", "reflection");
        let out = FeedbackManager::new().execute(&state).await.unwrap();
        assert_eq!(out["next_action"], "retry");
        assert_eq!(out["feedback_record"]["score"], 0.9);
        assert_eq!(out["feedback_record"]["source"], "reflection");
    }

    #[tokio::test]
    async fn test_sink_receives_record() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = FnSink::new(move |r: &FeedbackRecord| {
            captured.lock().unwrap().push(r.session_id.clone());
            Ok(())
        });
        let manager = FeedbackManager::with_sink(Arc::new(sink));
        let mut state = State::new();
        state.insert("session_id", "abc");
        manager.execute(&state).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["abc".to_string()]);
    }

    #[tokio::test]
    async fn test_sink_failure_is_fatal() {
        let sink = FnSink::new(|_: &FeedbackRecord| Err(Error::Other("disk full".to_string())));
        let manager = FeedbackManager::with_sink(Arc::new(sink));
        let err = manager.execute(&State::new()).await.unwrap_err();
        assert_eq!(err.kind(), "node");
        assert!(err.to_string().contains("disk full"));
    }

    #[tokio::test]
    async fn test_jsonl_log_sink() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(FeedbackLog::new(Paths::with_base(dir.path().to_path_buf())));
        let manager = FeedbackManager::with_sink(log.clone());
        let mut state = State::new();
        state.insert("session_id", "s-log");
        state.insert("score", 0.3);
        manager.execute(&state).await.unwrap();

        let records = log.read_today().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].session_id, "s-log");
        assert_eq!(records[0].score, 0.3);
    }
}
