//! Self-evaluation step: asks the LLM to grade the previous answer and, on a
//! `reask` verdict, to phrase a clarifying follow-up question.

use async_trait::async_trait;
use conductor_core::{Decision, Error, Result, State, StepResult};
use conductor_providers::{parse_json_reply, Completion};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use crate::node::{BuiltinNode, ControlNode};

/// State keys checked, in order, for the answer under review.
const ANSWER_KEYS: [&str; 4] = ["previous_output", "answer", "reply", "agent_reply"];

/// Keys a verdict writes. They describe one turn only and are dropped from
/// loaded session state before the next run.
pub const VERDICT_KEYS: [&str; 5] = ["decision", "score", "comment", "source", "clarify_question"];

const UNPARSED_SCORE: f64 = 0.8;
const REASK_SCORE: f64 = 0.6;
const OK_SCORE: f64 = 0.9;

#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub decision: Decision,
    pub score: f64,
    pub comment: String,
    pub clarify_question: Option<String>,
}

impl Evaluation {
    fn into_step_result(self) -> StepResult {
        let mut out = StepResult::new();
        out.insert("decision".to_string(), json!(self.decision.as_str()));
        out.insert("score".to_string(), json!(self.score));
        out.insert("comment".to_string(), json!(self.comment));
        out.insert("source".to_string(), json!("reflection"));
        if let Some(q) = self.clarify_question {
            out.insert("clarify_question".to_string(), json!(q));
        }
        out
    }
}

pub struct ReflectionNode {
    completion: Arc<dyn Completion>,
}

impl ReflectionNode {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self { completion }
    }

    /// Grades `answer` against `query`. Completion failures propagate as
    /// `Error::Node`; an unparseable verdict is treated as a pass.
    pub async fn evaluate(&self, query: &str, answer: &str) -> Result<Evaluation> {
        if answer.trim().is_empty() {
            warn!(query = %query, "No answer found, skipping reflection");
            return Ok(Evaluation {
                decision: Decision::Ok,
                score: 1.0,
                comment: "No answer to review.".to_string(),
                clarify_question: None,
            });
        }

        let raw = self
            .completion
            .complete(&review_prompt(query, answer), None)
            .await
            .map_err(|e| {
                warn!(query = %query, error = %e, "Reflection evaluation failed");
                Error::Node(format!("Reflection LLM evaluation failed: {}", e))
            })?;

        let Some(parsed) = parse_json_reply(&raw) else {
            warn!(raw_output = %raw, "Non-JSON reflection verdict received");
            return Ok(Evaluation {
                decision: Decision::Ok,
                score: UNPARSED_SCORE,
                comment: "Could not parse; assumed OK.".to_string(),
                clarify_question: None,
            });
        };

        let comment = parsed
            .get("comment")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let reask = parsed
            .get("decision")
            .and_then(Value::as_str)
            .and_then(Decision::parse)
            == Some(Decision::Reask);

        if reask {
            let clarification = self.clarify(query).await;
            let score = score_of(&parsed).unwrap_or(REASK_SCORE);
            info!(query = %query, clarify_question = %clarification, score, "Reask triggered");
            return Ok(Evaluation {
                decision: Decision::Reask,
                score,
                comment,
                clarify_question: Some(clarification),
            });
        }

        let score = score_of(&parsed).unwrap_or(OK_SCORE);
        info!(query = %query, score, "Reflection complete");
        Ok(Evaluation {
            decision: Decision::Ok,
            score,
            comment,
            clarify_question: None,
        })
    }

    async fn clarify(&self, query: &str) -> String {
        let prompt = format!("Generate a short follow-up question to clarify: {}", query);
        match self.completion.complete(&prompt, None).await {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => fallback_clarification(query),
            Err(e) => {
                warn!(query = %query, error = %e, "Clarification generation failed");
                fallback_clarification(query)
            }
        }
    }
}

#[async_trait]
impl ControlNode for ReflectionNode {
    fn name(&self) -> &str {
        BuiltinNode::Reflection.class_name()
    }

    async fn execute(&self, state: &State) -> Result<StepResult> {
        let query = state.get_str("query").unwrap_or_default();
        let answer = ANSWER_KEYS
            .iter()
            .filter_map(|k| state.get_str(k))
            .find(|s| !s.trim().is_empty())
            .unwrap_or_default();
        Ok(self.evaluate(query, answer).await?.into_step_result())
    }
}

fn review_prompt(query: &str, answer: &str) -> String {
    format!(
        "You are a strict evaluator of AI responses.\n\n\
         Evaluate the assistant's answer for the given question.\n\n\
         Question: {}\n\
         Answer: {}\n\n\
         Return JSON:\n\
         {{\"score\": <float 0.0 - 1.0>, \"decision\": \"ok\" or \"reask\", \
         \"comment\": \"Explain your reasoning in one line.\"}}",
        query, answer
    )
}

fn fallback_clarification(query: &str) -> String {
    format!("Could you clarify your question about: {}?", query)
}

fn score_of(parsed: &Value) -> Option<f64> {
    match parsed.get("score")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
