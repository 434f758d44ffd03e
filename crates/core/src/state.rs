//! Session state threaded through a workflow run.
//!
//! A [`State`] is an insertion-ordered JSON object plus a version counter that
//! advances once per merged step result. Merging is shallow and right-biased;
//! individual keys can opt into [`MergeRule::Append`] through a [`MergePolicy`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Output of a single step, merged into the running [`State`].
pub type StepResult = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeRule {
    /// Incoming value overwrites the existing one.
    #[default]
    Replace,
    /// Arrays are concatenated; a non-array on either side is wrapped first.
    Append,
}

#[derive(Debug, Clone, Default)]
pub struct MergePolicy {
    rules: HashMap<String, MergeRule>,
}

impl MergePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, key: &str, rule: MergeRule) -> Self {
        self.rules.insert(key.to_string(), rule);
        self
    }

    pub fn rule_for(&self, key: &str) -> MergeRule {
        self.rules.get(key).copied().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    values: Map<String, Value>,
    #[serde(default)]
    version: u64,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values, version: 0 }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_string(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.values
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }

    /// Shallow, right-biased merge: keys in `result` overwrite, others are kept.
    pub fn merge(&mut self, result: StepResult) {
        self.merge_with(result, &MergePolicy::default());
    }

    pub fn merge_with(&mut self, result: StepResult, policy: &MergePolicy) {
        for (key, incoming) in result {
            match policy.rule_for(&key) {
                MergeRule::Replace => {
                    self.values.insert(key, incoming);
                }
                MergeRule::Append => {
                    let merged = match self.values.remove(&key) {
                        Some(existing) => append_values(existing, incoming),
                        None => incoming,
                    };
                    self.values.insert(key, merged);
                }
            }
        }
        self.version += 1;
    }
}

impl From<Map<String, Value>> for State {
    fn from(values: Map<String, Value>) -> Self {
        Self::from_map(values)
    }
}

fn append_values(existing: Value, incoming: Value) -> Value {
    let mut items = match existing {
        Value::Array(items) => items,
        other => vec![other],
    };
    match incoming {
        Value::Array(more) => items.extend(more),
        other => items.push(other),
    }
    Value::Array(items)
}

/// JSON truthiness: `true`, non-zero numbers and non-empty strings, arrays and objects.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}
