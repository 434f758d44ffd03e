use async_trait::async_trait;
use conductor_core::{Error, Result};
use serde_json::{json, Value};

use crate::{Tool, ToolContext, ToolSchema};

pub struct TextStatsTool;

#[async_trait]
impl Tool for TextStatsTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "text_stats",
            description: "Count characters, words and lines of a text.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "Text to measure" }
                },
                "required": ["text"]
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        params
            .get("text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Validation("Missing required parameter: text".to_string()))?;
        Ok(())
    }

    async fn execute(&self, _ctx: ToolContext, params: Value) -> Result<Value> {
        let text = params["text"].as_str().unwrap_or_default();
        Ok(json!({
            "characters": text.chars().count(),
            "words": text.split_whitespace().count(),
            "lines": text.lines().count(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_counts() {
        let out = TextStatsTool
            .execute(ToolContext::default(), json!({"text": "héllo there\nfriend"}))
            .await
            .unwrap();
        assert_eq!(out["characters"], 18);
        assert_eq!(out["words"], 3);
        assert_eq!(out["lines"], 2);
    }
}
