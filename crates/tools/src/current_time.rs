use async_trait::async_trait;
use chrono::format::{Item, StrftimeItems};
use chrono::Utc;
use conductor_core::{Error, Result};
use serde_json::{json, Value};

use crate::{Tool, ToolContext, ToolSchema};

/// Tool: current_time. UTC now as RFC 3339, or with a strftime `format`.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "current_time",
            description: "Return the current UTC time. Optionally formatted with a strftime pattern.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "format": {
                        "type": "string",
                        "description": "strftime pattern, e.g. '%Y-%m-%d %H:%M'"
                    }
                }
            }),
        }
    }

    fn validate(&self, params: &Value) -> Result<()> {
        match params.get("format") {
            None | Some(Value::Null) => Ok(()),
            Some(Value::String(fmt)) => {
                if StrftimeItems::new(fmt).any(|item| matches!(item, Item::Error)) {
                    return Err(Error::Validation(format!("Invalid time format: {}", fmt)));
                }
                Ok(())
            }
            Some(_) => Err(Error::Validation("Parameter 'format' must be a string".to_string())),
        }
    }

    async fn execute(&self, _ctx: ToolContext, params: Value) -> Result<Value> {
        let now = Utc::now();
        let formatted = match params.get("format").and_then(|v| v.as_str()) {
            Some(fmt) => now.format(fmt).to_string(),
            None => now.to_rfc3339(),
        };
        Ok(json!({
            "time": formatted,
            "unix": now.timestamp(),
        }))
    }
}
