//! Tool catalog and name-based dispatch

use std::{str::FromStr, sync::Arc};

use executors::ExecutionRequest;
use rmcp::model::{JsonObject, Tool};
use serde_json::{Value, json};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Scripting guide shown to clients as the tool description.
const APPLESCRIPT_EXECUTE_DESCRIPTION: &str = include_str!("applescript_execute.md");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum ToolName {
    ApplescriptExecute,
}

impl ToolName {
    pub fn definition(self, default_timeout_secs: u64) -> Tool {
        match self {
            ToolName::ApplescriptExecute => Tool::new(
                self.as_ref().to_string(),
                APPLESCRIPT_EXECUTE_DESCRIPTION,
                Arc::new(applescript_execute_schema(default_timeout_secs)),
            ),
        }
    }
}

/// Every tool this server offers.
pub fn catalog(default_timeout_secs: u64) -> Vec<Tool> {
    ToolName::iter()
        .map(|tool| tool.definition(default_timeout_secs))
        .collect()
}

fn applescript_execute_schema(default_timeout_secs: u64) -> JsonObject {
    let schema = json!({
        "type": "object",
        "properties": {
            "script": {
                "type": "string",
                "description": "Complete AppleScript code to execute. Must follow all formatting requirements specified in the tool description, especially date/time formats for Reminders and Calendar apps. Include error handling where appropriate."
            },
            "timeout_seconds": {
                "type": "integer",
                "minimum": 1,
                "description": format!(
                    "Command execution timeout in seconds (default: {})",
                    default_timeout_secs
                )
            }
        },
        "required": ["script"]
    });

    match schema {
        Value::Object(object) => object,
        _ => JsonObject::new(),
    }
}

/// A decoded `tools/call`, one variant per tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    ApplescriptExecute(ExecutionRequest),
}

#[derive(Debug, Error)]
pub enum ToolCallError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
    #[error("Invalid arguments for {tool}: {source}")]
    InvalidArguments {
        tool: ToolName,
        #[source]
        source: serde_json::Error,
    },
}

impl ToolCall {
    /// Absent arguments decode like an empty object, leaving required-field
    /// checks to the executor.
    pub fn parse(name: &str, arguments: Option<JsonObject>) -> Result<Self, ToolCallError> {
        let tool =
            ToolName::from_str(name).map_err(|_| ToolCallError::UnknownTool(name.to_string()))?;
        let arguments = Value::Object(arguments.unwrap_or_default());

        match tool {
            ToolName::ApplescriptExecute => serde_json::from_value(arguments)
                .map(ToolCall::ApplescriptExecute)
                .map_err(|source| ToolCallError::InvalidArguments { tool, source }),
        }
    }

    pub fn tool(&self) -> ToolName {
        match self {
            ToolCall::ApplescriptExecute(_) => ToolName::ApplescriptExecute,
        }
    }
}
