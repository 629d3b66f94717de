use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Ok,
    Error,
}

/// Result of dispatching a single tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,
    #[serde(default)]
    pub data: Value,
    #[serde(default)]
    pub display: String,
}

impl ToolResult {
    pub fn ok(display: impl Into<String>, data: Value) -> Self {
        Self {
            status: ToolStatus::Ok,
            data,
            display: display.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status: ToolStatus::Error,
            data: json!({}),
            display: message,
        }
    }

    pub fn error_with(message: impl Into<String>, data: Value) -> Self {
        Self {
            status: ToolStatus::Error,
            data,
            display: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, ToolStatus::Ok)
    }
}
