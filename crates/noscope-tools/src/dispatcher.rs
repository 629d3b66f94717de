use std::collections::HashMap;
use std::sync::Arc;

use noscope_core::context::ToolContext;
use noscope_core::redaction::redact_structured;
use noscope_types::message::ToolSchema;
use noscope_types::tool::ToolResult;
use serde_json::{json, Value};

use crate::tool::Tool;

const MAX_LOG_STRING: usize = 2_000;

fn omit_fields() -> &'static [&'static str] {
    &["content", "stdout", "stderr"]
}

/// Registers tools and dispatches calls through capability checks and
/// event logging.
#[derive(Default)]
pub struct ToolDispatcher {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn register_all(&mut self, tools: Vec<Arc<dyn Tool>>) {
        for tool in tools {
            self.register(tool);
        }
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Dispatch a tool call, enforcing the capability check and emitting
    /// the call/result event pair around execution.
    pub async fn dispatch(
        &self,
        tool_name: &str,
        args: Value,
        context: &ToolContext,
    ) -> anyhow::Result<ToolResult> {
        let Some(tool) = self.tools.get(tool_name) else {
            return Ok(ToolResult::error(format!("Unknown tool: {tool_name}")));
        };

        let phase = context.deadline.read().await.current_phase().to_string();

        let required = tool.required_capability();
        if !context.capabilities.read().await.check_capability(required) {
            let message = format!("Capability '{required}' not granted for tool '{tool_name}'");
            context.event_log.emit(
                &phase,
                &format!("tool.{tool_name}.denied"),
                &message,
                json!({ "tool": tool_name, "capability": required.to_string() }),
                None,
            )?;
            return Ok(ToolResult::error(message));
        }

        context.event_log.emit(
            &phase,
            &format!("tool.{tool_name}"),
            &format!("Calling {tool_name}"),
            json!({ "tool": tool_name, "args": sanitize_for_log(&args, context) }),
            None,
        )?;

        let result = tool.execute(args, context).await?;

        context.event_log.emit(
            &phase,
            &format!("tool.{tool_name}.result"),
            &format!("{tool_name} -> {:?}", result.status),
            json!({ "tool": tool_name }),
            Some(json!({
                "status": result.status,
                "data": sanitize_for_log(&result.data, context),
            })),
        )?;

        Ok(result)
    }

    /// Convert all registered tools to LLM function/tool schemas.
    pub fn to_schemas(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|tool| ToolSchema {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}

fn sanitize_for_log(payload: &Value, context: &ToolContext) -> Value {
    let redacted = redact_structured(payload, &context.secrets);
    trim_payload(&redacted)
}

fn trim_payload(payload: &Value) -> Value {
    match payload {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, value)| {
                    if omit_fields().contains(&key.as_str()) {
                        if let Value::String(s) = value {
                            return (key.clone(), json!(format!("[omitted {} chars]", s.len())));
                        }
                    }
                    (key.clone(), trim_payload(value))
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(trim_payload).collect()),
        Value::String(s) if s.chars().count() > MAX_LOG_STRING => {
            let head: String = s.chars().take(MAX_LOG_STRING).collect();
            json!(format!("{head}... [truncated]"))
        }
        other => other.clone(),
    }
}
