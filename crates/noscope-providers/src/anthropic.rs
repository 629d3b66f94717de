use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use noscope_types::message::{LlmResponse, Message, Role, ToolCall, ToolSchema, Usage};
use noscope_types::provider::{ModelInfo, ProviderInfo};

use crate::provider::Provider;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

pub struct AnthropicProvider {
    api_key: String,
    default_model: String,
    client: Client,
}

impl AnthropicProvider {
    pub fn new(api_key: String, model: Option<String>) -> Self {
        Self {
            api_key,
            default_model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: Client::new(),
        }
    }
}

/// Split the system-role messages out (Anthropic's API takes a single
/// top-level `system` string) and translate the rest into the Messages
/// API's content-block shape.
fn split_messages(messages: &[Message]) -> (String, Vec<Value>) {
    let mut system = String::new();
    let mut api_messages = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => {
                system.push_str(&msg.content);
                system.push('\n');
            }
            Role::Assistant => {
                let mut content = Vec::new();
                if !msg.content.is_empty() {
                    content.push(json!({"type": "text", "text": msg.content}));
                }
                for tc in &msg.tool_calls {
                    content.push(json!({
                        "type": "tool_use",
                        "id": tc.id,
                        "name": tc.name,
                        "input": tc.arguments,
                    }));
                }
                let body = if content.is_empty() { json!(msg.content) } else { json!(content) };
                api_messages.push(json!({"role": "assistant", "content": body}));
            }
            Role::Tool => {
                api_messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": msg.tool_call_id,
                        "content": msg.content,
                    }],
                }));
            }
            Role::User => {
                api_messages.push(json!({"role": "user", "content": msg.content}));
            }
        }
    }

    (system.trim().to_string(), api_messages)
}

fn convert_tools(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "name": t.name,
                "description": t.description,
                "input_schema": t.parameters,
            })
        })
        .collect()
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: "anthropic".to_string(),
            name: "Anthropic".to_string(),
            models: vec![ModelInfo {
                id: self.default_model.clone(),
                provider_id: "anthropic".to_string(),
                display_name: self.default_model.clone(),
                context_window: 200_000,
            }],
        }
    }

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        model: Option<&str>,
    ) -> anyhow::Result<LlmResponse> {
        let model = model.unwrap_or(self.default_model.as_str());
        let (system, api_messages) = split_messages(messages);

        let mut body = json!({
            "model": model,
            "max_tokens": 8192,
            "messages": api_messages,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(convert_tools(tools));
            }
        }

        let response: Value = self
            .client
            .post("https://api.anthropic.com/v1/messages")
            .header("anthropic-version", "2023-06-01")
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();
        for block in response["content"].as_array().into_iter().flatten() {
            match block["type"].as_str().unwrap_or_default() {
                "text" => content.push_str(block["text"].as_str().unwrap_or_default()),
                "tool_use" => tool_calls.push(ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    arguments: block["input"].clone(),
                }),
                _ => {}
            }
        }

        Ok(LlmResponse {
            content,
            tool_calls,
            usage: Usage {
                input_tokens: response["usage"]["input_tokens"].as_u64().unwrap_or(0),
                output_tokens: response["usage"]["output_tokens"].as_u64().unwrap_or(0),
            },
            stop_reason: response["stop_reason"].as_str().unwrap_or_default().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_system_messages_from_conversation() {
        let messages = vec![
            Message::system("be terse"),
            Message::user("hello"),
        ];
        let (system, api_messages) = split_messages(&messages);
        assert_eq!(system, "be terse");
        assert_eq!(api_messages.len(), 1);
    }

    #[test]
    fn assistant_tool_calls_become_tool_use_blocks() {
        let tc = ToolCall { id: "1".into(), name: "read_file".into(), arguments: json!({"path": "a.txt"}) };
        let messages = vec![Message::assistant("", vec![tc])];
        let (_, api_messages) = split_messages(&messages);
        let content = &api_messages[0]["content"];
        assert_eq!(content[0]["type"], "tool_use");
    }
}
