use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use noscope_types::message::{LlmResponse, Message, Role, ToolCall, ToolSchema, Usage};
use noscope_types::provider::{ModelInfo, ProviderInfo};

use crate::provider::Provider;

pub const DEFAULT_MODEL: &str = "gpt-4.1";

/// Provider for any OpenAI-compatible chat-completions endpoint (OpenAI
/// itself, Azure OpenAI, local gateways).
pub struct OpenAiCompatibleProvider {
    id: String,
    name: String,
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    client: Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            api_key,
            default_model: default_model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            client: Client::new(),
        }
    }
}

fn to_wire_messages(messages: &[Message]) -> Vec<Value> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            let mut wire = json!({"role": role, "content": m.content});
            if role == "tool" {
                wire["tool_call_id"] = json!(m.tool_call_id);
            }
            if !m.tool_calls.is_empty() {
                wire["tool_calls"] = json!(m
                    .tool_calls
                    .iter()
                    .map(|tc| json!({
                        "id": tc.id,
                        "type": "function",
                        "function": {"name": tc.name, "arguments": tc.arguments.to_string()},
                    }))
                    .collect::<Vec<_>>());
            }
            wire
        })
        .collect()
}

fn to_wire_tools(tools: &[ToolSchema]) -> Vec<Value> {
    tools
        .iter()
        .map(|t| {
            json!({
                "type": "function",
                "function": {
                    "name": t.name,
                    "description": t.description,
                    "parameters": t.parameters,
                },
            })
        })
        .collect()
}

#[async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            id: self.id.clone(),
            name: self.name.clone(),
            models: vec![ModelInfo {
                id: self.default_model.clone(),
                provider_id: self.id.clone(),
                display_name: self.default_model.clone(),
                context_window: 128_000,
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
        let url = format!("{}/chat/completions", self.base_url);

        let mut body = json!({
            "model": model,
            "messages": to_wire_messages(messages),
        });
        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(to_wire_tools(tools));
                body["tool_choice"] = json!("auto");
            }
        }

        let mut req = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let response = req.send().await?;
        let status = response.status();
        let value: Value = response.json().await?;

        if !status.is_success() {
            let detail = value["error"]["message"].as_str().unwrap_or("request failed");
            anyhow::bail!("{} provider error ({status}): {detail}", self.id);
        }

        let choice = &value["choices"][0]["message"];
        let content = choice["content"].as_str().unwrap_or_default().to_string();

        let tool_calls = choice["tool_calls"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|tc| {
                let arguments_raw = tc["function"]["arguments"].as_str().unwrap_or("{}");
                ToolCall {
                    id: tc["id"].as_str().unwrap_or_default().to_string(),
                    name: tc["function"]["name"].as_str().unwrap_or_default().to_string(),
                    arguments: serde_json::from_str(arguments_raw).unwrap_or(json!({})),
                }
            })
            .collect();

        Ok(LlmResponse {
            content,
            tool_calls,
            usage: Usage {
                input_tokens: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0),
                output_tokens: value["usage"]["completion_tokens"].as_u64().unwrap_or(0),
            },
            stop_reason: value["choices"][0]["finish_reason"].as_str().unwrap_or_default().to_string(),
        })
    }
}
