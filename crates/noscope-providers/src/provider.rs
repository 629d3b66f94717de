use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use noscope_types::message::{LlmResponse, Message, StreamChunk, ToolSchema};
use noscope_types::provider::ProviderInfo;

/// A chat-completion backend. Implementors translate the shared
/// [`Message`]/[`ToolSchema`] shape into their own wire format.
#[async_trait]
pub trait Provider: Send + Sync {
    fn info(&self) -> ProviderInfo;

    async fn complete(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        model: Option<&str>,
    ) -> anyhow::Result<LlmResponse>;

    /// Default streaming implementation: runs a full completion and
    /// replays it as a single text delta followed by a final chunk.
    /// Providers with a native streaming API should override this.
    async fn stream(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
        model: Option<&str>,
    ) -> anyhow::Result<Pin<Box<dyn Stream<Item = anyhow::Result<StreamChunk>> + Send>>> {
        let response = self.complete(messages, tools, model).await?;
        let usage = noscope_types::message::Usage {
            input_tokens: response.usage.input_tokens,
            output_tokens: response.usage.output_tokens,
        };
        let stream = futures::stream::iter(vec![
            Ok(StreamChunk {
                delta_text: response.content,
                delta_tool_call: None,
                usage: None,
                is_final: false,
            }),
            Ok(StreamChunk {
                delta_text: String::new(),
                delta_tool_call: None,
                usage: Some(usage),
                is_final: true,
            }),
        ]);
        Ok(Box::pin(stream))
    }
}
