use async_trait::async_trait;
use noscope_core::context::ToolContext;
use noscope_types::capability::Capability;
use noscope_types::tool::ToolResult;
use serde_json::Value;

/// A single agent-callable capability-gated action.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    fn required_capability(&self) -> Capability;
    fn parameters_schema(&self) -> Value;
    async fn execute(&self, args: Value, context: &ToolContext) -> anyhow::Result<ToolResult>;
}
