use async_trait::async_trait;
use noscope_core::context::ToolContext;
use noscope_core::safety::resolve_workspace_path;
use noscope_types::capability::Capability;
use noscope_types::tool::ToolResult;
use serde_json::{json, Value};

use crate::tool::Tool;

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a file within the workspace"
    }

    fn required_capability(&self) -> Capability {
        Capability::WorkspaceRw
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path relative to workspace"},
            },
            "required": ["path"],
        })
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> anyhow::Result<ToolResult> {
        let raw_path = args["path"].as_str().unwrap_or_default();
        let path = match resolve_workspace_path(raw_path, &context.workspace) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        if !path.exists() {
            return Ok(ToolResult::error(format!("File not found: {raw_path}")));
        }
        if !path.is_file() {
            return Ok(ToolResult::error(format!("Not a file: {raw_path}")));
        }

        let content = match tokio::fs::read(&path).await {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(s) => s,
                Err(_) => return Ok(ToolResult::error(format!("Cannot read binary file: {raw_path}"))),
            },
            Err(e) => return Ok(ToolResult::error(format!("Failed to read {raw_path}: {e}"))),
        };

        Ok(ToolResult::ok(
            content.clone(),
            json!({ "content": content, "path": path.to_string_lossy() }),
        ))
    }
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write or create a file within the workspace"
    }

    fn required_capability(&self) -> Capability {
        Capability::WorkspaceRw
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "File path relative to workspace"},
                "content": {"type": "string", "description": "File content to write"},
            },
            "required": ["path", "content"],
        })
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> anyhow::Result<ToolResult> {
        let raw_path = args["path"].as_str().unwrap_or_default();
        let content = args["content"].as_str().unwrap_or_default();
        let path = match resolve_workspace_path(raw_path, &context.workspace) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, content).await?;

        Ok(ToolResult::ok(
            format!("Wrote {}", path.display()),
            json!({ "path": path.to_string_lossy() }),
        ))
    }
}

pub struct ListDirectoryTool;

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "List contents of a directory within the workspace"
    }

    fn required_capability(&self) -> Capability {
        Capability::WorkspaceRw
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory path relative to workspace",
                    "default": ".",
                },
            },
        })
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> anyhow::Result<ToolResult> {
        let raw_path = args["path"].as_str().unwrap_or(".");
        let path = match resolve_workspace_path(raw_path, &context.workspace) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        if !path.exists() {
            return Ok(ToolResult::error(format!("Directory not found: {raw_path}")));
        }
        if !path.is_dir() {
            return Ok(ToolResult::error(format!("Not a directory: {raw_path}")));
        }

        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&path).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let is_dir = entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false);
            entries.push((is_dir, entry.file_name().to_string_lossy().to_string()));
        }
        entries.sort_by(|a, b| (!a.0, &a.1).cmp(&(!b.0, &b.1)));

        let listing: Vec<String> = entries
            .iter()
            .map(|(is_dir, name)| format!("{} {name}", if *is_dir { "d" } else { "f" }))
            .collect();

        let display = if listing.is_empty() {
            "(empty directory)".to_string()
        } else {
            listing.join("\n")
        };
        let names: Vec<String> = entries.into_iter().map(|(_, name)| name).collect();

        Ok(ToolResult::ok(display, json!({ "entries": names })))
    }
}

pub struct CreateDirectoryTool;

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &'static str {
        "create_directory"
    }

    fn description(&self) -> &'static str {
        "Create a directory (and parents) within the workspace"
    }

    fn required_capability(&self) -> Capability {
        Capability::WorkspaceRw
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {"type": "string", "description": "Directory path relative to workspace"},
            },
            "required": ["path"],
        })
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> anyhow::Result<ToolResult> {
        let raw_path = args["path"].as_str().unwrap_or_default();
        let path = match resolve_workspace_path(raw_path, &context.workspace) {
            Ok(p) => p,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        tokio::fs::create_dir_all(&path).await?;

        Ok(ToolResult::ok(
            format!("Created {}", path.display()),
            json!({ "path": path.to_string_lossy() }),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use noscope_core::capability_store::CapabilityStore;
    use noscope_core::deadline::Deadline;
    use noscope_core::event_log::{EventLog, RunDir};
    use std::collections::HashMap;
    use std::sync::Arc;

    async fn test_context(workspace: &std::path::Path, run_dir: &std::path::Path) -> ToolContext {
        let mut caps = CapabilityStore::default();
        caps.grant("workspace_rw");
        let rd = RunDir::new(Some(run_dir), Some("t".to_string())).unwrap();
        let log = Arc::new(EventLog::open(&rd).unwrap());
        ToolContext::new(workspace.to_path_buf(), caps, log, Deadline::new(3600), HashMap::new(), false)
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let ws = tempfile::tempdir().unwrap();
        let runs = tempfile::tempdir().unwrap();
        let ctx = test_context(ws.path(), runs.path()).await;

        let write_result = WriteFileTool
            .execute(json!({"path": "hello.txt", "content": "hi there"}), &ctx)
            .await
            .unwrap();
        assert!(write_result.is_ok());

        let read_result = ReadFileTool
            .execute(json!({"path": "hello.txt"}), &ctx)
            .await
            .unwrap();
        assert!(read_result.is_ok());
        assert_eq!(read_result.display, "hi there");
    }

    #[tokio::test]
    async fn read_rejects_path_outside_workspace() {
        let ws = tempfile::tempdir().unwrap();
        let runs = tempfile::tempdir().unwrap();
        let ctx = test_context(ws.path(), runs.path()).await;

        let result = ReadFileTool
            .execute(json!({"path": "../../etc/passwd"}), &ctx)
            .await
            .unwrap();
        assert!(!result.is_ok());
    }
}
