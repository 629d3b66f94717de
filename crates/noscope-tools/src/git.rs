use async_trait::async_trait;
use noscope_core::context::ToolContext;
use noscope_types::capability::Capability;
use noscope_types::tool::ToolResult;
use serde_json::{json, Value};

use crate::tool::Tool;

async fn run_git(args: &[&str], cwd: &std::path::Path) -> anyhow::Result<(i32, String, String)> {
    let output = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        tokio::process::Command::new("git").args(args).current_dir(cwd).output(),
    )
    .await??;

    Ok((
        output.status.code().unwrap_or(0),
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
    ))
}

pub struct GitInitTool;

#[async_trait]
impl Tool for GitInitTool {
    fn name(&self) -> &'static str {
        "git_init"
    }
    fn description(&self) -> &'static str {
        "Initialize a git repository in the workspace"
    }
    fn required_capability(&self) -> Capability {
        Capability::Git
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value, context: &ToolContext) -> anyhow::Result<ToolResult> {
        let (code, stdout, stderr) = run_git(&["init"], &context.workspace).await?;
        if code != 0 {
            return Ok(ToolResult::error(format!("git init failed: {stderr}")));
        }
        Ok(ToolResult::ok(stdout.trim().to_string(), json!({})))
    }
}

pub struct GitStatusTool;

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &'static str {
        "git_status"
    }
    fn description(&self) -> &'static str {
        "Show the working tree status"
    }
    fn required_capability(&self) -> Capability {
        Capability::Git
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value, context: &ToolContext) -> anyhow::Result<ToolResult> {
        let (code, stdout, stderr) = run_git(&["status", "--short"], &context.workspace).await?;
        if code != 0 {
            return Ok(ToolResult::error(format!("git status failed: {stderr}")));
        }
        let trimmed = stdout.trim();
        let display = if trimmed.is_empty() { "(clean)".to_string() } else { trimmed.to_string() };
        Ok(ToolResult::ok(display, json!({})))
    }
}

pub struct GitAddTool;

#[async_trait]
impl Tool for GitAddTool {
    fn name(&self) -> &'static str {
        "git_add"
    }
    fn description(&self) -> &'static str {
        "Stage files for commit"
    }
    fn required_capability(&self) -> Capability {
        Capability::Git
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": {"type": "string"},
                    "description": "File paths to stage (use '.' for all)",
                },
            },
            "required": ["paths"],
        })
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> anyhow::Result<ToolResult> {
        let paths: Vec<String> = args["paths"]
            .as_array()
            .map(|a| a.iter().filter_map(|v| v.as_str().map(String::from)).collect())
            .unwrap_or_default();
        let mut git_args = vec!["add"];
        git_args.extend(paths.iter().map(String::as_str));

        let (code, _stdout, stderr) = run_git(&git_args, &context.workspace).await?;
        if code != 0 {
            return Ok(ToolResult::error(format!("git add failed: {stderr}")));
        }
        Ok(ToolResult::ok(format!("Staged: {}", paths.join(", ")), json!({})))
    }
}

pub struct GitCommitTool;

#[async_trait]
impl Tool for GitCommitTool {
    fn name(&self) -> &'static str {
        "git_commit"
    }
    fn description(&self) -> &'static str {
        "Create a git commit"
    }
    fn required_capability(&self) -> Capability {
        Capability::Git
    }
    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "message": {"type": "string", "description": "Commit message"},
            },
            "required": ["message"],
        })
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> anyhow::Result<ToolResult> {
        let message = args["message"].as_str().unwrap_or_default();
        let (code, stdout, stderr) = run_git(&["commit", "-m", message], &context.workspace).await?;
        if code != 0 {
            return Ok(ToolResult::error(format!("git commit failed: {stderr}")));
        }
        Ok(ToolResult::ok(stdout.trim().to_string(), json!({})))
    }
}

pub struct GitDiffTool;

#[async_trait]
impl Tool for GitDiffTool {
    fn name(&self) -> &'static str {
        "git_diff"
    }
    fn description(&self) -> &'static str {
        "Show changes in the working tree"
    }
    fn required_capability(&self) -> Capability {
        Capability::Git
    }
    fn parameters_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn execute(&self, _args: Value, context: &ToolContext) -> anyhow::Result<ToolResult> {
        let (code, stdout, stderr) = run_git(&["diff"], &context.workspace).await?;
        if code != 0 {
            return Ok(ToolResult::error(format!("git diff failed: {stderr}")));
        }
        let trimmed = stdout.trim();
        let display = if trimmed.is_empty() { "(no changes)".to_string() } else { trimmed.to_string() };
        Ok(ToolResult::ok(display, json!({})))
    }
}
