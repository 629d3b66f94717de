use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use noscope_core::context::ToolContext;
use noscope_core::redaction::redact_text;
use noscope_core::safety::check_command_safety;
use noscope_types::capability::Capability;
use noscope_types::tool::ToolResult;

use crate::tool::Tool;

pub const DOCKER_IMAGE: &str = "python:3.12-slim";

/// Manages a long-lived Docker container that workspace commands run
/// inside of, for callers that opted into sandboxed execution.
pub struct DockerSandbox {
    workspace: PathBuf,
    image: String,
    container_id: Mutex<Option<String>>,
}

impl DockerSandbox {
    pub fn new(workspace: PathBuf, image: Option<String>) -> Self {
        Self {
            workspace,
            image: image.unwrap_or_else(|| DOCKER_IMAGE.to_string()),
            container_id: Mutex::new(None),
        }
    }

    /// Ensure the sandbox container is running, returning its ID.
    pub async fn ensure_running(&self) -> anyhow::Result<String> {
        let mut guard = self.container_id.lock().await;
        if let Some(id) = guard.as_ref() {
            return Ok(id.clone());
        }

        let mount = format!("{}:/workspace", self.workspace.display());
        let output = tokio::process::Command::new("docker")
            .args(["run", "-d", "--rm", "-v", &mount, "-w", "/workspace", &self.image, "sleep", "infinity"])
            .output()
            .await?;

        if !output.status.success() {
            anyhow::bail!("Failed to start Docker sandbox: {}", String::from_utf8_lossy(&output.stderr));
        }

        let id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        *guard = Some(id.clone());
        Ok(id)
    }

    /// Execute a command inside the sandbox container.
    pub async fn execute(
        &self,
        command: &str,
        timeout_secs: u64,
        cwd: &str,
    ) -> anyhow::Result<(i32, String, String)> {
        let container_id = self.ensure_running().await?;

        let child = tokio::process::Command::new("docker")
            .args(["exec", "-w", cwd, &container_id, "bash", "-c", command])
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()?;

        match tokio::time::timeout(std::time::Duration::from_secs(timeout_secs), child.wait_with_output()).await {
            Ok(Ok(output)) => Ok((
                output.status.code().unwrap_or(0),
                String::from_utf8_lossy(&output.stdout).to_string(),
                String::from_utf8_lossy(&output.stderr).to_string(),
            )),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok((124, String::new(), format!("Command timed out after {timeout_secs}s"))),
        }
    }

    /// Stop and remove the sandbox container.
    pub async fn stop(&self) -> anyhow::Result<()> {
        let mut guard = self.container_id.lock().await;
        if let Some(id) = guard.take() {
            let _ = tokio::process::Command::new("docker").args(["kill", &id]).output().await;
        }
        Ok(())
    }
}

/// Shell tool that executes inside a Docker container instead of directly
/// on the host.
pub struct DockerShellTool {
    sandbox: std::sync::Arc<DockerSandbox>,
}

impl DockerShellTool {
    pub fn new(sandbox: std::sync::Arc<DockerSandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for DockerShellTool {
    fn name(&self) -> &'static str {
        "exec_command"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command inside a Docker sandbox"
    }

    fn required_capability(&self) -> Capability {
        Capability::ShellExec
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Shell command to execute"},
                "cwd": {
                    "type": "string",
                    "description": "Working directory inside container",
                    "default": "/workspace",
                },
                "timeout": {
                    "type": "integer",
                    "description": "Timeout in seconds",
                    "default": 60,
                },
            },
            "required": ["command"],
        })
    }

    async fn execute(&self, args: Value, context: &ToolContext) -> anyhow::Result<ToolResult> {
        let command = args["command"].as_str().unwrap_or_default();
        let timeout_secs = args["timeout"].as_u64().unwrap_or(60).min(300);
        let cwd = args["cwd"].as_str().unwrap_or("/workspace");

        if let Some(denial) = check_command_safety(command, context.danger_mode) {
            return Ok(ToolResult::error(format!("Command denied: {denial}")));
        }

        let (exit_code, stdout, stderr) = match self.sandbox.execute(command, timeout_secs, cwd).await {
            Ok(r) => r,
            Err(e) => return Ok(ToolResult::error(e.to_string())),
        };

        let stdout = redact_text(&stdout, &context.secrets);
        let stderr = redact_text(&stderr, &context.secrets);

        let mut display = stdout.clone();
        if !stderr.is_empty() {
            display.push_str(&format!("\n[stderr]\n{stderr}"));
        }

        if exit_code != 0 {
            return Ok(ToolResult::error_with(
                format!("Exit code {exit_code}\n{display}"),
                json!({ "stdout": stdout, "stderr": stderr, "exit_code": exit_code }),
            ));
        }

        Ok(ToolResult::ok(
            display,
            json!({ "stdout": stdout, "stderr": stderr, "exit_code": exit_code }),
        ))
    }
}

fn shell_quote(path: &str) -> String {
    format!("'{}'", path.replace('\'', "'\\''"))
}

/// Filesystem tools that read and write through a Docker sandbox instead
/// of the host filesystem directly.
pub struct DockerReadFileTool {
    sandbox: std::sync::Arc<DockerSandbox>,
}

impl DockerReadFileTool {
    pub fn new(sandbox: std::sync::Arc<DockerSandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for DockerReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read the contents of a file within the sandboxed workspace"
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

    async fn execute(&self, args: Value, _context: &ToolContext) -> anyhow::Result<ToolResult> {
        let raw_path = args["path"].as_str().unwrap_or_default();
        let cmd = format!("cat -- {}", shell_quote(raw_path));
        match self.sandbox.execute(&cmd, 30, "/workspace").await {
            Ok((0, stdout, _)) => Ok(ToolResult::ok(stdout.clone(), json!({ "content": stdout, "path": raw_path }))),
            Ok((_, _, stderr)) => Ok(ToolResult::error(format!("Failed to read {raw_path}: {stderr}"))),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

pub struct DockerWriteFileTool {
    sandbox: std::sync::Arc<DockerSandbox>,
}

impl DockerWriteFileTool {
    pub fn new(sandbox: std::sync::Arc<DockerSandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for DockerWriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write or create a file within the sandboxed workspace"
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

    async fn execute(&self, args: Value, _context: &ToolContext) -> anyhow::Result<ToolResult> {
        let raw_path = args["path"].as_str().unwrap_or_default();
        let content = args["content"].as_str().unwrap_or_default();
        let encoded = {
            use base64::Engine;
            base64::engine::general_purpose::STANDARD.encode(content)
        };
        let quoted = shell_quote(raw_path);
        let cmd = format!(
            "mkdir -p -- \"$(dirname -- {quoted})\" && echo {} | base64 -d > {quoted}",
            shell_quote(&encoded)
        );
        match self.sandbox.execute(&cmd, 30, "/workspace").await {
            Ok((0, _, _)) => Ok(ToolResult::ok(format!("Wrote {raw_path}"), json!({ "path": raw_path }))),
            Ok((_, _, stderr)) => Ok(ToolResult::error(format!("Failed to write {raw_path}: {stderr}"))),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

pub struct DockerListDirectoryTool {
    sandbox: std::sync::Arc<DockerSandbox>,
}

impl DockerListDirectoryTool {
    pub fn new(sandbox: std::sync::Arc<DockerSandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for DockerListDirectoryTool {
    fn name(&self) -> &'static str {
        "list_directory"
    }

    fn description(&self) -> &'static str {
        "List contents of a directory within the sandboxed workspace"
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

    async fn execute(&self, args: Value, _context: &ToolContext) -> anyhow::Result<ToolResult> {
        let raw_path = args["path"].as_str().unwrap_or(".");
        let cmd = format!("ls -1AF -- {}", shell_quote(raw_path));
        match self.sandbox.execute(&cmd, 30, "/workspace").await {
            Ok((0, stdout, _)) => {
                let names: Vec<String> = stdout.lines().map(|s| s.to_string()).collect();
                let display = if names.is_empty() { "(empty directory)".to_string() } else { stdout.clone() };
                Ok(ToolResult::ok(display, json!({ "entries": names })))
            }
            Ok((_, _, stderr)) => Ok(ToolResult::error(format!("Directory not found: {raw_path}: {stderr}"))),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}

pub struct DockerCreateDirectoryTool {
    sandbox: std::sync::Arc<DockerSandbox>,
}

impl DockerCreateDirectoryTool {
    pub fn new(sandbox: std::sync::Arc<DockerSandbox>) -> Self {
        Self { sandbox }
    }
}

#[async_trait]
impl Tool for DockerCreateDirectoryTool {
    fn name(&self) -> &'static str {
        "create_directory"
    }

    fn description(&self) -> &'static str {
        "Create a directory (and parents) within the sandboxed workspace"
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

    async fn execute(&self, args: Value, _context: &ToolContext) -> anyhow::Result<ToolResult> {
        let raw_path = args["path"].as_str().unwrap_or_default();
        let cmd = format!("mkdir -p -- {}", shell_quote(raw_path));
        match self.sandbox.execute(&cmd, 30, "/workspace").await {
            Ok((0, _, _)) => Ok(ToolResult::ok(format!("Created {raw_path}"), json!({ "path": raw_path }))),
            Ok((_, _, stderr)) => Ok(ToolResult::error(format!("Failed to create {raw_path}: {stderr}"))),
            Err(e) => Ok(ToolResult::error(e.to_string())),
        }
    }
}
