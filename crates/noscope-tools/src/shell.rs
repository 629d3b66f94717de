use std::collections::HashMap;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use noscope_core::context::ToolContext;
use noscope_core::redaction::redact_text;
use noscope_core::safety::{check_command_safety, resolve_workspace_path};
use noscope_types::capability::Capability;
use noscope_types::tool::ToolResult;

use crate::tool::Tool;

const EXPLICIT_SENSITIVE_ENV_KEYS: &[&str] = &[
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
    "NOSCOPE_ANTHROPIC_API_KEY",
    "NOSCOPE_OPENAI_API_KEY",
    "AWS_ACCESS_KEY_ID",
    "AWS_SECRET_ACCESS_KEY",
    "AWS_SESSION_TOKEN",
    "AZURE_OPENAI_API_KEY",
    "GOOGLE_API_KEY",
    "GITHUB_TOKEN",
    "GH_TOKEN",
    "GITLAB_TOKEN",
    "NPM_TOKEN",
    "PYPI_TOKEN",
    "HF_TOKEN",
    "SLACK_BOT_TOKEN",
];

static SENSITIVE_ENV_KEY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|_)(?:API[_-]?KEY|TOKEN|SECRET|PASSWORD|CREDENTIALS?|PRIVATE[_-]?KEY|COOKIE|AUTH)(?:$|_)")
        .expect("valid regex")
});

pub const MAX_OUTPUT_LENGTH: usize = 50_000;

/// Build a subprocess environment with sensitive credentials and NoScope's
/// own virtualenv stripped out, so workspace commands see a clean system
/// environment rather than the orchestrator's own secrets.
pub fn build_execution_env() -> HashMap<String, String> {
    let mut env: HashMap<String, String> = std::env::vars().collect();

    env.retain(|key, _| {
        !EXPLICIT_SENSITIVE_ENV_KEYS.contains(&key.as_str())
            && !SENSITIVE_ENV_KEY_PATTERN.is_match(key)
    });

    env.remove("VIRTUAL_ENV");
    if let Some(path) = env.get("PATH").cloned() {
        let cleaned: Vec<&str> = path.split(':').filter(|p| !p.contains(".venv")).collect();
        env.insert("PATH".to_string(), cleaned.join(":"));
    }

    env
}

pub struct ShellTool;

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &'static str {
        "exec_command"
    }

    fn description(&self) -> &'static str {
        "Execute a shell command within the workspace"
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
                    "description": "Working directory (relative to workspace)",
                    "default": ".",
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
        let command = args["command"].as_str().unwrap_or_default().to_string();

        let hard_cap = 300u64;
        let remaining = context.deadline.read().await.remaining().as_secs();
        let dynamic_cap = ((remaining as f64 * 0.15) as u64).max(30);
        let requested = args["timeout"].as_u64().unwrap_or(60);
        let timeout_secs = requested.min(hard_cap).min(dynamic_cap);

        if let Some(denial) = check_command_safety(&command, context.danger_mode) {
            return Ok(ToolResult::error(format!("Command denied: {denial}")));
        }

        let cwd = match args["cwd"].as_str() {
            Some(c) if c != "." => match resolve_workspace_path(c, &context.workspace) {
                Ok(p) => {
                    if !p.is_dir() {
                        return Ok(ToolResult::error(format!("Working directory not found: {c}")));
                    }
                    p
                }
                Err(e) => return Ok(ToolResult::error(e.to_string())),
            },
            _ => context.workspace.clone(),
        };

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(&command)
            .current_dir(&cwd)
            .env_clear()
            .envs(build_execution_env())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let child = match cmd.spawn() {
            Ok(c) => c,
            Err(e) => return Ok(ToolResult::error(format!("Failed to execute: {e}"))),
        };

        let output = match tokio::time::timeout(
            std::time::Duration::from_secs(timeout_secs),
            child.wait_with_output(),
        )
        .await
        {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Ok(ToolResult::error(format!("Failed to execute: {e}"))),
            Err(_) => return Ok(ToolResult::error(format!("Command timed out after {timeout_secs}s"))),
        };

        let mut stdout = redact_text(&String::from_utf8_lossy(&output.stdout), &context.secrets);
        let mut stderr = redact_text(&String::from_utf8_lossy(&output.stderr), &context.secrets);
        let exit_code = output.status.code().unwrap_or(0);

        if stdout.len() > MAX_OUTPUT_LENGTH {
            stdout.truncate(MAX_OUTPUT_LENGTH);
            stdout.push_str("\n... (truncated)");
        }
        if stderr.len() > MAX_OUTPUT_LENGTH {
            stderr.truncate(MAX_OUTPUT_LENGTH);
            stderr.push_str("\n... (truncated)");
        }

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

#[cfg(test)]
mod tests {
    use super::*;
    use noscope_core::capability_store::CapabilityStore;
    use noscope_core::deadline::Deadline;
    use noscope_core::event_log::{EventLog, RunDir};
    use std::sync::Arc;

    async fn test_context(workspace: &std::path::Path, run_dir: &std::path::Path) -> ToolContext {
        let mut caps = CapabilityStore::default();
        caps.grant("shell_exec");
        let rd = RunDir::new(Some(run_dir), Some("t".to_string())).unwrap();
        let log = Arc::new(EventLog::open(&rd).unwrap());
        ToolContext::new(workspace.to_path_buf(), caps, log, Deadline::new(3600), HashMap::new(), false)
    }

    #[tokio::test]
    async fn runs_simple_command() {
        let ws = tempfile::tempdir().unwrap();
        let runs = tempfile::tempdir().unwrap();
        let ctx = test_context(ws.path(), runs.path()).await;

        let result = ShellTool
            .execute(json!({"command": "echo hello"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_ok());
        assert!(result.display.contains("hello"));
    }

    #[tokio::test]
    async fn denies_dangerous_command() {
        let ws = tempfile::tempdir().unwrap();
        let runs = tempfile::tempdir().unwrap();
        let ctx = test_context(ws.path(), runs.path()).await;

        let result = ShellTool
            .execute(json!({"command": "rm -rf /"}), &ctx)
            .await
            .unwrap();
        assert!(!result.is_ok());
    }
}
