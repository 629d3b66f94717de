use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::json;

use noscope_core::context::ToolContext;
use noscope_providers::provider::Provider;
use noscope_tools::dispatcher::ToolDispatcher;
use noscope_types::message::{Message, ToolCall, ToolSchema};
use noscope_types::phase::Phase;
use noscope_types::task::PlanTask;

use crate::token_tracker::TokenTracker;

pub const MAX_AGENT_ITERATIONS: usize = 200;
pub const TIME_STATUS_INTERVAL: usize = 3;

fn mark_task_complete_schema() -> ToolSchema {
    ToolSchema {
        name: "mark_task_complete".to_string(),
        description: "Mark a task as completed. Call this after finishing each task.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "task_id": {"type": "string", "description": "The task ID (e.g., t1, t2)"},
            },
            "required": ["task_id"],
        }),
    }
}

fn tool_summary(name: &str, args: &serde_json::Value) -> String {
    match name {
        "write_file" => format!("writing {}", args["path"].as_str().unwrap_or("?")),
        "read_file" => format!("reading {}", args["path"].as_str().unwrap_or("?")),
        "exec_command" => {
            let cmd = args["command"].as_str().unwrap_or("");
            if cmd.chars().count() <= 80 {
                cmd.to_string()
            } else {
                format!("{}...", cmd.chars().take(77).collect::<String>())
            }
        }
        "list_directory" => format!("listing {}", args["path"].as_str().unwrap_or(".")),
        "create_directory" => format!("creating {}", args["path"].as_str().unwrap_or("?")),
        "git_init" | "git_status" | "git_add" | "git_commit" | "git_diff" => {
            name.replace('_', " ")
        }
        other => other.to_string(),
    }
}

/// An autonomous agent that works on assigned tasks.
///
/// Each agent runs its own LLM conversation loop, executing tool calls and
/// tracking task completion. Multiple agents can run in parallel on
/// non-overlapping task sets.
pub struct BuildAgent {
    agent_id: String,
    provider: Arc<dyn Provider>,
    dispatcher: Arc<ToolDispatcher>,
    context: ToolContext,
    tokens: Option<Arc<TokenTracker>>,
    tool_call_count: usize,
}

impl BuildAgent {
    pub fn new(
        agent_id: impl Into<String>,
        provider: Arc<dyn Provider>,
        dispatcher: Arc<ToolDispatcher>,
        context: ToolContext,
        tokens: Option<Arc<TokenTracker>>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            provider,
            dispatcher,
            context,
            tokens,
            tool_call_count: 0,
        }
    }

    /// Execute assigned tasks. Returns tasks with completion status updated.
    pub async fn run(&mut self, mut tasks: Vec<PlanTask>, system_prompt: &str) -> anyhow::Result<Vec<PlanTask>> {
        let mut task_index: HashMap<String, usize> =
            tasks.iter().enumerate().map(|(i, t)| (t.id.clone(), i)).collect();

        let mut messages = vec![Message::system(system_prompt)];

        let task_list = tasks
            .iter()
            .map(|t| format!("- [{}] {} ({:?}, {:?}): {}", t.id, t.title, t.kind, t.priority, t.description))
            .collect::<Vec<_>>()
            .join("\n");
        let first_id = tasks.first().map(|t| t.id.as_str()).unwrap_or("none");
        messages.push(Message::user(format!(
            "Execute these tasks. Work through each in order.\n\n{task_list}\n\nStart with task {first_id}."
        )));

        let mut tool_schemas = self.dispatcher.to_schemas();
        tool_schemas.push(mark_task_complete_schema());

        for _iteration in 0..MAX_AGENT_ITERATIONS {
            {
                let deadline = self.context.deadline.read().await;
                if deadline.is_expired() || deadline.should_transition(Some(Phase::Build)).is_some() {
                    break;
                }
            }

            if tasks.iter().all(|t| t.completed) {
                self.context.event_log.emit(
                    Phase::Build.as_str(),
                    "agent.tasks_complete",
                    &format!("Agent {}: all {} tasks complete", self.agent_id, tasks.len()),
                    json!({"agent_id": self.agent_id}),
                    None,
                )?;
                break;
            }

            let response = self.provider.complete(&messages, Some(&tool_schemas), None).await?;
            if let Some(tokens) = &self.tokens {
                tokens.add(response.usage);
            }

            messages.push(Message::assistant(response.content.clone(), response.tool_calls.clone()));

            if !response.content.is_empty() {
                let preview: String = response.content.chars().take(200).collect();
                self.context.event_log.emit(
                    Phase::Build.as_str(),
                    "llm.response",
                    &format!("[{}] {}", self.agent_id, preview),
                    json!({}),
                    None,
                )?;
            }

            if response.tool_calls.is_empty() {
                if response.stop_reason == "end_turn" {
                    break;
                }
                continue;
            }

            let tool_calls = response.tool_calls.clone();
            let mut results = self.execute_tool_calls(&tool_calls, &mut tasks, &mut task_index).await?;
            messages.append(&mut results);

            self.tool_call_count += tool_calls.len();
            if self.tool_call_count % TIME_STATUS_INTERVAL == 0 {
                let completed = tasks.iter().filter(|t| t.completed).count();
                let remaining = self.context.deadline.read().await.format_remaining();
                messages.push(Message::user(format!(
                    "\u{23f1} {remaining} remaining | {completed}/{} tasks done",
                    tasks.len()
                )));
            }
        }

        Ok(tasks)
    }

    async fn execute_tool_calls(
        &self,
        tool_calls: &[ToolCall],
        tasks: &mut [PlanTask],
        task_index: &mut HashMap<String, usize>,
    ) -> anyhow::Result<Vec<Message>> {
        let mut results = Vec::new();

        let mut virtual_calls = Vec::new();
        let mut file_calls = Vec::new();
        let mut shell_calls = Vec::new();

        for tc in tool_calls {
            match tc.name.as_str() {
                "mark_task_complete" => virtual_calls.push(tc),
                "write_file" | "read_file" | "list_directory" | "create_directory" => {
                    file_calls.push(tc)
                }
                _ => shell_calls.push(tc),
            }
        }

        for tc in virtual_calls {
            let task_id = tc.arguments["task_id"].as_str().unwrap_or_default().to_string();
            if let Some(&idx) = task_index.get(&task_id) {
                tasks[idx].completed = true;
                self.context.event_log.emit(
                    Phase::Build.as_str(),
                    "task.complete",
                    &format!("[{}] Task {}: {}", self.agent_id, task_id, tasks[idx].title),
                    json!({"task_id": task_id, "agent_id": self.agent_id}),
                    None,
                )?;
                results.push(Message::tool(format!("Task {task_id} marked as complete."), tc.id.clone()));
            } else {
                results.push(Message::tool(format!("Unknown task ID: {task_id}"), tc.id.clone()));
            }
        }

        if !file_calls.is_empty() {
            let futures = file_calls.iter().map(|tc| self.dispatch_and_wrap(tc));
            let mut file_results = join_all(futures).await.into_iter().collect::<anyhow::Result<Vec<_>>>()?;
            results.append(&mut file_results);
        }

        for tc in shell_calls {
            results.push(self.dispatch_and_wrap(tc).await?);
        }

        Ok(results)
    }

    async fn dispatch_and_wrap(&self, tc: &ToolCall) -> anyhow::Result<Message> {
        tracing::debug!(agent = %self.agent_id, tool = %tc.name, summary = %tool_summary(&tc.name, &tc.arguments), "tool call");
        let result = self.dispatcher.dispatch(&tc.name, tc.arguments.clone(), &self.context).await?;
        let content = if result.display.is_empty() {
            result.data.to_string()
        } else {
            result.display.clone()
        };
        Ok(Message::tool(content, tc.id.clone()))
    }
}

pub const MAX_VERIFY_ITERATIONS: usize = 50;

/// Run a single dedicated agent loop whose only job is to confirm the
/// built artifact actually runs. Exit is driven by the assistant's own
/// final message starting with `VERIFIED:` or `FAILED:`, not by a task
/// list — there are no tasks to track in VERIFY.
pub async fn run_verify_loop(
    provider: &dyn Provider,
    dispatcher: &ToolDispatcher,
    context: &ToolContext,
    tokens: Option<&TokenTracker>,
    system_prompt: &str,
    user_prompt: &str,
) -> anyhow::Result<(bool, String)> {
    let mut messages = vec![Message::system(system_prompt), Message::user(user_prompt)];
    let tool_schemas = dispatcher.to_schemas();

    for _iteration in 0..MAX_VERIFY_ITERATIONS {
        {
            let deadline = context.deadline.read().await;
            if deadline.is_expired() || deadline.should_transition(Some(Phase::Verify)).is_some() {
                return Ok((false, "FAILED: verification ran out of time".to_string()));
            }
        }

        let response = provider.complete(&messages, Some(&tool_schemas), None).await?;
        if let Some(tokens) = tokens {
            tokens.add(response.usage);
        }

        messages.push(Message::assistant(response.content.clone(), response.tool_calls.clone()));

        let trimmed = response.content.trim();
        if let Some(rest) = trimmed.strip_prefix("VERIFIED:") {
            return Ok((true, format!("VERIFIED:{rest}")));
        }
        if let Some(rest) = trimmed.strip_prefix("FAILED:") {
            return Ok((false, format!("FAILED:{rest}")));
        }

        if response.tool_calls.is_empty() {
            if response.stop_reason == "end_turn" {
                return Ok((false, "FAILED: agent stopped without a verdict".to_string()));
            }
            continue;
        }

        for tc in &response.tool_calls {
            let result = dispatcher.dispatch(&tc.name, tc.arguments.clone(), context).await?;
            let content = if result.display.is_empty() { result.data.to_string() } else { result.display.clone() };
            messages.push(Message::tool(content, tc.id.clone()));
        }
    }

    Ok((false, "FAILED: verification exhausted its iteration budget".to_string()))
}

/// Continuously validates build quality while workers execute. Runs
/// periodic checks (syntax, build, imports) and collects findings.
pub struct AuditAgent {
    dispatcher: Arc<ToolDispatcher>,
    context: ToolContext,
}

impl AuditAgent {
    pub fn new(dispatcher: Arc<ToolDispatcher>, context: ToolContext) -> Self {
        Self { dispatcher, context }
    }

    /// Run periodic validation checks. Returns the list of findings gathered
    /// over the agent's lifetime.
    pub async fn run_continuous(&self, check_interval_secs: u64) -> anyhow::Result<Vec<serde_json::Value>> {
        let mut findings = Vec::new();

        let initial_wait = {
            let deadline = self.context.deadline.read().await;
            let phase_remaining = deadline.phase_remaining(Some(Phase::Build)).as_secs_f64();
            std::time::Duration::from_secs_f64((check_interval_secs as f64).min(phase_remaining / 3.0).max(0.0))
        };
        tokio::time::sleep(initial_wait).await;

        loop {
            let should_continue = {
                let deadline = self.context.deadline.read().await;
                !deadline.is_expired() && deadline.phase_remaining(Some(Phase::Build)).as_secs() > 30
            };
            if !should_continue {
                break;
            }

            let check_result = self.run_checks().await?;
            if !check_result.is_empty() {
                self.context.event_log.emit(
                    Phase::Build.as_str(),
                    "audit.finding",
                    &format!("Audit found {} issue(s)", check_result.len()),
                    json!({"findings": check_result}),
                    None,
                )?;
                findings.extend(check_result);
            }

            tokio::time::sleep(std::time::Duration::from_secs(check_interval_secs)).await;
        }

        Ok(findings)
    }

    async fn run_checks(&self) -> anyhow::Result<Vec<serde_json::Value>> {
        let mut findings = Vec::new();
        let workspace = &self.context.workspace;

        let has_package_json = workspace.join("package.json").exists();
        let has_requirements = workspace.join("requirements.txt").exists();
        let has_app = ["app.py", "main.py", "server.js", "index.js", "src/App.tsx", "src/App.jsx"]
            .iter()
            .any(|f| workspace.join(f).exists());

        if !has_app && !has_package_json && !has_requirements {
            findings.push(json!({"type": "missing_files", "message": "No app entry point found yet"}));
            return Ok(findings);
        }

        if has_package_json {
            let result = self
                .dispatcher
                .dispatch(
                    "exec_command",
                    json!({
                        "command": "node -e 'JSON.parse(require(\"fs\").readFileSync(\"package.json\"))'",
                        "timeout": 10,
                    }),
                    &self.context,
                )
                .await?;
            if !result.is_ok() {
                findings.push(json!({"type": "invalid_json", "message": "package.json is invalid"}));
            }
        }

        if has_requirements {
            let result = self
                .dispatcher
                .dispatch(
                    "exec_command",
                    json!({"command": "python3 -c 'open(\"requirements.txt\").read()'", "timeout": 5}),
                    &self.context,
                )
                .await?;
            if !result.is_ok() {
                findings.push(json!({"type": "invalid_requirements", "message": "requirements.txt unreadable"}));
            }
        }

        Ok(findings)
    }
}
