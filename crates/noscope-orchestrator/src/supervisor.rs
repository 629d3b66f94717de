use std::path::Path;
use std::sync::Arc;

use serde_json::json;

use noscope_core::context::ToolContext;
use noscope_providers::provider::Provider;
use noscope_tools::dispatcher::ToolDispatcher;
use noscope_types::phase::Phase;
use noscope_types::task::{PlanOutput, PlanTask};

use crate::agent_loop::{AuditAgent, BuildAgent};
use crate::token_tracker::TokenTracker;

/// Maximum parallel workers, beyond the setup agent.
pub const MAX_WORKERS: usize = 3;

const AUDIT_CHECK_INTERVAL_SECS: u64 = 20;

/// Orchestrates multiple build agents for parallel task execution.
///
/// Execution model:
/// 1. Setup agent runs first (project scaffolding, deps) — must finish before workers
/// 2. Worker agents run in parallel on partitioned task sets
/// 3. Audit agent runs concurrently, validating build quality
pub struct Supervisor {
    provider: Arc<dyn Provider>,
    dispatcher: Arc<ToolDispatcher>,
    context: ToolContext,
    tokens: Option<Arc<TokenTracker>>,
}

impl Supervisor {
    pub fn new(
        provider: Arc<dyn Provider>,
        dispatcher: Arc<ToolDispatcher>,
        context: ToolContext,
        tokens: Option<Arc<TokenTracker>>,
    ) -> Self {
        Self { provider, dispatcher, context, tokens }
    }

    /// Execute the build plan with parallel agents. Returns all tasks with
    /// completion status updated.
    pub async fn run(&self, plan: &PlanOutput, workspace: &Path) -> anyhow::Result<Vec<PlanTask>> {
        let mut all_tasks = plan.tasks.clone();
        if all_tasks.is_empty() {
            return Ok(all_tasks);
        }

        self.context.event_log.emit(
            Phase::Build.as_str(),
            "supervisor.start",
            &format!("Supervisor starting with {} tasks", all_tasks.len()),
            json!({"task_count": all_tasks.len()}),
            None,
        )?;

        let (setup_tasks, remaining_tasks) = split_setup(all_tasks.clone());

        if !setup_tasks.is_empty() {
            let mut setup_agent = BuildAgent::new(
                "setup",
                self.provider.clone(),
                self.dispatcher.clone(),
                self.context.clone(),
                self.tokens.clone(),
            );
            let setup_prompt = setup_prompt(plan, workspace);
            let finished_setup = setup_agent.run(setup_tasks.clone(), &setup_prompt).await?;

            let done = finished_setup.iter().filter(|t| t.completed).count();
            self.context.event_log.emit(
                Phase::Build.as_str(),
                "supervisor.setup_done",
                &format!("Setup complete: {done}/{} tasks", finished_setup.len()),
                json!({}),
                None,
            )?;

            apply_updates(&mut all_tasks, &finished_setup);
        }

        let is_expired = self.context.deadline.read().await.is_expired();
        if !remaining_tasks.is_empty() && !is_expired {
            let streams = partition_tasks(remaining_tasks);
            let num_workers = streams.len();

            self.context.event_log.emit(
                Phase::Build.as_str(),
                "supervisor.parallel_start",
                &format!("Launching {num_workers} workers + audit agent"),
                json!({
                    "workers": num_workers,
                    "streams": streams.iter().map(|s| s.iter().map(|t| t.id.clone()).collect::<Vec<_>>()).collect::<Vec<_>>(),
                }),
                None,
            )?;

            let worker_futures = streams.iter().enumerate().map(|(i, stream)| {
                let mut agent = BuildAgent::new(
                    format!("worker-{i}"),
                    self.provider.clone(),
                    self.dispatcher.clone(),
                    self.context.clone(),
                    self.tokens.clone(),
                );
                let prompt = worker_prompt(plan, workspace, stream, i);
                let stream = stream.clone();
                async move { agent.run(stream, &prompt).await }
            });

            let audit = AuditAgent::new(self.dispatcher.clone(), self.context.clone());
            let audit_future = audit.run_continuous(AUDIT_CHECK_INTERVAL_SECS);

            let (worker_results, audit_result) = futures::future::join(
                futures::future::join_all(worker_futures),
                audit_future,
            )
            .await;

            for result in worker_results {
                match result {
                    Ok(finished_stream) => apply_updates(&mut all_tasks, &finished_stream),
                    Err(e) => tracing::warn!(error = %e, "worker agent failed"),
                }
            }
            if let Err(e) = audit_result {
                tracing::warn!(error = %e, "audit agent failed");
            }
        }

        let completed = all_tasks.iter().filter(|t| t.completed).count();
        self.context.event_log.emit(
            Phase::Build.as_str(),
            "supervisor.done",
            &format!("Build complete: {completed}/{} tasks done", all_tasks.len()),
            json!({"completed": completed, "total": all_tasks.len()}),
            None,
        )?;

        Ok(all_tasks)
    }
}

fn apply_updates(all_tasks: &mut [PlanTask], finished: &[PlanTask]) {
    for updated in finished {
        if let Some(t) = all_tasks.iter_mut().find(|t| t.id == updated.id) {
            t.completed = updated.completed;
        }
    }
}

/// Split off the first task (setup/scaffolding) from the rest.
fn split_setup(tasks: Vec<PlanTask>) -> (Vec<PlanTask>, Vec<PlanTask>) {
    let mut setup = Vec::new();
    let mut remaining = Vec::new();

    for t in tasks.iter() {
        if setup.is_empty()
            && (t.id == "t1"
                || t.title.to_lowercase().contains("setup")
                || t.title.to_lowercase().contains("scaffold"))
        {
            setup.push(t.clone());
        } else {
            remaining.push(t.clone());
        }
    }

    if setup.is_empty() && !tasks.is_empty() {
        setup = vec![tasks[0].clone()];
        remaining = tasks[1..].to_vec();
    }

    (setup, remaining)
}

/// Partition tasks into parallel work streams, grouping by dependency
/// chains and falling back to round-robin for unassigned tasks. Limits to
/// [`MAX_WORKERS`] streams.
fn partition_tasks(tasks: Vec<PlanTask>) -> Vec<Vec<PlanTask>> {
    if tasks.is_empty() {
        return Vec::new();
    }

    let mut streams: Vec<Vec<PlanTask>> = Vec::new();
    let mut assigned = std::collections::HashSet::new();

    for task in &tasks {
        if assigned.contains(&task.id) {
            continue;
        }

        let mut chain = vec![task.clone()];
        assigned.insert(task.id.clone());

        for other in &tasks {
            if !assigned.contains(&other.id) && other.depends_on.contains(&task.id) {
                chain.push(other.clone());
                assigned.insert(other.id.clone());
            }
        }

        streams.push(chain);
    }

    while streams.len() > MAX_WORKERS {
        streams.sort_by_key(|s| s.len());
        let smallest = streams.remove(0);
        streams[0].extend(smallest);
    }

    let unassigned: Vec<&PlanTask> = tasks.iter().filter(|t| !assigned.contains(&t.id)).collect();
    for (i, task) in unassigned.into_iter().enumerate() {
        if streams.is_empty() {
            streams.push(Vec::new());
        }
        let idx = i % streams.len();
        streams[idx].push(task.clone());
    }

    streams
}

fn setup_prompt(plan: &PlanOutput, workspace: &Path) -> String {
    format!(
        "You are the SETUP agent. Your job is to create the project foundation FAST.\n\n\
Workspace: {}\n\n\
RULES:\n\
- Create project structure and install dependencies\n\
- NEVER use interactive scaffolding (create-react-app, npm create, etc)\n\
- Write package.json / requirements.txt MANUALLY, then npm install / pip install\n\
- Use \"npm init -y\" if you need a basic package.json\n\
- Use \"python3 -m pip install\" instead of bare \"pip\"\n\
- Create essential config files (tsconfig.json, etc) by writing them directly\n\
- Call mark_task_complete when done\n\
- Be FAST — other agents are waiting for you to finish before they can start\n\n\
MVP definition: {}\n",
        workspace.display(),
        serde_json::to_string(&plan.mvp_definition).unwrap_or_default(),
    )
}

fn worker_prompt(plan: &PlanOutput, workspace: &Path, tasks: &[PlanTask], worker_idx: usize) -> String {
    let task_ids = tasks.iter().map(|t| t.id.as_str()).collect::<Vec<_>>().join(", ");
    format!(
        "You are worker agent {worker_idx}. You are one of several agents building this project IN PARALLEL.\n\n\
Workspace: {}\n\
Your assigned tasks: {task_ids}\n\n\
Other agents are working on different tasks simultaneously. Focus ONLY on your assigned tasks.\n\n\
RULES:\n\
- The project structure and dependencies are already set up — do NOT reinstall or reconfigure\n\
- Write code for YOUR tasks only\n\
- Do NOT modify files that other agents might be working on\n\
- Call mark_task_complete after finishing each task\n\
- If you need a file that doesn't exist yet, create it — another agent may not have written it yet\n\
- NEVER use interactive scaffolding tools (create-react-app, npm create, etc)\n\
- Use \"python3\" not \"python\", \"python3 -m pip\" not \"pip\"\n\
- Build something impressive — good styling, thoughtful UX\n\n\
MVP definition: {}\n\
Exclusions: {}\n",
        workspace.display(),
        serde_json::to_string(&plan.mvp_definition).unwrap_or_default(),
        serde_json::to_string(&plan.exclusions).unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use noscope_types::task::{TaskKind, TaskPriority};

    fn task(id: &str, title: &str, depends_on: Vec<&str>) -> PlanTask {
        PlanTask {
            id: id.to_string(),
            title: title.to_string(),
            kind: TaskKind::Edit,
            priority: TaskPriority::Mvp,
            description: String::new(),
            completed: false,
            depends_on: depends_on.into_iter().map(String::from).collect(),
        }
    }

    #[test]
    fn split_setup_picks_t1() {
        let tasks = vec![task("t1", "Set up project", vec![]), task("t2", "Build UI", vec!["t1"])];
        let (setup, remaining) = split_setup(tasks);
        assert_eq!(setup.len(), 1);
        assert_eq!(setup[0].id, "t1");
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn split_setup_falls_back_to_first_task() {
        let tasks = vec![task("a1", "Build backend", vec![]), task("a2", "Build frontend", vec![])];
        let (setup, remaining) = split_setup(tasks);
        assert_eq!(setup[0].id, "a1");
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn partition_caps_at_max_workers() {
        let tasks: Vec<PlanTask> = (0..6).map(|i| task(&format!("t{i}"), "task", vec![])).collect();
        let streams = partition_tasks(tasks);
        assert!(streams.len() <= MAX_WORKERS);
    }

    #[test]
    fn partition_groups_dependency_chains() {
        let tasks = vec![task("t2", "A", vec![]), task("t3", "A child", vec!["t2"])];
        let streams = partition_tasks(tasks);
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].len(), 2);
    }
}
