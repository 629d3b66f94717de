use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{info, warn};

use noscope_core::capability_store::CapabilityStore;
use noscope_core::context::ToolContext;
use noscope_core::deadline::Deadline;
use noscope_core::event_log::{EventLog, RunDir};
use noscope_orchestrator::{
    AcceptanceResult, BuildPhase, HandoffPhase, HardenPhase, PlanPhase, RequestPhase, TokenTracker, VerifyPhase,
};
use noscope_providers::Provider;
use noscope_tools::dispatcher::ToolDispatcher;
use noscope_tools::git::{GitAddTool, GitCommitTool, GitDiffTool, GitInitTool, GitStatusTool};
use noscope_tools::registry::default_dispatcher;
use noscope_tools::sandbox::{
    DockerCreateDirectoryTool, DockerListDirectoryTool, DockerReadFileTool, DockerSandbox, DockerShellTool,
    DockerWriteFileTool,
};
use noscope_types::spec_input::SpecInput;
use noscope_types::task::{PlanOutput, PlanTask};

use crate::config::{runtime_secrets, Settings};
use crate::launch;

pub struct RunRequest {
    pub spec: SpecInput,
    pub output_dir: Option<PathBuf>,
    pub sandbox: bool,
    pub auto_approve: bool,
}

/// Execute a full run: PLAN → REQUEST → BUILD → HARDEN → VERIFY → HANDOFF,
/// always producing a handoff report. Returns the run directory path.
pub async fn run(settings: &Settings, provider: Arc<dyn Provider>, req: RunRequest) -> Result<PathBuf> {
    let tokens = Arc::new(TokenTracker::new());
    let spec = req.spec;

    let workspace = resolve_workspace(&spec, req.output_dir.as_deref(), req.auto_approve).await?;

    let run_dir = RunDir::new(None, None)?;
    let event_log = Arc::new(EventLog::open(&run_dir)?);

    event_log.emit(
        "INIT",
        "run.start",
        &format!("Starting run: {}", spec.name),
        json!({
            "workspace": workspace.display().to_string(),
            "timebox": spec.timebox,
            "timebox_seconds": spec.timebox_seconds,
        }),
        None,
    )?;

    let deadline = Deadline::new(spec.timebox_seconds);

    let (dispatcher, docker_sandbox): (ToolDispatcher, Option<Arc<DockerSandbox>>) = if req.sandbox {
        let sandbox = Arc::new(DockerSandbox::new(workspace.clone(), None));
        sandbox.ensure_running().await?;
        info!("Docker sandbox active — all operations run in an isolated container");
        let mut dispatcher = ToolDispatcher::new();
        dispatcher.register_all(vec![
            Arc::new(DockerReadFileTool::new(sandbox.clone())),
            Arc::new(DockerWriteFileTool::new(sandbox.clone())),
            Arc::new(DockerListDirectoryTool::new(sandbox.clone())),
            Arc::new(DockerCreateDirectoryTool::new(sandbox.clone())),
            Arc::new(DockerShellTool::new(sandbox.clone())),
            Arc::new(GitInitTool),
            Arc::new(GitStatusTool),
            Arc::new(GitAddTool),
            Arc::new(GitCommitTool),
            Arc::new(GitDiffTool),
        ]);
        (dispatcher, Some(sandbox))
    } else {
        (default_dispatcher(), None)
    };
    let dispatcher = Arc::new(dispatcher);

    let mut tasks: Vec<PlanTask> = Vec::new();
    let mut acceptance_results = Vec::new();
    let mut plan_output: Option<PlanOutput> = None;
    let mut verify_data: Option<(bool, String)> = None;

    let outcome: Result<()> = async {
        info!(phase = "PLAN", remaining = %deadline.format_remaining(), "Generating build plan");
        let plan = PlanPhase::run(&spec, provider.as_ref(), &event_log, Some(tokens.as_ref())).await?;
        info!("Plan: {} tasks, {} capabilities requested", plan.tasks.len(), plan.requested_capabilities.len());
        tokio::fs::write(run_dir.plan_path(), serde_json::to_string_pretty(&plan)?).await?;
        plan_output = Some(plan);
        let plan = plan_output.as_ref().unwrap();

        let should_auto = req.auto_approve || settings.danger_mode;
        info!(phase = "REQUEST", remaining = %deadline.format_remaining(), "Reviewing capabilities");
        let grants = RequestPhase::run(plan, &event_log, should_auto).await?;
        let approved = grants.iter().filter(|g| g.approved).count();
        info!("Approved {}/{} capabilities", approved, grants.len());
        tokio::fs::write(run_dir.capabilities_grant_path(), serde_json::to_string_pretty(&grants)?).await?;

        write_contract(&run_dir, &spec, plan, &grants).await?;

        let cap_store = CapabilityStore::new(grants);
        let context = ToolContext::new(
            workspace.clone(),
            cap_store,
            event_log.clone(),
            deadline,
            runtime_secrets(settings),
            settings.danger_mode,
        );

        info!(phase = "BUILD", remaining = %context.deadline.read().await.format_remaining(), "Building MVP");
        let built = BuildPhase::run(plan, provider.clone(), dispatcher.clone(), context.clone(), &workspace, Some(tokens.clone()))
            .await?;
        let completed = built.iter().filter(|t| t.completed).count();
        info!("Completed {}/{} tasks", completed, built.len());
        tasks = built;

        info!(phase = "HARDEN", "Running acceptance checks");
        let results = HardenPhase::run(plan, &spec, dispatcher.as_ref(), &context).await?;
        acceptance_results = results;

        let expired = context.deadline.read().await.is_expired();
        if !expired {
            info!(phase = "VERIFY", "Verifying MVP runs");
            let (verified, msg) =
                VerifyPhase::run(&spec, provider.as_ref(), dispatcher.as_ref(), &context, Some(tokens.as_ref())).await?;
            info!(verified, "{}", msg);
            verify_data = Some((verified, msg));
        }

        Ok(())
    }
    .await;

    if let Err(e) = outcome {
        event_log.emit(
            "ERROR",
            "run.error",
            &format!("Run error: {e}"),
            json!({"error": e.to_string()}),
            None,
        )?;
        warn!(error = %e, "run failed before HANDOFF");
        if tasks.is_empty() {
            if let Some(plan) = &plan_output {
                tasks = plan.tasks.clone();
            }
        }
    }

    info!(phase = "HANDOFF", "Generating report");
    if let Err(e) = HandoffPhase::run(&spec, &tasks, &acceptance_results, provider.as_ref(), &event_log, &run_dir.handoff_path())
        .await
    {
        event_log.emit(
            "HANDOFF",
            "handoff.error",
            &format!("Handoff report generation failed: {e}"),
            json!({"error": e.to_string()}),
            None,
        )?;
        let fallback = format!("# Handoff Report: {}\n\nRun failed with error: {e}\n", spec.name);
        tokio::fs::write(run_dir.handoff_path(), fallback).await?;
    }

    if let Some(sandbox) = &docker_sandbox {
        if let Err(e) = sandbox.stop().await {
            warn!(error = %e, "failed to stop Docker sandbox");
        }
    }

    event_log.emit("HANDOFF", "run.complete", "Run complete", json!({}), None)?;
    event_log.close().context("closing event log")?;

    let (launch_cmd, launch_url) = launch::detect_launch(&workspace);
    let completed_count = tasks.iter().filter(|t| t.completed).count();
    let checks_passed = acceptance_results.iter().filter(|r: &&AcceptanceResult| r.passed).count();

    println!("\n=== Run summary: {} ===", spec.name);
    println!("workspace:  {}", workspace.display());
    println!("run dir:    {}", run_dir.path.display());
    println!("tasks:      {completed_count}/{}", tasks.len());
    println!("checks:     {checks_passed}/{}", acceptance_results.len());
    if let Some((verified, msg)) = &verify_data {
        println!("verify:     {} — {msg}", if *verified { "VERIFIED" } else { "FAILED" });
    }
    if launch_cmd.is_some() {
        println!("launch url: {launch_url}");
    }

    if matches!(verify_data, Some((true, _))) {
        if let Some(cmd) = launch_cmd {
            println!("\nLaunching: {cmd}\n");
            launch::run_server(&cmd, &workspace).await?;
        }
    }

    Ok(run_dir.path)
}

async fn resolve_workspace(spec: &SpecInput, output_dir: Option<&Path>, auto_approve: bool) -> Result<PathBuf> {
    let default = PathBuf::from(format!("./out/{}", spec.name.to_lowercase().replace(' ', "-")));
    let workspace = output_dir.map(Path::to_path_buf).unwrap_or(default);
    tokio::fs::create_dir_all(&workspace).await?;
    let workspace = tokio::fs::canonicalize(&workspace).await?;

    if workspace_has_files(&workspace).await? {
        if auto_approve {
            clear_workspace(&workspace).await?;
            info!("Cleared existing workspace: {}", workspace.display());
            Ok(workspace)
        } else {
            handle_dirty_workspace(workspace).await
        }
    } else {
        Ok(workspace)
    }
}

const WORKSPACE_IGNORE: &[&str] = &[".noscope", ".git", "__pycache__", ".DS_Store"];

async fn workspace_has_files(workspace: &Path) -> Result<bool> {
    let mut entries = tokio::fs::read_dir(workspace).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if !WORKSPACE_IGNORE.iter().any(|i| name == *i) {
            return Ok(true);
        }
    }
    Ok(false)
}

async fn clear_workspace(workspace: &Path) -> Result<()> {
    let keep = [".noscope", ".git"];
    let mut entries = tokio::fs::read_dir(workspace).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if keep.iter().any(|k| name == *k) {
            continue;
        }
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

/// Prompt the operator to clear, branch into a fresh directory, or abort
/// when the target workspace is non-empty.
async fn handle_dirty_workspace(workspace: PathBuf) -> Result<PathBuf> {
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(
            format!(
                "\nWarning: workspace already contains files: {}\nClear it, use a new directory, or abort? [clear/new/abort] (clear) ",
                workspace.display()
            )
            .as_bytes(),
        )
        .await?;
    stdout.flush().await?;

    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    let choice = line.trim().to_lowercase();

    match choice.as_str() {
        "" | "clear" => {
            clear_workspace(&workspace).await?;
            info!("Cleared. Building in {}", workspace.display());
            Ok(workspace)
        }
        "new" => {
            let mut suffix = 1u32;
            loop {
                let candidate = workspace.with_file_name(format!(
                    "{}-{suffix}",
                    workspace.file_name().unwrap_or_default().to_string_lossy()
                ));
                if !candidate.exists() {
                    tokio::fs::create_dir_all(&candidate).await?;
                    info!("Created new workspace: {}", candidate.display());
                    return Ok(candidate);
                }
                suffix += 1;
            }
        }
        _ => anyhow::bail!("Aborted by user."),
    }
}

/// Write the run's immutable success-criteria snapshot: the approved
/// capability grants alongside the plan's MVP definition, exclusions, and
/// acceptance plan. Nothing downstream may mutate it once written.
async fn write_contract(
    run_dir: &RunDir,
    spec: &SpecInput,
    plan: &PlanOutput,
    grants: &[noscope_types::capability::CapabilityGrant],
) -> Result<()> {
    let contract = json!({
        "name": spec.name,
        "timebox": spec.timebox,
        "timebox_seconds": spec.timebox_seconds,
        "constraints": spec.constraints,
        "mvp_definition": plan.mvp_definition,
        "exclusions": plan.exclusions,
        "tasks": plan.tasks,
        "acceptance_plan": plan.acceptance_plan,
        "capability_grants": grants,
        "spec_acceptance": spec.acceptance,
    });
    tokio::fs::write(run_dir.contract_path(), serde_json::to_string_pretty(&contract)?).await?;
    Ok(())
}
