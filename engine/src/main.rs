mod config;
mod launch;
mod providers;
mod run;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::info;

use config::{load_settings, SettingsOverrides};
use noscope_types::spec_input::{AcceptanceCheck, SpecInput};

#[derive(Parser, Debug)]
#[command(name = "noscope")]
#[command(about = "Time-boxed autonomous build orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build an MVP from a spec within a timebox.
    Run {
        #[arg(long, short = 's')]
        spec: PathBuf,
        #[arg(long, short = 't', default_value = "30m")]
        time: String,
        #[arg(long, short = 'd')]
        dir: Option<PathBuf>,
        #[arg(long)]
        sandbox: bool,
        #[arg(long, short = 'p')]
        provider: Option<String>,
        #[arg(long, short = 'm')]
        model: Option<String>,
        #[arg(long)]
        danger: bool,
        #[arg(long, short = 'y')]
        yes: bool,
        /// Accepted for compatibility; status is always reported as plain log lines.
        #[arg(long)]
        tui: bool,
    },
    /// Create a new project interactively and start building immediately.
    New {
        #[arg(long, short = 'p')]
        provider: Option<String>,
        #[arg(long, short = 'm')]
        model: Option<String>,
        #[arg(long)]
        danger: bool,
        #[arg(long, short = 'y')]
        yes: bool,
    },
    /// Create a spec file template.
    Init,
    /// Check environment for NoScope requirements.
    Doctor,
    /// Replay a previous run.
    Replay,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logs_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".noscope").join("logs");
    let _guard = noscope_observability::init_process_logging(noscope_observability::ProcessKind::Engine, &logs_dir, 14)
        .map(|(guard, _info)| guard)
        .ok();

    let cli = Cli::parse();

    match cli.command {
        Command::Run { spec, time, dir, sandbox, provider, model, danger, yes, tui: _ } => {
            let settings = match load_settings(SettingsOverrides {
                default_provider: provider.clone(),
                default_model: model.clone(),
                danger_mode: Some(danger),
            }) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Configuration error: {e}");
                    std::process::exit(1);
                }
            };
            if danger {
                eprintln!("WARNING: --danger bypasses safety filters on shell commands. Use with care.");
            }

            let mut spec_input = noscope_core::parse_spec(&spec).with_context(|| format!("loading {}", spec.display()))?;
            if time != "30m" {
                apply_timebox_override(&mut spec_input, &time)?;
            }

            info!(project = %spec_input.name, timebox = %spec_input.timebox, "starting run");

            let resolved_provider = providers::build_provider(&settings, provider.as_deref(), model.as_deref())?;
            run::run(
                &settings,
                resolved_provider,
                run::RunRequest { spec: spec_input, output_dir: dir, sandbox, auto_approve: yes },
            )
            .await?;
        }
        Command::New { provider, model, danger, yes } => {
            let settings = match load_settings(SettingsOverrides {
                default_provider: provider.clone(),
                default_model: model.clone(),
                danger_mode: Some(danger),
            }) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("Configuration error: {e}");
                    std::process::exit(1);
                }
            };
            if danger {
                eprintln!("WARNING: --danger bypasses safety filters on shell commands. Use with care.");
            }

            let spec_input = prompt_new_project().await?;
            let output_dir = PathBuf::from(format!("./{}", spec_input.name.to_lowercase().replace(' ', "-")));

            let resolved_provider = providers::build_provider(&settings, provider.as_deref(), model.as_deref())?;
            run::run(
                &settings,
                resolved_provider,
                run::RunRequest { spec: spec_input, output_dir: Some(output_dir), sandbox: false, auto_approve: yes },
            )
            .await?;
        }
        Command::Init => init_spec_template().await?,
        Command::Doctor => doctor().await,
        Command::Replay => {
            println!("Replay is not yet implemented. Coming in a future release.");
        }
    }

    Ok(())
}

fn apply_timebox_override(spec: &mut SpecInput, time: &str) -> anyhow::Result<()> {
    let seconds = noscope_types::spec_input::parse_duration(time).map_err(anyhow::Error::msg)?;
    spec.timebox = time.to_string();
    spec.timebox_seconds = seconds;
    Ok(())
}

async fn prompt_new_project() -> anyhow::Result<SpecInput> {
    let mut stdout = tokio::io::stdout();
    let mut reader = BufReader::new(tokio::io::stdin());

    let name = prompt_line(&mut stdout, &mut reader, "Project name: ", "").await?;
    if name.trim().is_empty() {
        anyhow::bail!("Project name is required");
    }

    stdout.write_all(b"\nWhat should it do? (enter a blank line to finish)\n").await?;
    stdout.flush().await?;
    let mut lines = Vec::new();
    loop {
        let line = prompt_line(&mut stdout, &mut reader, "  ", "").await?;
        if line.trim().is_empty() {
            break;
        }
        lines.push(line);
    }
    if lines.is_empty() {
        anyhow::bail!("Description is required");
    }
    let body = lines.join("\n");

    let timebox = prompt_line(&mut stdout, &mut reader, "Timebox [5m]: ", "5m").await?;
    let constraints_raw = prompt_line(&mut stdout, &mut reader, "Constraints (comma-separated, Enter to skip): ", "").await?;
    let constraints: Vec<String> = constraints_raw.split(',').map(str::trim).filter(|c| !c.is_empty()).map(String::from).collect();

    let acceptance_raw = prompt_line(&mut stdout, &mut reader, "Acceptance checks (comma-separated, Enter to skip): ", "").await?;
    let acceptance: Vec<AcceptanceCheck> =
        acceptance_raw.split(',').map(str::trim).filter(|a| !a.is_empty()).map(AcceptanceCheck::from_string).collect();

    let timebox_seconds = noscope_types::spec_input::parse_duration(&timebox).map_err(anyhow::Error::msg)?;

    Ok(SpecInput {
        name: name.trim().to_string(),
        timebox,
        timebox_seconds,
        constraints,
        acceptance,
        body: format!("# {}\n\n{body}", name.trim()),
        stack_prefs: None,
        repo_mode: Default::default(),
        risk_policy: Default::default(),
    })
}

async fn prompt_line(
    stdout: &mut tokio::io::Stdout,
    reader: &mut BufReader<tokio::io::Stdin>,
    prompt: &str,
    default: &str,
) -> anyhow::Result<String> {
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;
    let mut line = String::new();
    reader.read_line(&mut line).await?;
    let trimmed = line.trim().to_string();
    if trimmed.is_empty() { Ok(default.to_string()) } else { Ok(trimmed) }
}

async fn init_spec_template() -> anyhow::Result<()> {
    let template = noscope_core::spec_template("My Project");
    let mut path = PathBuf::from("spec.md");
    if path.exists() {
        for i in 1..100 {
            let candidate = PathBuf::from(format!("spec-{i}.md"));
            if !candidate.exists() {
                path = candidate;
                break;
            }
        }
    }
    tokio::fs::write(&path, template).await?;
    println!("Created {} — edit it and run: noscope run --spec {}", path.display(), path.display());
    Ok(())
}

async fn doctor() {
    println!("NoScope Doctor\n");

    let _ = dotenvy::dotenv();
    let has_anthropic =
        std::env::var("NOSCOPE_ANTHROPIC_API_KEY").is_ok() || std::env::var("ANTHROPIC_API_KEY").is_ok();
    let has_openai = std::env::var("NOSCOPE_OPENAI_API_KEY").is_ok() || std::env::var("OPENAI_API_KEY").is_ok();

    let checks: Vec<(&str, bool, String)> = vec![
        ("Anthropic API key", has_anthropic, if has_anthropic { "set".into() } else { "not set".into() }),
        ("OpenAI API key", has_openai, if has_openai { "set".into() } else { "not set".into() }),
        ("At least one API key", has_anthropic || has_openai, String::new()),
        ("git", which("git").is_some(), which("git").unwrap_or_else(|| "not found".into())),
        ("docker (optional)", which("docker").is_some(), which("docker").unwrap_or_else(|| "not found".into())),
    ];

    for (name, ok, detail) in &checks {
        let icon = if *ok { "\u{2713}" } else { "\u{2717}" };
        let suffix = if detail.is_empty() { String::new() } else { format!(" ({detail})") };
        println!("  {icon} {name}{suffix}");
    }

    println!();
    let required_ok = checks.iter().filter(|(name, ..)| !name.contains("optional")).all(|(_, ok, _)| *ok);
    if required_ok {
        println!("All checks passed!");
    } else {
        println!("Some checks failed. Fix the issues above.");
    }
}

fn which(bin: &str) -> Option<String> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).map(|dir| dir.join(bin)).find(|p| p.is_file()).map(|p| p.display().to_string())
}
