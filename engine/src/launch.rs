use std::path::Path;

/// Heuristically detect how to launch the workspace the build phase
/// produced. Returns `(command, url)`; `command` is `None` when nothing
/// recognizable was found.
pub fn detect_launch(workspace: &Path) -> (Option<String>, String) {
    let app_py = workspace.join("app.py");
    let main_py = workspace.join("main.py");
    let manage_py = workspace.join("manage.py");
    let package_json = workspace.join("package.json");

    if app_py.exists() {
        let content = std::fs::read_to_string(&app_py).unwrap_or_default();
        let lower = content.to_lowercase();
        if lower.contains("flask") {
            return (Some("python3 app.py".to_string()), "http://localhost:5000".to_string());
        }
        if lower.contains("fastapi") {
            return (
                Some("python3 -m uvicorn app:app --host 0.0.0.0 --port 8000".to_string()),
                "http://localhost:8000".to_string(),
            );
        }
        return (Some("python3 app.py".to_string()), "http://localhost:5000".to_string());
    }

    if main_py.exists() {
        let content = std::fs::read_to_string(&main_py).unwrap_or_default();
        let lower = content.to_lowercase();
        if lower.contains("flask") || lower.contains("fastapi") {
            return (Some("python3 main.py".to_string()), "http://localhost:5000".to_string());
        }
        return (Some("python3 main.py".to_string()), "http://localhost:8000".to_string());
    }

    if manage_py.exists() {
        return (Some("python3 manage.py runserver".to_string()), "http://localhost:8000".to_string());
    }

    if package_json.exists() {
        return (Some("npm start".to_string()), "http://localhost:3000".to_string());
    }

    (None, String::new())
}

/// Launch the detected command and stream its output until the user hits
/// Ctrl-C, at which point the child is asked to terminate gracefully and
/// killed if it doesn't within 5 seconds.
pub async fn run_server(command: &str, workspace: &Path) -> anyhow::Result<()> {
    use tokio::io::{AsyncBufReadExt, BufReader};
    use tokio::process::Command;

    let env = noscope_tools::shell::build_execution_env();

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(workspace)
        .env_clear()
        .envs(env)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()?;

    let stdout = child.stdout.take().expect("piped stdout");
    let mut lines = BufReader::new(stdout).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(text) => println!("{text}"),
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if let Some(id) = child.id() {
                    let _ = tokio::process::Command::new("kill").args(["-TERM", &id.to_string()]).status().await;
                }
                let waited = tokio::time::timeout(std::time::Duration::from_secs(5), child.wait()).await;
                if waited.is_err() {
                    let _ = child.kill().await;
                }
                break;
            }
        }
    }

    Ok(())
}
