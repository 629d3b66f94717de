use noscope_providers::provider::Provider;
use noscope_types::message::{Message, Usage};
use noscope_types::spec_input::SpecInput;
use noscope_types::task::PlanOutput;

use crate::token_tracker::TokenTracker;

pub const PLAN_SYSTEM_PROMPT: &str = r#"You are a software architect planning an MVP build within a strict timebox.

IMPORTANT: Multiple agents will execute this plan IN PARALLEL. Task t1 (setup) runs first alone, then remaining tasks run concurrently across workers. Design tasks to be independent where possible.

Given a project specification, produce a structured JSON plan. Your output must be valid JSON matching this schema:

{
  "requested_capabilities": [
    {"cap": "workspace_rw|shell_exec|net_http|git|docker|secrets:<NAME>", "why": "justification", "risk": "low|medium|high"}
  ],
  "tasks": [
    {"id": "t1", "title": "Task name", "kind": "edit|shell|test", "priority": "mvp|stretch", "description": "What to do", "depends_on": []}
  ],
  "mvp_definition": ["What counts as done"],
  "exclusions": ["What is explicitly NOT being built"],
  "acceptance_plan": [
    {"name": "check name", "cmd": "shell command or null", "must_pass": true}
  ]
}

CRITICAL RULES:
- THE APP MUST RUN. A broken app is a total failure regardless of how many features it has.
- Always request workspace_rw and shell_exec capabilities
- Task t1 MUST be "Set up project structure and install dependencies"
- Task t1 runs ALONE before all other tasks — it creates the foundation
- All other tasks should specify depends_on: ["t1"] unless they depend on another task
- Design tasks so parallel agents can work on them WITHOUT file conflicts
- Each task should own specific files/components — describe which files in the description
- Acceptance checks must use paths that match where files are actually created
- Do NOT spend tasks on mock data files or placeholder content — inline minimal data in code

STACK SELECTION — match complexity to timebox:
- <=5m: 2-3 MVP tasks. Use the SIMPLEST stack: vanilla HTML/CSS/JS, single Python file with Flask, or Node.js with Express. NO TypeScript, NO React, NO build tools, NO Tailwind.
- 5-10m: 3-5 MVP tasks. Lightweight frameworks OK (Flask, Express). Avoid TypeScript and complex build chains.
- 10-20m: 5-7 MVP tasks. Frameworks OK, TypeScript OK if the spec requires it.
- 20m+: Full stack OK, up to 8+ MVP tasks + stretch tasks.

NEVER USE INTERACTIVE SCAFFOLDING TOOLS:
- NEVER plan tasks that use create-react-app, npm create, npx create-*, yarn create, or similar
- These commands HANG and waste the entire timebox
- Instead: write package.json manually, then npm install
- For Python: write requirements.txt, then pip install -r requirements.txt

Mark stretch tasks for features to add if time permits.

Respond ONLY with the JSON object, no markdown fences or explanation.
"#;

const MAX_RETRIES: u32 = 2;

fn user_content(spec: &SpecInput) -> String {
    let constraints = serde_json::to_string(&spec.constraints).unwrap_or_default();
    let acceptance: Vec<&str> = spec.acceptance.iter().map(|a| a.raw.as_str()).collect();
    let acceptance = serde_json::to_string(&acceptance).unwrap_or_default();
    let stack_prefs = serde_json::to_string(&spec.stack_prefs.clone().unwrap_or_default()).unwrap_or_default();

    format!(
        "Project: {}\nTimebox: {} ({}s)\nConstraints: {}\nAcceptance criteria: {}\nStack preferences: {}\nRepo mode: {:?}\n\nSpec body:\n{}\n",
        spec.name, spec.timebox, spec.timebox_seconds, constraints, acceptance, stack_prefs, spec.repo_mode, spec.body,
    )
}

fn strip_markdown_fences(raw: &str) -> String {
    let raw = raw.trim();
    if !raw.starts_with("```") {
        return raw.to_string();
    }
    let lines: Vec<&str> = raw.lines().collect();
    if lines.last().map(|l| l.trim() == "```").unwrap_or(false) && lines.len() > 1 {
        lines[1..lines.len() - 1].join("\n")
    } else {
        lines[1..].join("\n")
    }
}

/// Generate a build plan from a spec using an LLM, retrying on malformed
/// JSON up to `MAX_RETRIES` additional times.
pub async fn plan(
    spec: &SpecInput,
    provider: &dyn Provider,
    tokens: Option<&TokenTracker>,
) -> anyhow::Result<PlanOutput> {
    let mut messages = vec![
        Message::system(PLAN_SYSTEM_PROMPT),
        Message::user(user_content(spec)),
    ];

    let mut last_error = None;

    for attempt in 0..=MAX_RETRIES {
        let response = provider.complete(&messages, None, None).await?;
        if let Some(tokens) = tokens {
            tokens.add(Usage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            });
        }

        let raw = strip_markdown_fences(&response.content);
        match serde_json::from_str::<PlanOutput>(&raw) {
            Ok(plan_output) => return Ok(plan_output),
            Err(e) => {
                last_error = Some(e.to_string());
                if attempt < MAX_RETRIES {
                    let assistant_content = response.content.clone();
                    messages.push(Message::assistant(assistant_content, vec![]));
                    messages.push(Message::user(format!(
                        "Your response was not valid JSON. Error: {}. Please try again with valid JSON only.",
                        last_error.as_deref().unwrap_or("unknown")
                    )));
                }
            }
        }
    }

    anyhow::bail!(
        "Failed to generate valid plan after {} attempts: {}",
        MAX_RETRIES + 1,
        last_error.unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_markdown_fences() {
        let raw = "```json\n{\"tasks\": []}\n```";
        assert_eq!(strip_markdown_fences(raw), "{\"tasks\": []}");
    }

    #[test]
    fn leaves_plain_json_untouched() {
        let raw = "{\"tasks\": []}";
        assert_eq!(strip_markdown_fences(raw), raw);
    }
}
