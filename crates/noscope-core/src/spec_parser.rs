use std::path::Path;

use anyhow::{anyhow, Context, Result};
use gray_matter::engine::YAML;
use gray_matter::Matter;
use serde::Deserialize;

use noscope_types::spec_input::{parse_duration, AcceptanceCheck, RepoMode, RiskPolicy, SpecInput};

#[derive(Debug, Default, Deserialize)]
struct Frontmatter {
    name: Option<String>,
    timebox: Option<String>,
    #[serde(default)]
    constraints: Vec<String>,
    #[serde(default)]
    acceptance: Vec<String>,
    #[serde(default)]
    stack_prefs: Option<Vec<String>>,
    #[serde(default)]
    repo_mode: Option<RepoMode>,
    #[serde(default)]
    risk_policy: Option<RiskPolicy>,
}

/// Parse a Markdown-plus-YAML-frontmatter spec file into a [`SpecInput`].
///
/// Frontmatter must contain `name` and `timebox`; everything else is
/// optional. The body after the closing `---` becomes the free-form
/// project description.
pub fn parse_spec(path: &Path) -> Result<SpecInput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading spec file {}", path.display()))?;
    parse_spec_str(&text)
}

pub fn parse_spec_str(text: &str) -> Result<SpecInput> {
    let parsed = Matter::<YAML>::new()
        .parse::<Frontmatter>(text)
        .map_err(|e| anyhow!("invalid YAML frontmatter: {e}"))?;
    let meta = parsed.data.unwrap_or_default();

    let name = meta.name.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
        anyhow!("Spec must include 'name' in frontmatter")
    })?;
    let timebox = meta.timebox.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
        anyhow!("Spec must include 'timebox' in frontmatter")
    })?;
    let timebox_seconds = parse_duration(&timebox).map_err(|e| anyhow!(e))?;

    let acceptance = meta.acceptance.iter().map(|a| AcceptanceCheck::from_string(a)).collect();

    Ok(SpecInput {
        name,
        timebox,
        timebox_seconds,
        constraints: meta.constraints,
        acceptance,
        body: parsed.content,
        stack_prefs: meta.stack_prefs,
        repo_mode: meta.repo_mode.unwrap_or_default(),
        risk_policy: meta.risk_policy.unwrap_or_default(),
    })
}

/// A spec file template written by `noscope init`, matching the shape
/// [`parse_spec`] expects.
pub fn spec_template(name: &str) -> String {
    format!(
        "---\n\
name: {name}\n\
timebox: 30m\n\
constraints:\n\
  - No external paid APIs\n\
acceptance:\n\
  - cmd: curl -sf http://localhost:3000/\n\
  - Landing page loads and shows the project name\n\
stack_prefs:\n\
  - Node.js\n\
repo_mode: new\n\
risk_policy: default\n\
---\n\n\
# {name}\n\n\
Describe the project here: what it does, who it's for, and anything the\n\
build agents need to know that isn't captured above.\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_spec() {
        let text = "---\nname: Hello\ntimebox: 5m\n---\nBuild a hello world page.\n";
        let spec = parse_spec_str(text).unwrap();
        assert_eq!(spec.name, "Hello");
        assert_eq!(spec.timebox_seconds, 300);
        assert_eq!(spec.body.trim(), "Build a hello world page.");
    }

    #[test]
    fn rejects_missing_name() {
        let text = "---\ntimebox: 5m\n---\nbody\n";
        assert!(parse_spec_str(text).is_err());
    }

    #[test]
    fn parses_cmd_acceptance_checks() {
        let text = "---\nname: X\ntimebox: 1m\nacceptance:\n  - \"cmd: echo hi\"\n  - narrative check\n---\n";
        let spec = parse_spec_str(text).unwrap();
        assert_eq!(spec.acceptance.len(), 2);
        assert!(spec.acceptance[0].is_cmd);
        assert!(!spec.acceptance[1].is_cmd);
    }
}
