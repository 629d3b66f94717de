use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepoMode {
    New,
    Existing,
}

impl Default for RepoMode {
    fn default() -> Self {
        RepoMode::New
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskPolicy {
    Strict,
    Default,
    Permissive,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        RiskPolicy::Default
    }
}

/// A single acceptance criterion from the spec: either a narrative
/// claim or, when prefixed with `cmd:`, a shell check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcceptanceCheck {
    pub raw: String,
    pub is_cmd: bool,
    pub command: Option<String>,
}

impl AcceptanceCheck {
    pub fn from_string(s: &str) -> Self {
        let s = s.trim();
        let has_prefix = s.len() >= 4 && s[..4].eq_ignore_ascii_case("cmd:");
        if has_prefix {
            return Self {
                raw: s.to_string(),
                is_cmd: true,
                command: Some(s[4..].trim().to_string()),
            };
        }
        Self {
            raw: s.to_string(),
            is_cmd: false,
            command: None,
        }
    }
}

/// Parsed and validated spec input — the PLAN phase's only collaborator
/// upstream of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpecInput {
    pub name: String,
    pub timebox: String,
    #[serde(default)]
    pub timebox_seconds: u64,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub acceptance: Vec<AcceptanceCheck>,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub stack_prefs: Option<Vec<String>>,
    #[serde(default)]
    pub repo_mode: RepoMode,
    #[serde(default)]
    pub risk_policy: RiskPolicy,
}

/// Parse a duration string like `"30m"`, `"1h"`, `"1h30m"`, `"90s"` into
/// seconds. A bare number of digits defaults to minutes.
pub fn parse_duration(s: &str) -> Result<u64, String> {
    let s = s.trim().to_lowercase();
    let mut total: u64 = 0;
    let mut current = String::new();

    for c in s.chars() {
        if c.is_ascii_digit() {
            current.push(c);
        } else {
            let multiplier = match c {
                'h' => 3600,
                'm' => 60,
                's' => 1,
                other => return Err(format!("Invalid duration character: {other}")),
            };
            if current.is_empty() {
                return Err(format!("Invalid duration: {s}"));
            }
            let n: u64 = current
                .parse()
                .map_err(|_| format!("Invalid duration: {s}"))?;
            total += n * multiplier;
            current.clear();
        }
    }

    if !current.is_empty() {
        let n: u64 = current
            .parse()
            .map_err(|_| format!("Invalid duration: {s}"))?;
        total += n * 60;
    }

    if total == 0 {
        return Err(format!("Duration must be positive: {s}"));
    }

    Ok(total)
}

/// Render seconds back into a canonical `1h30m`-style string.
pub fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if seconds > 0 || out.is_empty() {
        out.push_str(&format!("{seconds}s"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_combined_durations() {
        assert_eq!(parse_duration("1h30m").unwrap(), 5400);
        assert_eq!(parse_duration("90s").unwrap(), 90);
        assert_eq!(parse_duration("5").unwrap(), 300);
    }

    #[test]
    fn rejects_non_positive() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("").is_err());
    }

    #[test]
    fn acceptance_check_detects_cmd_prefix() {
        let c = AcceptanceCheck::from_string("cmd: python main.py");
        assert!(c.is_cmd);
        assert_eq!(c.command.as_deref(), Some("python main.py"));

        let n = AcceptanceCheck::from_string("Output contains expected result");
        assert!(!n.is_cmd);
    }
}
