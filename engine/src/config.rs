use std::collections::HashMap;

use anyhow::{bail, Result};

/// Resolved engine configuration: provider credentials and defaults.
///
/// Credentials accept both a `NOSCOPE_`-prefixed and a bare environment
/// variable per provider (`NOSCOPE_ANTHROPIC_API_KEY` falls back to
/// `ANTHROPIC_API_KEY`). An optional `.env` file in the working directory
/// is loaded first, so it can seed either form without overriding
/// variables already present in the process environment.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub default_timebox: String,
    pub danger_mode: bool,
}

fn env_or_prefixed(prefixed: &str, bare: &str) -> Option<String> {
    std::env::var(prefixed).ok().filter(|s| !s.is_empty()).or_else(|| {
        std::env::var(bare).ok().filter(|s| !s.is_empty())
    })
}

pub struct SettingsOverrides {
    pub default_provider: Option<String>,
    pub default_model: Option<String>,
    pub danger_mode: Option<bool>,
}

/// Load settings from the environment (dotfile first, then process env),
/// applying CLI overrides on top. Fails if neither provider key is set —
/// a configuration error, which must surface before a run directory is
/// created.
pub fn load_settings(overrides: SettingsOverrides) -> Result<Settings> {
    let _ = dotenvy::dotenv();

    let anthropic_api_key = env_or_prefixed("NOSCOPE_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY");
    let openai_api_key = env_or_prefixed("NOSCOPE_OPENAI_API_KEY", "OPENAI_API_KEY");

    if anthropic_api_key.is_none() && openai_api_key.is_none() {
        bail!(
            "No provider credentials found. Set ANTHROPIC_API_KEY or OPENAI_API_KEY \
             (or their NOSCOPE_-prefixed equivalents)."
        );
    }

    let default_timebox =
        std::env::var("NOSCOPE_DEFAULT_TIMEBOX").ok().filter(|s| !s.is_empty()).unwrap_or_else(|| "30m".to_string());
    let danger_mode = overrides.danger_mode.unwrap_or_else(|| {
        std::env::var("NOSCOPE_DANGER_MODE").map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
    });

    Ok(Settings {
        anthropic_api_key,
        openai_api_key,
        default_provider: overrides.default_provider,
        default_model: overrides.default_model,
        default_timebox,
        danger_mode,
    })
}

/// Build the secrets map registered into the Tool Context, so the
/// redactor can mask these values wherever they surface in tool output.
pub fn runtime_secrets(settings: &Settings) -> HashMap<String, String> {
    let mut secrets = HashMap::new();
    if let Some(k) = &settings.anthropic_api_key {
        secrets.insert("ANTHROPIC_API_KEY".to_string(), k.clone());
    }
    if let Some(k) = &settings.openai_api_key {
        secrets.insert("OPENAI_API_KEY".to_string(), k.clone());
    }
    secrets
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn prefixed_key_wins_over_bare() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::set_var("NOSCOPE_ANTHROPIC_API_KEY", "prefixed");
        std::env::set_var("ANTHROPIC_API_KEY", "bare");
        assert_eq!(env_or_prefixed("NOSCOPE_ANTHROPIC_API_KEY", "ANTHROPIC_API_KEY").as_deref(), Some("prefixed"));
        std::env::remove_var("NOSCOPE_ANTHROPIC_API_KEY");
        std::env::remove_var("ANTHROPIC_API_KEY");
    }

    #[test]
    fn falls_back_to_bare_key() {
        let _guard = ENV_LOCK.lock().unwrap();
        std::env::remove_var("NOSCOPE_OPENAI_API_KEY");
        std::env::set_var("OPENAI_API_KEY", "bare-only");
        assert_eq!(env_or_prefixed("NOSCOPE_OPENAI_API_KEY", "OPENAI_API_KEY").as_deref(), Some("bare-only"));
        std::env::remove_var("OPENAI_API_KEY");
    }
}
