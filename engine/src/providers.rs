use std::sync::Arc;

use anyhow::{bail, Result};
use noscope_providers::{AnthropicProvider, OpenAiCompatibleProvider, Provider};

use crate::config::Settings;

/// Default model per provider, mirroring the source's
/// `_default_model_for_provider`.
pub fn default_model_for(provider_id: &str) -> &'static str {
    match provider_id {
        "openai" => "gpt-4o",
        _ => "claude-sonnet-4-20250514",
    }
}

/// Resolve the single provider this run uses: `--provider` wins, then the
/// configured default, then whichever credential is present (Anthropic
/// preferred). `--model` overrides the provider's own default model.
pub fn build_provider(
    settings: &Settings,
    provider_flag: Option<&str>,
    model_flag: Option<&str>,
) -> Result<Arc<dyn Provider>> {
    let provider_id = provider_flag
        .map(str::to_string)
        .or_else(|| settings.default_provider.clone())
        .unwrap_or_else(|| {
            if settings.anthropic_api_key.is_some() { "anthropic".to_string() } else { "openai".to_string() }
        });

    let model = model_flag
        .map(str::to_string)
        .or_else(|| settings.default_model.clone())
        .or_else(|| Some(default_model_for(&provider_id).to_string()));

    match provider_id.as_str() {
        "anthropic" => {
            let Some(key) = &settings.anthropic_api_key else {
                bail!("Provider 'anthropic' selected but ANTHROPIC_API_KEY is not set");
            };
            Ok(Arc::new(AnthropicProvider::new(key.clone(), model)))
        }
        "openai" => {
            let Some(key) = &settings.openai_api_key else {
                bail!("Provider 'openai' selected but OPENAI_API_KEY is not set");
            };
            Ok(Arc::new(OpenAiCompatibleProvider::new(
                "openai",
                "OpenAI",
                "https://api.openai.com/v1",
                Some(key.clone()),
                model,
            )))
        }
        other => bail!("Unknown provider '{other}'"),
    }
}
