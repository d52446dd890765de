use rampup_core::{Config, Error, Result};
use std::time::Duration;

use crate::{OpenAIProvider, Provider};

fn default_api_base(provider_name: &str) -> &'static str {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1",
        "openai" => "https://api.openai.com/v1",
        "deepseek" => "https://api.deepseek.com/v1",
        "ollama" => "http://localhost:11434/v1",
        _ => "https://api.openai.com/v1",
    }
}

fn default_model(provider_name: &str) -> &'static str {
    match provider_name {
        "openrouter" => "openai/gpt-4o-mini",
        "deepseek" => "deepseek-chat",
        "ollama" => "llama3.1",
        _ => "gpt-4o-mini",
    }
}

/// Create a provider from the first configured entry, or None when no
/// provider is configured. The engine stays usable without a model: the
/// router degrades to rule-only mode and the fallback capability answers
/// extractively from evidence.
pub fn create_provider(config: &Config, timeout: Duration) -> Option<Box<dyn Provider>> {
    let (name, provider_cfg) = config.get_api_key()?;
    let api_base = provider_cfg
        .api_base
        .as_deref()
        .unwrap_or_else(|| default_api_base(name));
    let model = provider_cfg
        .model
        .as_deref()
        .unwrap_or_else(|| default_model(name));

    Some(Box::new(OpenAIProvider::new(
        &provider_cfg.api_key,
        Some(api_base),
        model,
        1024,
        0.3,
        timeout,
    )))
}

/// Like `create_provider`, but an error when the config has no provider.
pub fn require_provider(config: &Config, timeout: Duration) -> Result<Box<dyn Provider>> {
    create_provider(config, timeout)
        .ok_or_else(|| Error::Config("No provider configured; run `rampup init`".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rampup_core::config::ProviderConfig;

    #[test]
    fn test_no_provider_configured() {
        let config = Config::default();
        assert!(create_provider(&config, Duration::from_secs(5)).is_none());
    }

    #[test]
    fn test_configured_provider_found() {
        let mut config = Config::default();
        config.providers.insert(
            "openai".to_string(),
            ProviderConfig {
                api_key: "sk-test".to_string(),
                api_base: None,
                model: None,
            },
        );
        assert!(create_provider(&config, Duration::from_secs(5)).is_some());
    }
}
