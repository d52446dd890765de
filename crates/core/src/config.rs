use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;
use crate::paths::Paths;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_base: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouterConfig {
    /// τ: below this rule-pass confidence the model classifier is consulted.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// ε: tags within this window of the top score are all dispatched.
    #[serde(default = "default_tie_epsilon")]
    pub tie_epsilon: f64,
    #[serde(default = "default_use_model_fallback")]
    pub use_model_fallback: bool,
}

fn default_confidence_threshold() -> f64 {
    0.55
}

fn default_tie_epsilon() -> f64 {
    0.05
}

fn default_use_model_fallback() -> bool {
    true
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            tie_epsilon: default_tie_epsilon(),
            use_model_fallback: default_use_model_fallback(),
        }
    }
}

/// Readiness-gap policy: whether a missing/low readiness score appends a
/// "schedule assessment" follow-up action. Never forces dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessPolicy {
    Off,
    #[default]
    Suggest,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Per agent-call timeout; keeps a conversational turn under a few seconds.
    #[serde(default = "default_agent_timeout_secs")]
    pub agent_timeout_secs: u64,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Evidence budget per turn.
    #[serde(default = "default_evidence_top_k")]
    pub evidence_top_k: usize,
    /// Voice transcripts below this confidence get a clarification reply.
    #[serde(default = "default_transcript_confidence_floor")]
    pub transcript_confidence_floor: f64,
    #[serde(default)]
    pub readiness_policy: ReadinessPolicy,
    /// Scores below this floor count as a readiness gap.
    #[serde(default = "default_readiness_floor")]
    pub readiness_floor: u8,
}

fn default_agent_timeout_secs() -> u64 {
    8
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_evidence_top_k() -> usize {
    3
}

fn default_transcript_confidence_floor() -> f64 {
    0.5
}

fn default_readiness_floor() -> u8 {
    40
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            agent_timeout_secs: default_agent_timeout_secs(),
            retry_delay_ms: default_retry_delay_ms(),
            evidence_top_k: default_evidence_top_k(),
            transcript_confidence_floor: default_transcript_confidence_floor(),
            readiness_policy: ReadinessPolicy::default(),
            readiness_floor: default_readiness_floor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionsConfig {
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_idle_timeout_secs() -> u64 {
    1800
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyConfig {
    #[serde(default = "default_company_name")]
    pub name: String,
    #[serde(default = "default_assistant_name")]
    pub assistant_name: String,
}

fn default_company_name() -> String {
    "Company".to_string()
}

fn default_assistant_name() -> String {
    "Onboarding Assistant".to_string()
}

impl Default for CompanyConfig {
    fn default() -> Self {
        Self {
            name: default_company_name(),
            assistant_name: default_assistant_name(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    #[serde(default)]
    pub router: RouterConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub company: CompanyConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(paths: &Paths) -> Result<Self> {
        let config_path = paths.config_file();
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// First configured provider by priority order.
    pub fn get_api_key(&self) -> Option<(&str, &ProviderConfig)> {
        let priority = ["openrouter", "openai", "deepseek", "ollama"];

        for name in priority {
            if let Some(provider) = self.providers.get(name) {
                if !provider.api_key.is_empty() {
                    return Some((name, provider));
                }
            }
        }
        None
    }

    pub fn get_provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.router.confidence_threshold, 0.55);
        assert_eq!(cfg.router.tie_epsilon, 0.05);
        assert_eq!(cfg.orchestrator.evidence_top_k, 3);
        assert_eq!(cfg.orchestrator.readiness_policy, ReadinessPolicy::Suggest);
        assert_eq!(cfg.sessions.idle_timeout_secs, 1800);
    }

    #[test]
    fn test_partial_config_parses_with_defaults() {
        let raw = r#"{
  "router": { "tieEpsilon": 0.1 },
  "company": { "name": "Acme" }
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.router.tie_epsilon, 0.1);
        assert_eq!(cfg.router.confidence_threshold, 0.55);
        assert_eq!(cfg.company.name, "Acme");
        assert_eq!(cfg.company.assistant_name, "Onboarding Assistant");
    }

    #[test]
    fn test_provider_priority() {
        let mut cfg = Config::default();
        cfg.providers.insert(
            "ollama".to_string(),
            ProviderConfig {
                api_key: "ollama".to_string(),
                api_base: Some("http://localhost:11434/v1".to_string()),
                model: None,
            },
        );
        cfg.providers.insert(
            "openai".to_string(),
            ProviderConfig {
                api_key: "sk-test".to_string(),
                api_base: None,
                model: None,
            },
        );
        let (name, _) = cfg.get_api_key().unwrap();
        assert_eq!(name, "openai");
    }
}
