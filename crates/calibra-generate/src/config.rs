//! Provider configuration persistence and failover ordering.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::types::{ProviderConfigResponse, ProviderConfigUpdate, ProviderKind};

pub const DEFAULT_GROQ_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_ANTHROPIC_MODEL: &str = "claude-sonnet-4-20250514";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

/// Fast first, quality fallback.
pub const DEFAULT_PROVIDER_ORDER: &[ProviderKind] =
    &[ProviderKind::Groq, ProviderKind::Anthropic, ProviderKind::OpenAI];

/// Stored provider configuration (persisted to provider-config.json).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_order")]
    pub provider_order: Vec<ProviderKind>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Path to config file for saving.
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_order() -> Vec<ProviderKind> {
    DEFAULT_PROVIDER_ORDER.to_vec()
}
fn default_groq_model() -> String {
    DEFAULT_GROQ_MODEL.into()
}
fn default_anthropic_model() -> String {
    DEFAULT_ANTHROPIC_MODEL.into()
}
fn default_openai_model() -> String {
    DEFAULT_OPENAI_MODEL.into()
}
fn default_temperature() -> f64 {
    0.8
}
fn default_max_tokens() -> usize {
    1200
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_order: default_order(),
            groq_api_key: None,
            anthropic_api_key: None,
            openai_api_key: None,
            groq_model: default_groq_model(),
            anthropic_model: default_anthropic_model(),
            openai_model: default_openai_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            config_path: PathBuf::new(),
        }
    }
}

/// A configured provider ready to be turned into a backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub kind: ProviderKind,
    pub model: String,
    pub api_key: String,
}

impl ProviderConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: ProviderConfig = match std::fs::read_to_string(config_path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring unreadable {}: {}", config_path.display(), e);
                ProviderConfig::default()
            }),
            Err(_) => ProviderConfig::default(),
        };

        config.config_path = config_path.to_path_buf();

        // Env vars as fallback for API keys
        if config.groq_api_key.is_none() {
            config.groq_api_key = non_empty_env("GROQ_API_KEY");
        }
        if config.anthropic_api_key.is_none() {
            config.anthropic_api_key = non_empty_env("ANTHROPIC_API_KEY");
        }
        if config.openai_api_key.is_none() {
            config.openai_api_key = non_empty_env("OPENAI_API_KEY");
        }

        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(&self.config_path, json)?;
        info!("Saved provider config to {}", self.config_path.display());
        Ok(())
    }

    /// Apply an update, merging with existing config. Unknown provider names are ignored.
    pub fn apply_update(&mut self, update: &ProviderConfigUpdate) {
        if let Some(order) = &update.provider_order {
            let mut parsed: Vec<ProviderKind> = Vec::new();
            for kind in order.iter().filter_map(|s| ProviderKind::parse(s)) {
                if !parsed.contains(&kind) {
                    parsed.push(kind);
                }
            }
            self.provider_order = parsed;
        }
        if let Some(k) = &update.groq_api_key {
            self.groq_api_key = Some(k.clone()).filter(|k| !k.is_empty());
        }
        if let Some(k) = &update.anthropic_api_key {
            self.anthropic_api_key = Some(k.clone()).filter(|k| !k.is_empty());
        }
        if let Some(k) = &update.openai_api_key {
            self.openai_api_key = Some(k.clone()).filter(|k| !k.is_empty());
        }
        if let Some(m) = &update.groq_model {
            self.groq_model = m.clone();
        }
        if let Some(m) = &update.anthropic_model {
            self.anthropic_model = m.clone();
        }
        if let Some(m) = &update.openai_model {
            self.openai_model = m.clone();
        }
        if let Some(t) = update.temperature {
            self.temperature = t.clamp(0.0, 2.0);
        }
        if let Some(n) = update.max_tokens {
            self.max_tokens = n.max(1);
        }
    }

    fn credentials(&self, kind: ProviderKind) -> Option<(&String, &String)> {
        match kind {
            ProviderKind::Groq => self.groq_api_key.as_ref().map(|k| (&self.groq_model, k)),
            ProviderKind::Anthropic => self
                .anthropic_api_key
                .as_ref()
                .map(|k| (&self.anthropic_model, k)),
            ProviderKind::OpenAI => self.openai_api_key.as_ref().map(|k| (&self.openai_model, k)),
        }
    }

    /// Configured providers in failover order.
    pub fn resolve_order(&self) -> Vec<ResolvedProvider> {
        self.provider_order
            .iter()
            .filter_map(|&kind| {
                self.credentials(kind).map(|(model, key)| ResolvedProvider {
                    kind,
                    model: model.clone(),
                    api_key: key.clone(),
                })
            })
            .collect()
    }

    /// Build the public config response (no API keys exposed).
    pub fn to_response(&self) -> ProviderConfigResponse {
        ProviderConfigResponse {
            provider_order: self.provider_order.iter().map(|k| k.to_string()).collect(),
            groq_configured: self.groq_api_key.is_some(),
            anthropic_configured: self.anthropic_api_key.is_some(),
            openai_configured: self.openai_api_key.is_some(),
            groq_model: self.groq_model.clone(),
            anthropic_model: self.anthropic_model.clone(),
            openai_model: self.openai_model.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            active_providers: self
                .resolve_order()
                .into_iter()
                .map(|p| p.kind.to_string())
                .collect(),
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> ProviderConfig {
        ProviderConfig {
            groq_api_key: Some("gsk".into()),
            anthropic_api_key: Some("sk-ant".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_order_skips_unconfigured() {
        let order: Vec<ProviderKind> = keyed().resolve_order().iter().map(|p| p.kind).collect();
        assert_eq!(order, vec![ProviderKind::Groq, ProviderKind::Anthropic]);
    }

    #[test]
    fn test_update_reorders_and_dedups() {
        let mut config = keyed();
        config.apply_update(&ProviderConfigUpdate {
            provider_order: Some(vec!["anthropic".into(), "bogus".into(), "groq".into(), "anthropic".into()]),
            anthropic_model: Some("claude-3-5-haiku-20241022".into()),
            ..Default::default()
        });
        let resolved = config.resolve_order();
        assert_eq!(resolved[0].kind, ProviderKind::Anthropic);
        assert_eq!(resolved[0].model, "claude-3-5-haiku-20241022");
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_empty_key_clears_provider() {
        let mut config = keyed();
        config.apply_update(&ProviderConfigUpdate {
            groq_api_key: Some(String::new()),
            ..Default::default()
        });
        assert!(config.groq_api_key.is_none());
        assert_eq!(config.to_response().active_providers, vec!["anthropic"]);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provider-config.json");

        let mut config = keyed();
        config.config_path = path.clone();
        config.temperature = 0.4;
        config.save().unwrap();

        let loaded = ProviderConfig::load(&path);
        assert_eq!(loaded.groq_api_key.as_deref(), Some("gsk"));
        assert_eq!(loaded.temperature, 0.4);
        assert_eq!(loaded.provider_order, DEFAULT_PROVIDER_ORDER.to_vec());
    }

    #[test]
    fn test_response_masks_keys() {
        let json = serde_json::to_value(keyed().to_response()).unwrap();
        assert_eq!(json["groqConfigured"], true);
        assert_eq!(json["openaiConfigured"], false);
        assert!(!json.to_string().contains("sk-ant"));
    }
}
