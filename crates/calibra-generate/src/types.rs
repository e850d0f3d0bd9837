//! Generation types and provider config API shapes.

use serde::{Deserialize, Serialize};

/// Built-in generation providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Groq,
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAI => "openai",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "groq" => Some(ProviderKind::Groq),
            "anthropic" => Some(ProviderKind::Anthropic),
            "openai" => Some(ProviderKind::OpenAI),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prompt handed to a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Provider config response (keys masked).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigResponse {
    pub provider_order: Vec<String>,
    pub groq_configured: bool,
    pub anthropic_configured: bool,
    pub openai_configured: bool,
    pub groq_model: String,
    pub anthropic_model: String,
    pub openai_model: String,
    pub temperature: f64,
    pub max_tokens: usize,
    /// Providers that will actually be tried, in order.
    pub active_providers: Vec<String>,
}

/// Provider config update request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUpdate {
    pub provider_order: Option<Vec<String>>,
    pub groq_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub openai_api_key: Option<String>,
    pub groq_model: Option<String>,
    pub anthropic_model: Option<String>,
    pub openai_model: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<usize>,
}
