//! Generation backends.
//!
//! Every backend implements `GenerationBackend`: opening a stream performs the
//! HTTP request and status check, then hands back a lazy stream of chunks
//! parsed from the provider's SSE body. OpenAI and Groq share one wire format;
//! Anthropic uses its own.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client;
use serde_json::json;
use tokio_stream::StreamExt;
use tracing::{debug, error};

use crate::config::{ProviderConfig, ResolvedProvider};
use crate::types::{ProviderKind, Prompt};
use calibra_core::{Error, Result};

const OPENAI_URL: &str = "https://api.openai.com/v1/chat/completions";
const GROQ_URL: &str = "https://api.groq.com/openai/v1/chat/completions";
const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";

/// Boxed stream type for returning different stream implementations.
pub type FragmentStream = Pin<Box<dyn Stream<Item = StreamChunk> + Send>>;

/// A single streamed fragment, completion marker, or error.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    Fragment(String),
    Done { fragments: usize },
    Error(String),
}

/// One interchangeable text-generation backend.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Stable identifier recorded as the card's provider.
    fn id(&self) -> &str;

    /// Start generating. Errors here mean the backend never started streaming.
    async fn open_stream(&self, prompt: &Prompt) -> Result<FragmentStream>;
}

/// Sampling parameters shared by the HTTP backends.
#[derive(Debug, Clone, Copy)]
pub struct Sampling {
    pub temperature: f64,
    pub max_tokens: usize,
}

/// Build backends for every configured provider, in failover order.
pub fn build_backends(client: &Client, config: &ProviderConfig) -> Vec<Arc<dyn GenerationBackend>> {
    let sampling = Sampling {
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    };
    config
        .resolve_order()
        .into_iter()
        .map(|p| backend_for(client, p, sampling))
        .collect()
}

fn backend_for(client: &Client, provider: ResolvedProvider, sampling: Sampling) -> Arc<dyn GenerationBackend> {
    match provider.kind {
        ProviderKind::Groq => Arc::new(OpenAiCompatBackend {
            kind: ProviderKind::Groq,
            url: GROQ_URL.to_string(),
            client: client.clone(),
            model: provider.model,
            api_key: provider.api_key,
            sampling,
        }),
        ProviderKind::OpenAI => Arc::new(OpenAiCompatBackend {
            kind: ProviderKind::OpenAI,
            url: OPENAI_URL.to_string(),
            client: client.clone(),
            model: provider.model,
            api_key: provider.api_key,
            sampling,
        }),
        ProviderKind::Anthropic => Arc::new(AnthropicBackend {
            client: client.clone(),
            model: provider.model,
            api_key: provider.api_key,
            sampling,
        }),
    }
}

// ---------------------------------------------------------------
// OpenAI-compatible (OpenAI, Groq)
// ---------------------------------------------------------------

pub struct OpenAiCompatBackend {
    kind: ProviderKind,
    url: String,
    client: Client,
    model: String,
    api_key: String,
    sampling: Sampling,
}

#[async_trait]
impl GenerationBackend for OpenAiCompatBackend {
    fn id(&self) -> &str {
        self.kind.as_str()
    }

    async fn open_stream(&self, prompt: &Prompt) -> Result<FragmentStream> {
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user},
            ],
            "temperature": self.sampling.temperature,
            "max_tokens": self.sampling.max_tokens,
            "stream": true,
        });

        debug!("Streaming from {} with model {}", self.url, self.model);

        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("{} request failed: {}", self.kind, e)))?;

        let response = check_status(self.kind, response).await?;
        Ok(Box::pin(sse_chunks(response, parse_openai_event)))
    }
}

/// Interpret one `data:` payload from an OpenAI-compatible stream.
pub fn parse_openai_event(data: &str) -> Option<StreamChunk> {
    if data.trim() == "[DONE]" {
        return Some(StreamChunk::Done { fragments: 0 });
    }
    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;
    if let Some(msg) = parsed["error"]["message"].as_str() {
        return Some(StreamChunk::Error(msg.to_string()));
    }
    parsed["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|c| !c.is_empty())
        .map(|c| StreamChunk::Fragment(c.to_string()))
}

// ---------------------------------------------------------------
// Anthropic Messages API
// ---------------------------------------------------------------

pub struct AnthropicBackend {
    client: Client,
    model: String,
    api_key: String,
    sampling: Sampling,
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn id(&self) -> &str {
        ProviderKind::Anthropic.as_str()
    }

    async fn open_stream(&self, prompt: &Prompt) -> Result<FragmentStream> {
        let body = json!({
            "model": self.model,
            "system": prompt.system,
            "messages": [{"role": "user", "content": prompt.user}],
            "temperature": self.sampling.temperature,
            "max_tokens": self.sampling.max_tokens,
            "stream": true,
        });

        debug!("Streaming from Anthropic with model {}", self.model);

        let response = self
            .client
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Provider(format!("anthropic request failed: {}", e)))?;

        let response = check_status(ProviderKind::Anthropic, response).await?;
        Ok(Box::pin(sse_chunks(response, parse_anthropic_event)))
    }
}

/// Interpret one `data:` payload from Anthropic's event stream.
pub fn parse_anthropic_event(data: &str) -> Option<StreamChunk> {
    let parsed: serde_json::Value = serde_json::from_str(data).ok()?;
    match parsed["type"].as_str() {
        Some("content_block_delta") => parsed["delta"]["text"]
            .as_str()
            .filter(|t| !t.is_empty())
            .map(|t| StreamChunk::Fragment(t.to_string())),
        Some("message_stop") => Some(StreamChunk::Done { fragments: 0 }),
        Some("error") => {
            let msg = parsed["error"]["message"].as_str().unwrap_or("Unknown error");
            error!("Anthropic error: {}", msg);
            Some(StreamChunk::Error(msg.to_string()))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------
// Shared SSE plumbing
// ---------------------------------------------------------------

async fn check_status(kind: ProviderKind, response: reqwest::Response) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(Error::Provider(format!("{} API error {}: {}", kind, status, body)))
}

/// Turn an SSE response body into chunks using a per-provider payload parser.
fn sse_chunks(
    response: reqwest::Response,
    parse: fn(&str) -> Option<StreamChunk>,
) -> impl Stream<Item = StreamChunk> + Send + 'static {
    async_stream::stream! {
        let mut stream = response.bytes_stream();
        let mut lines = SseLineBuffer::default();
        let mut fragments = 0usize;

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    yield StreamChunk::Error(format!("Stream read error: {}", e));
                    return;
                }
            };

            for data in lines.push(&bytes) {
                match parse(&data) {
                    Some(StreamChunk::Fragment(text)) => {
                        fragments += 1;
                        yield StreamChunk::Fragment(text);
                    }
                    Some(StreamChunk::Done { .. }) => {
                        yield StreamChunk::Done { fragments };
                        return;
                    }
                    Some(StreamChunk::Error(e)) => {
                        yield StreamChunk::Error(e);
                        return;
                    }
                    None => {}
                }
            }
        }

        yield StreamChunk::Done { fragments };
    }
}

/// Splits an SSE byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line arrives so multi-byte UTF-8 sequences
/// split across network chunks decode correctly.
#[derive(Default)]
pub struct SseLineBuffer {
    pending: Vec<u8>,
}

impl SseLineBuffer {
    /// Feed bytes; returns the payloads of every completed `data:` line.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut payloads = Vec::new();

        while let Some(line_end) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();

            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim_start().to_string());
            }
        }

        payloads
    }
}
