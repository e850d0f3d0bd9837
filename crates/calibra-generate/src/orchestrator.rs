//! Provider orchestrator: ordered failover until the first fragment arrives,
//! then commitment to a single backend for the rest of the request.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::providers::{build_backends, FragmentStream, GenerationBackend, StreamChunk};
use crate::types::Prompt;
use calibra_core::{Error, Result};

/// Selects and commits to a generation backend per request.
pub struct ProviderOrchestrator {
    backends: Vec<Arc<dyn GenerationBackend>>,
    fragment_timeout: Duration,
}

impl ProviderOrchestrator {
    /// Backends are tried in the order given.
    pub fn new(backends: Vec<Arc<dyn GenerationBackend>>, fragment_timeout: Duration) -> Self {
        Self {
            backends,
            fragment_timeout,
        }
    }

    pub fn from_config(client: &Client, config: &ProviderConfig, fragment_timeout: Duration) -> Self {
        Self::new(build_backends(client, config), fragment_timeout)
    }

    /// Identifiers of the backends in failover order.
    pub fn provider_ids(&self) -> Vec<String> {
        self.backends.iter().map(|b| b.id().to_string()).collect()
    }

    pub fn fragment_timeout(&self) -> Duration {
        self.fragment_timeout
    }

    fn candidates(&self, preferred: Option<&str>) -> Result<Vec<Arc<dyn GenerationBackend>>> {
        let pinned = preferred
            .map(str::trim)
            .filter(|p| !p.is_empty() && !p.eq_ignore_ascii_case("auto"));

        match pinned {
            None => Ok(self.backends.clone()),
            Some(id) => self
                .backends
                .iter()
                .find(|b| b.id().eq_ignore_ascii_case(id))
                .map(|b| vec![b.clone()])
                .ok_or_else(|| Error::InvalidRequest(format!("Provider '{}' is not configured", id))),
        }
    }

    /// Open a committed stream.
    ///
    /// Each candidate gets one fragment timeout to open and produce its first
    /// fragment. Errors, empty completions and timeouts advance to the next
    /// candidate; a pinned provider is the only candidate. Nothing has been
    /// emitted when this returns `AllProvidersExhausted`.
    pub async fn open(&self, prompt: &Prompt, preferred: Option<&str>) -> Result<CommittedStream> {
        let candidates = self.candidates(preferred)?;
        if candidates.is_empty() {
            return Err(Error::AllProvidersExhausted {
                attempts: vec!["no providers configured".to_string()],
            });
        }

        let mut attempts = Vec::with_capacity(candidates.len());

        for backend in candidates {
            let id = backend.id().to_string();
            debug!("Trying provider {}", id);

            match tokio::time::timeout(self.fragment_timeout, first_fragment(backend.as_ref(), prompt)).await {
                Ok(Ok((first, rest))) => {
                    info!("Committed to provider {}", id);
                    return Ok(CommittedStream {
                        provider: id,
                        pending_first: Some(first),
                        rest,
                        timeout: self.fragment_timeout,
                        finished: false,
                    });
                }
                Ok(Err(e)) => {
                    warn!("Provider {} failed before first fragment: {}", id, e);
                    attempts.push(format!("{}: {}", id, e));
                }
                Err(_) => {
                    warn!(
                        "Provider {} produced nothing within {}ms",
                        id,
                        self.fragment_timeout.as_millis()
                    );
                    attempts.push(format!("{}: timed out", id));
                }
            }
        }

        Err(Error::AllProvidersExhausted { attempts })
    }
}

async fn first_fragment(backend: &dyn GenerationBackend, prompt: &Prompt) -> Result<(String, FragmentStream)> {
    let mut stream = backend.open_stream(prompt).await?;
    while let Some(chunk) = stream.next().await {
        match chunk {
            StreamChunk::Fragment(text) if text.is_empty() => continue,
            StreamChunk::Fragment(text) => return Ok((text, stream)),
            StreamChunk::Done { .. } => break,
            StreamChunk::Error(e) => return Err(Error::Provider(e)),
        }
    }
    Err(Error::Provider("empty completion".to_string()))
}

/// The stream of the one backend a request committed to.
pub struct CommittedStream {
    provider: String,
    pending_first: Option<String>,
    rest: FragmentStream,
    timeout: Duration,
    finished: bool,
}

impl CommittedStream {
    /// Backend that produced the first fragment.
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Next fragment, `Ok(None)` at normal completion.
    ///
    /// A stall longer than the fragment timeout or a backend error is fatal;
    /// the stream yields nothing further afterwards.
    pub async fn next_fragment(&mut self) -> Result<Option<String>> {
        if let Some(first) = self.pending_first.take() {
            return Ok(Some(first));
        }
        if self.finished {
            return Ok(None);
        }

        loop {
            let chunk = match tokio::time::timeout(self.timeout, self.rest.next()).await {
                Ok(chunk) => chunk,
                Err(_) => {
                    self.finished = true;
                    return Err(Error::MidStreamStall {
                        provider: self.provider.clone(),
                        timeout_ms: self.timeout.as_millis() as u64,
                    });
                }
            };

            match chunk {
                Some(StreamChunk::Fragment(text)) if text.is_empty() => continue,
                Some(StreamChunk::Fragment(text)) => return Ok(Some(text)),
                Some(StreamChunk::Done { .. }) | None => {
                    self.finished = true;
                    return Ok(None);
                }
                Some(StreamChunk::Error(e)) => {
                    self.finished = true;
                    return Err(Error::Provider(format!("{}: {}", self.provider, e)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedBackend};

    fn prompt() -> Prompt {
        Prompt {
            system: "sys".into(),
            user: "Heat (1995)".into(),
        }
    }

    fn orchestrator(backends: Vec<Arc<ScriptedBackend>>, timeout_ms: u64) -> ProviderOrchestrator {
        let backends = backends
            .into_iter()
            .map(|b| b as Arc<dyn GenerationBackend>)
            .collect();
        ProviderOrchestrator::new(backends, Duration::from_millis(timeout_ms))
    }

    async fn drain(stream: &mut CommittedStream) -> Result<Vec<String>> {
        let mut out = Vec::new();
        while let Some(f) = stream.next_fragment().await? {
            out.push(f);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn test_silent_first_backend_fails_over() {
        let silent = Arc::new(ScriptedBackend::new("groq", Script::Silent));
        let second = Arc::new(ScriptedBackend::new("anthropic", Script::fragments(&["Hel", "lo"])));
        let orch = orchestrator(vec![silent.clone(), second.clone()], 50);

        let mut stream = orch.open(&prompt(), None).await.unwrap();
        assert_eq!(stream.provider(), "anthropic");
        assert_eq!(drain(&mut stream).await.unwrap(), vec!["Hel", "lo"]);
        assert_eq!(silent.calls(), 1);
        assert_eq!(second.calls(), 1);
    }

    #[tokio::test]
    async fn test_open_error_and_empty_completion_fail_over() {
        let broken = Arc::new(ScriptedBackend::new("groq", Script::FailOpen("401".into())));
        let empty = Arc::new(ScriptedBackend::new("anthropic", Script::Empty));
        let good = Arc::new(ScriptedBackend::new("openai", Script::fragments(&["ok"])));
        let orch = orchestrator(vec![broken, empty, good], 50);

        let mut stream = orch.open(&prompt(), None).await.unwrap();
        assert_eq!(stream.provider(), "openai");
        assert_eq!(drain(&mut stream).await.unwrap(), vec!["ok"]);
    }

    #[tokio::test]
    async fn test_pinned_provider_never_fails_over() {
        let silent = Arc::new(ScriptedBackend::new("groq", Script::Silent));
        let good = Arc::new(ScriptedBackend::new("anthropic", Script::fragments(&["x"])));
        let orch = orchestrator(vec![silent, good.clone()], 30);

        let err = orch.open(&prompt(), Some("groq")).await.err().unwrap();
        assert!(matches!(err, Error::AllProvidersExhausted { ref attempts } if attempts.len() == 1));
        assert_eq!(good.calls(), 0);

        let stream = orch.open(&prompt(), Some("Anthropic")).await.unwrap();
        assert_eq!(stream.provider(), "anthropic");
    }

    #[tokio::test]
    async fn test_auto_and_unknown_preference() {
        let good = Arc::new(ScriptedBackend::new("groq", Script::fragments(&["x"])));
        let orch = orchestrator(vec![good], 50);

        assert!(orch.open(&prompt(), Some("auto")).await.is_ok());
        let err = orch.open(&prompt(), Some("mistral")).await.err().unwrap();
        assert!(matches!(err, Error::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_mid_stream_stall_is_fatal() {
        let stalls = Arc::new(ScriptedBackend::new("groq", Script::StallAfter(vec!["partial".into()])));
        let backup = Arc::new(ScriptedBackend::new("anthropic", Script::fragments(&["never"])));
        let orch = orchestrator(vec![stalls, backup.clone()], 40);

        let mut stream = orch.open(&prompt(), None).await.unwrap();
        assert_eq!(stream.next_fragment().await.unwrap().as_deref(), Some("partial"));
        let err = stream.next_fragment().await.err().unwrap();
        assert!(matches!(err, Error::MidStreamStall { ref provider, .. } if provider == "groq"));
        assert!(stream.next_fragment().await.unwrap().is_none());
        assert_eq!(backup.calls(), 0);
    }

    #[tokio::test]
    async fn test_mid_stream_error_is_fatal() {
        let flaky = Arc::new(ScriptedBackend::new(
            "groq",
            Script::ErrorAfter(vec!["a".into()], "connection reset".into()),
        ));
        let orch = orchestrator(vec![flaky], 50);

        let mut stream = orch.open(&prompt(), None).await.unwrap();
        let err = drain(&mut stream).await.err().unwrap();
        assert!(err.is_mid_stream());
        assert!(err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_all_providers_exhausted() {
        let a = Arc::new(ScriptedBackend::new("groq", Script::ErrorChunk("overloaded".into())));
        let b = Arc::new(ScriptedBackend::new("anthropic", Script::Silent));
        let orch = orchestrator(vec![a, b], 30);

        match orch.open(&prompt(), None).await {
            Err(Error::AllProvidersExhausted { attempts }) => {
                assert_eq!(attempts.len(), 2);
                assert!(attempts[0].contains("overloaded"));
                assert!(attempts[1].contains("timed out"));
            }
            other => panic!("expected exhaustion, got {:?}", other.map(|s| s.provider().to_string())),
        }

        let none = ProviderOrchestrator::new(Vec::new(), Duration::from_millis(10));
        assert!(matches!(
            none.open(&prompt(), None).await,
            Err(Error::AllProvidersExhausted { .. })
        ));
    }
}
