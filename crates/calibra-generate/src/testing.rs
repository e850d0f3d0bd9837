//! In-memory backends for exercising the orchestrator and pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::providers::{FragmentStream, GenerationBackend, StreamChunk};
use crate::types::Prompt;
use calibra_core::{Error, Result};

/// What a scripted backend does when opened.
#[derive(Debug, Clone)]
pub enum Script {
    /// Emit these fragments, then complete.
    Fragments(Vec<String>),
    /// Fail to open.
    FailOpen(String),
    /// Open, then never emit anything.
    Silent,
    /// Open and complete without a fragment.
    Empty,
    /// Open and emit an error chunk first.
    ErrorChunk(String),
    /// Emit these fragments, then hang.
    StallAfter(Vec<String>),
    /// Emit these fragments, then an error chunk.
    ErrorAfter(Vec<String>, String),
}

impl Script {
    pub fn fragments(parts: &[&str]) -> Self {
        Script::Fragments(parts.iter().map(|s| s.to_string()).collect())
    }
}

pub struct ScriptedBackend {
    id: String,
    script: Script,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(id: &str, script: Script) -> Self {
        Self {
            id: id.to_string(),
            script,
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    /// Sleep this long before every fragment after the first.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of times `open_stream` was called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn open_stream(&self, _prompt: &Prompt) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let (parts, tail) = match self.script.clone() {
            Script::FailOpen(msg) => return Err(Error::Provider(msg)),
            Script::Fragments(parts) => (parts, Tail::Done),
            Script::Silent => (Vec::new(), Tail::Hang),
            Script::Empty => (Vec::new(), Tail::Done),
            Script::ErrorChunk(msg) => (Vec::new(), Tail::Error(msg)),
            Script::StallAfter(parts) => (parts, Tail::Hang),
            Script::ErrorAfter(parts, msg) => (parts, Tail::Error(msg)),
        };
        let delay = self.delay;

        Ok(Box::pin(async_stream::stream! {
            let total = parts.len();
            for (i, part) in parts.into_iter().enumerate() {
                if i > 0 && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield StreamChunk::Fragment(part);
            }
            match tail {
                Tail::Done => yield StreamChunk::Done { fragments: total },
                Tail::Error(msg) => yield StreamChunk::Error(msg),
                Tail::Hang => futures::future::pending::<()>().await,
            }
        }))
    }
}

enum Tail {
    Done,
    Hang,
    Error(String),
}
