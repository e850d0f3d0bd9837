//! Text generation for calibration cards.
//!
//! Interchangeable streaming backends (Groq, Anthropic, OpenAI), the provider
//! config they are built from, and the orchestrator that fails over between
//! them until one produces its first fragment.

pub mod config;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod types;

pub use config::{ProviderConfig, ResolvedProvider, DEFAULT_PROVIDER_ORDER};
pub use orchestrator::{CommittedStream, ProviderOrchestrator};
pub use prompt::{build_prompt, PromptSubject};
pub use providers::{build_backends, FragmentStream, GenerationBackend, StreamChunk};
pub use types::{Prompt, ProviderConfigResponse, ProviderConfigUpdate, ProviderKind};
