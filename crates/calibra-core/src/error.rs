//! Error types for Calibra.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Metadata lookup failed: {0}")]
    MetadataLookup(String),

    #[error("All providers exhausted: {}", .attempts.join("; "))]
    AllProvidersExhausted { attempts: Vec<String> },

    #[error("Provider {provider} stalled for more than {timeout_ms}ms mid-stream")]
    MidStreamStall { provider: String, timeout_ms: u64 },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error can only happen after output reached the caller.
    pub fn is_mid_stream(&self) -> bool {
        matches!(self, Error::MidStreamStall { .. } | Error::Provider(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
