//! Generation runtime — coordinates catalog, backends, extraction and storage.
//!
//! `Pipeline::begin` either returns a cached card or commits to a backend and
//! hands back a live event stream. Post-processing (extraction, resolution,
//! persistence) runs inside that stream once the backend completes.

pub mod inflight;
pub mod pipeline;
pub mod types;

pub use inflight::InFlightLocks;
pub use pipeline::Pipeline;
pub use types::{
    EventStream, Generation, GenerationEvent, GenerationMeta, GenerationResult, LiveGeneration,
};
