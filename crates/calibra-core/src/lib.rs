//! Calibra Core — shared card types, slugs, configuration, errors.

pub mod config;
pub mod error;
pub mod slug;
pub mod types;

pub use config::{CalibraConfig, DataPaths};
pub use error::{Error, Result};
pub use slug::slugify;
pub use types::*;
