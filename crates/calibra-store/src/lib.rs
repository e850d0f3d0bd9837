//! Calibra Store — SQLite persistence for calibration cards.

pub mod schema;
pub mod sqlite;
pub mod types;

pub use sqlite::SqliteStore;
pub use types::*;
