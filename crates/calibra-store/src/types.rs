//! Store-level types.

use serde::{Deserialize, Serialize};

/// Store-level statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub total_cards: i64,
    pub cards_with_sentence: i64,
    pub total_postings: i64,
    pub db_path: String,
    pub db_size_mb: f64,
}
