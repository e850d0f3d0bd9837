//! Health and server info.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(health))
}

/// GET /api/health
async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let stats = state.store.get_stats().ok();

    Json(serde_json::json!({
        "status": if stats.is_some() { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "providers": state.pipeline.orchestrator().provider_ids(),
        "fragmentTimeoutMs": state.config.fragment_timeout_ms,
        "catalogConfigured": state.config.catalog_api_key.is_some(),
        "cards": stats.as_ref().map(|s| s.total_cards),
        "cardsWithSentence": stats.as_ref().map(|s| s.cards_with_sentence),
        "dbSizeMb": stats.as_ref().map(|s| s.db_size_mb),
    }))
}
