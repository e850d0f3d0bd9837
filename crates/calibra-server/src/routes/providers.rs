//! Provider configuration routes.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;
use calibra_generate::ProviderConfigUpdate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/providers/config", get(get_config).put(update_config))
}

async fn get_config(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let config = state.provider_config.read();
    Json(config.to_response())
}

/// PUT /api/providers/config — merge, persist, and rebuild backends.
async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<ProviderConfigUpdate>,
) -> impl IntoResponse {
    let response = {
        let mut config = state.provider_config.write();
        config.apply_update(&update);

        if let Err(e) = config.save() {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": format!("Failed to save config: {}", e) })),
            );
        }
        config.to_response()
    };

    state.rebuild_orchestrator();

    match serde_json::to_value(response) {
        Ok(value) => (StatusCode::OK, Json(value)),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": e.to_string() })),
        ),
    }
}
