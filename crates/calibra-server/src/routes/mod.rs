//! HTTP route handlers.

pub mod admin;
pub mod cards;
pub mod health;
pub mod providers;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use calibra_core::Error;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(cards::routes())
        .merge(admin::routes())
        .merge(providers::routes())
}

/// Map a pipeline error to a status code and JSON body.
pub fn error_response(e: &Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match e {
        Error::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::AllProvidersExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
        Error::MetadataLookup(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let mut body = serde_json::json!({ "error": e.to_string() });
    if let Error::AllProvidersExhausted { attempts } = e {
        body["attempts"] = serde_json::json!(attempts);
    }
    (status, Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(error_response(&Error::InvalidRequest("x".into())).0, StatusCode::BAD_REQUEST);
        assert_eq!(error_response(&Error::MetadataLookup("x".into())).0, StatusCode::BAD_GATEWAY);
        assert_eq!(error_response(&Error::Database("x".into())).0, StatusCode::INTERNAL_SERVER_ERROR);

        let (status, Json(body)) = error_response(&Error::AllProvidersExhausted {
            attempts: vec!["groq: timed out".into()],
        });
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["attempts"][0], "groq: timed out");
    }
}
