//! Administrative routes — narrow card mutations.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use super::error_response;
use crate::state::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/calibration-sentence", post(override_sentence))
        .route("/admin/cards/{card_id}/posted", post(record_posting))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SentenceOverride {
    card_id: i64,
    /// Stored verbatim; `null` clears it.
    calibration_sentence: Option<String>,
}

/// POST /api/admin/calibration-sentence
async fn override_sentence(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SentenceOverride>,
) -> Response {
    match state
        .store
        .set_calibration_sentence(req.card_id, req.calibration_sentence.as_deref())
    {
        Ok(Some(card)) => {
            info!("Calibration sentence overridden for card {}", card.id);
            Json(card).into_response()
        }
        Ok(None) => not_found(req.card_id),
        Err(e) => error_response(&e).into_response(),
    }
}

#[derive(Debug, Deserialize)]
struct PostingRecord {
    channel: String,
}

/// POST /api/admin/cards/{cardId}/posted
async fn record_posting(
    State(state): State<Arc<AppState>>,
    Path(card_id): Path<i64>,
    Json(req): Json<PostingRecord>,
) -> Response {
    let channel = req.channel.trim();
    if channel.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "channel is required" })),
        )
            .into_response();
    }

    match state.store.record_posting(card_id, channel) {
        Ok(true) => match state.store.get_by_id(card_id) {
            Ok(Some(card)) => Json(serde_json::json!({
                "cardId": card.id,
                "lastPostedAt": card.last_posted_at,
            }))
            .into_response(),
            Ok(None) => not_found(card_id),
            Err(e) => error_response(&e).into_response(),
        },
        Ok(false) => not_found(card_id),
        Err(e) => error_response(&e).into_response(),
    }
}

fn not_found(card_id: i64) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": format!("Card {} not found", card_id) })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use crate::routes::build_router;
    use crate::state::test_state;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use calibra_core::{MediaType, NewCard};
    use calibra_generate::testing::Script;
    use tower::ServiceExt;

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn card() -> NewCard {
        NewCard {
            external_id: "tv:1396".into(),
            title: "Breaking Bad".into(),
            year: Some(2008),
            media_type: MediaType::Series,
            poster_ref: None,
            genres: Vec::new(),
            slug: "breaking-bad-2008".into(),
            body_text: "If The Wire felt patient, this feels feverish.".into(),
            calibration_sentence: Some("If The Wire felt patient, this feels feverish.".into()),
            comparisons: Vec::new(),
            provider: "anthropic".into(),
        }
    }

    #[tokio::test]
    async fn test_sentence_override_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, Script::Empty);
        let id = state.store.upsert_card(&card()).unwrap().id;
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(post_json(
                "/api/admin/calibration-sentence",
                serde_json::json!({ "cardId": id, "calibrationSentence": "  hand written  " }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["calibrationSentence"], "  hand written  ");

        app.clone()
            .oneshot(post_json(
                "/api/admin/calibration-sentence",
                serde_json::json!({ "cardId": id, "calibrationSentence": null }),
            ))
            .await
            .unwrap();
        let stored = state.store.get_by_id(id).unwrap().unwrap();
        assert!(stored.calibration_sentence.is_none());
        assert_eq!(stored.body_text, card().body_text);

        let missing = app
            .oneshot(post_json(
                "/api/admin/calibration-sentence",
                serde_json::json!({ "cardId": id + 100, "calibrationSentence": "x" }),
            ))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_record_posting() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, Script::Empty);
        let id = state.store.upsert_card(&card()).unwrap().id;
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(post_json(
                &format!("/api/admin/cards/{}/posted", id),
                serde_json::json!({ "channel": "bluesky" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["lastPostedAt"]["bluesky"].as_i64().unwrap() > 0);

        let blank = app
            .oneshot(post_json(
                &format!("/api/admin/cards/{}/posted", id),
                serde_json::json!({ "channel": " " }),
            ))
            .await
            .unwrap();
        assert_eq!(blank.status(), StatusCode::BAD_REQUEST);
    }
}
