//! Card routes — streaming generation, regeneration and reads.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::Stream;
use serde::Deserialize;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use super::error_response;
use crate::framing::{error_block, meta_block, result_block};
use crate::state::AppState;
use calibra_core::GenerationRequest;
use calibra_runtime::{Generation, GenerationEvent, GenerationMeta, GenerationResult, LiveGeneration};

type TextStream = Pin<Box<dyn Stream<Item = Result<String, Infallible>> + Send>>;

const MAX_PAGE_SIZE: usize = 100;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/cards", get(list_cards))
        .route("/cards/generate", post(generate))
        .route("/cards/{key}", get(get_card))
        .route("/cards/{key}/regenerate", post(regenerate))
}

// ---------------------------------------------------------------
// Generation
// ---------------------------------------------------------------

/// POST /api/cards/generate — cached card or a live stream.
async fn generate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerationRequest>,
) -> Response {
    let cancel = CancellationToken::new();
    match state.pipeline.begin(&req, false, cancel.clone()).await {
        Ok(generation) => stream_response(generation, cancel),
        Err(e) => error_response(&e).into_response(),
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegenerateParams {
    preferred_provider: Option<String>,
}

/// POST /api/cards/{externalId}/regenerate — always generates.
async fn regenerate(
    State(state): State<Arc<AppState>>,
    Path(external_id): Path<String>,
    Query(params): Query<RegenerateParams>,
) -> Response {
    let cancel = CancellationToken::new();
    match state
        .pipeline
        .regenerate(&external_id, params.preferred_provider, cancel.clone())
        .await
    {
        Ok(generation) => stream_response(generation, cancel),
        Err(e) => error_response(&e).into_response(),
    }
}

fn stream_response(generation: Generation, cancel: CancellationToken) -> Response {
    let body: TextStream = match generation {
        Generation::Cached(card) => {
            let meta = meta_block(&GenerationMeta::from_card(&card));
            let result = result_block(&GenerationResult::from_card(&card, true));
            Box::pin(futures::stream::iter([
                Ok(meta),
                Ok(card.body_text),
                Ok(result),
            ]))
        }
        Generation::Live(LiveGeneration { meta, mut events }) => {
            // Dropping the body (client disconnect) cancels the generation.
            let cancel_on_drop = cancel.drop_guard();
            Box::pin(async_stream::stream! {
                let _cancel_on_drop = cancel_on_drop;
                yield Ok::<_, Infallible>(meta_block(&meta));

                while let Some(event) = events.next().await {
                    match event {
                        GenerationEvent::Fragment(text) => yield Ok(text),
                        GenerationEvent::Completed(result) => yield Ok(result_block(&result)),
                        GenerationEvent::Failed(message) => yield Ok(error_block(&message)),
                    }
                }
            })
        }
    };

    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

// ---------------------------------------------------------------
// Reads
// ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListParams {
    page: Option<usize>,
    page_size: Option<usize>,
}

/// GET /api/cards — most recent first.
async fn list_cards(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Response {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, MAX_PAGE_SIZE);

    match state.store.list_cards(page, page_size) {
        Ok((cards, total)) => Json(serde_json::json!({
            "cards": cards,
            "total": total,
            "page": page,
            "pageSize": page_size,
        }))
        .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// GET /api/cards/{slug}
async fn get_card(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Response {
    match state.store.get_by_slug(&slug) {
        Ok(Some(card)) => Json(card).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("No card with slug '{}'", slug) })),
        )
            .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use calibra_core::{MediaType, NewCard};
    use calibra_generate::testing::Script;
    use tower::ServiceExt;

    use crate::routes::build_router;
    use crate::state::test_state;

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn heat() -> NewCard {
        NewCard {
            external_id: "movie:949".into(),
            title: "Heat".into(),
            year: Some(1995),
            media_type: MediaType::Film,
            poster_ref: None,
            genres: vec!["Crime".into()],
            slug: "heat-1995".into(),
            body_text: "Stored body.".into(),
            calibration_sentence: None,
            comparisons: Vec::new(),
            provider: "groq".into(),
        }
    }

    #[tokio::test]
    async fn test_title_only_generation_is_framed() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, Script::fragments(&["Hello ", "world."]));
        let app = build_router(state);

        let response = app
            .oneshot(post_json("/api/cards/generate", serde_json::json!({ "title": "Heat" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; charset=utf-8"
        );

        let text = body_text(response).await;
        assert!(text.starts_with("\u{1e}[[CALIBRA:META]]{"));
        let (_, rest) = text.split_once("[[/CALIBRA:META]]\n").unwrap();
        let (generated, result) = rest.split_once("\n[[CALIBRA:RESULT]]").unwrap();
        assert_eq!(generated, "Hello world.");
        let json = result.strip_suffix("[[/CALIBRA:RESULT]]").unwrap();
        let parsed: serde_json::Value = serde_json::from_str(json).unwrap();
        assert_eq!(parsed["persisted"], false);
        assert_eq!(parsed["provider"], "groq");
    }

    #[tokio::test]
    async fn test_cached_card_is_served_without_backend() {
        let dir = tempfile::tempdir().unwrap();
        let (state, backend) = test_state(&dir, Script::fragments(&["unused"]));
        state.store.upsert_card(&heat()).unwrap();
        let app = build_router(state);

        let response = app
            .oneshot(post_json(
                "/api/cards/generate",
                serde_json::json!({ "externalId": "movie:949" }),
            ))
            .await
            .unwrap();
        let text = body_text(response).await;
        assert!(text.contains("\"cached\":true"));
        assert!(text.contains("[[/CALIBRA:META]]\nStored body.\n[[CALIBRA:RESULT]]"));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_with_error_block() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, Script::ErrorAfter(vec!["partial".into()], "reset".into()));
        let app = build_router(state);

        let response = app
            .oneshot(post_json("/api/cards/generate", serde_json::json!({ "title": "Heat" })))
            .await
            .unwrap();
        let text = body_text(response).await;
        assert!(text.contains("partial\n[[CALIBRA:ERROR]]"));
        assert!(!text.contains("[[CALIBRA:RESULT]]"));
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, Script::FailOpen("401".into()));
        let app = build_router(state);

        let empty = app
            .clone()
            .oneshot(post_json("/api/cards/generate", serde_json::json!({ "title": "  " })))
            .await
            .unwrap();
        assert_eq!(empty.status(), StatusCode::BAD_REQUEST);

        let exhausted = app
            .clone()
            .oneshot(post_json("/api/cards/generate", serde_json::json!({ "title": "Heat" })))
            .await
            .unwrap();
        assert_eq!(exhausted.status(), StatusCode::SERVICE_UNAVAILABLE);

        let unknown = app
            .oneshot(post_json("/api/cards/tv:1/regenerate", serde_json::json!({})))
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_list_and_get_by_slug() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, Script::Empty);
        state.store.upsert_card(&heat()).unwrap();
        let app = build_router(state);

        let list = app
            .clone()
            .oneshot(Request::get("/api/cards?pageSize=5").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&body_text(list).await).unwrap();
        assert_eq!(parsed["total"], 1);
        assert_eq!(parsed["pageSize"], 5);
        assert_eq!(parsed["cards"][0]["externalId"], "movie:949");

        let found = app
            .clone()
            .oneshot(Request::get("/api/cards/heat-1995").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(found.status(), StatusCode::OK);

        let missing = app
            .oneshot(Request::get("/api/cards/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_list_rejects_out_of_range_page() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = test_state(&dir, Script::Empty);
        state.store.upsert_card(&heat()).unwrap();
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(
                Request::get("/api/cards?page=18446744073709551615&pageSize=100")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let past_end = app
            .oneshot(Request::get("/api/cards?page=50").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(past_end.status(), StatusCode::OK);
        let parsed: serde_json::Value = serde_json::from_str(&body_text(past_end).await).unwrap();
        assert_eq!(parsed["total"], 1);
        assert!(parsed["cards"].as_array().unwrap().is_empty());
    }
}
