//! Axum router. Routes match the documented external interface:
//!
//! | Endpoint | Method | Body | Result |
//! |---|---|---|---|
//! | `/health` | GET | - | `{status, features, qc_tools[]}` |
//! | `/probe/file` | POST | multipart: file, include_llm? | `{analysis_id, analysis}` |
//! | `/probe/url` | POST | `{url, include_llm?, timeout?}` | as above |
//! | `/probe/hls` | POST | `{manifest_url, analyze_segments?, max_segments?}` | `{analysis_id, analysis}` |
//! | `/batch/analyze` | POST | `{files[], urls[], include_llm?}` | 202 `{job_id, status_url, ws_url}` |
//! | `/batch/status/:id` | GET | - | BatchJob snapshot |
//! | `/ws/progress/:id` | WS | - | ProgressEvent stream |

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

pub fn build(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state);
    let body_limit = usize::try_from(state.config.max_file_size_bytes).unwrap_or(usize::MAX);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/probe/file", post(handlers::probe_file))
        .route("/probe/url", post(handlers::probe_url))
        .route("/probe/hls", post(handlers::probe_hls))
        .route("/batch/analyze", post(handlers::batch_analyze))
        .route("/batch/status/:id", get(handlers::batch_status))
        .route("/ws/progress/:id", get(handlers::ws_progress))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(state: &AppState) -> CorsLayer {
    if state.config.allowed_cors_origins.is_empty() {
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = state
        .config
        .allowed_cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}
