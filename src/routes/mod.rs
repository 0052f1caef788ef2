//! Router assembly: HTTP endpoints, CORS, and HTTP tracing.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::state::AppState;

pub mod http;

/// Build the application router with:
/// - JSON API under `/api/v1/...`
/// - CORS (allow any origin/method/headers); adjust for production if needed
/// - HTTP trace layer (per-request spans w/ method, path, status, latency)
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/health", get(http::http_health))
        // Plans
        .route("/api/v1/today", get(http::http_get_today))
        .route("/api/v1/today/generate", post(http::http_post_generate))
        .route("/api/v1/plans/:date", get(http::http_get_plan))
        // Sessions
        .route("/api/v1/task-sessions/start", post(http::http_start_session))
        .route("/api/v1/task-sessions/:id", get(http::http_get_session))
        .route("/api/v1/task-sessions/:id/answer", post(http::http_post_answer))
        .route("/api/v1/task-sessions/:id/next", post(http::http_post_next))
        .route("/api/v1/task-sessions/:id/finish", post(http::http_post_finish))
        .route("/api/v1/task-sessions/:id/abandon", post(http::http_post_abandon))
        // Progression
        .route("/api/v1/progress", get(http::http_get_progress))
        .route("/api/v1/xp-log", get(http::http_get_xp_log))
        .route("/api/v1/cycles", get(http::http_get_cycles))
        .route("/api/v1/cycle/gate", get(http::http_get_gate))
        .route("/api/v1/cycle/advance", post(http::http_post_advance))
        // Sparring + mock interviews
        .route("/api/v1/sparring/progress", get(http::http_get_sparring_progress))
        .route("/api/v1/sparring/question", post(http::http_post_sparring_question))
        .route("/api/v1/sparring/attempt", post(http::http_post_sparring_attempt))
        .route("/api/v1/mock", get(http::http_get_mock).post(http::http_post_mock))
        // State + CORS + HTTP tracing
        .with_state(state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
}
