//! HTTP route definitions

use axum::{
    extract::State,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&state.config.client_origin))
        .with_state(state)
}

/// CORS configuration - comma separated origins, or any origin when unset
fn cors_layer(client_origin: &str) -> CorsLayer {
    let allowed_origins: Vec<header::HeaderValue> = client_origin
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new().allow_methods([Method::GET, Method::OPTIONS]);
    if allowed_origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(allowed_origins)
    }
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    match_id: Uuid,
    participants: usize,
    seq: u64,
    left_score: Option<u32>,
    right_score: Option<u32>,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = state.session.status();
    Json(HealthResponse {
        status: if state.session.is_closed() {
            "stopping"
        } else {
            "ok"
        },
        uptime_secs: uptime_secs(),
        match_id: status.match_id,
        participants: status.participants,
        seq: status.seq,
        left_score: status.left_score,
        right_score: status.right_score,
    })
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Game session is not running")]
    Unavailable,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = serde_json::json!({
            "error": self.to_string()
        });

        (status, Json(body)).into_response()
    }
}
