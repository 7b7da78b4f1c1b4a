//! HTTP route definitions

use axum::{
    extract::{Path, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::{Any, CorsLayer}, trace::TraceLayer};

use crate::app::AppState;
use crate::store::stats::PlayerStatsRow;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::{RoomData, RoomSummary};

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS: "*" opens the API up, anything else is a comma-separated
    // origin allowlist
    let origin_config = state.config.client_origin.trim().to_string();
    let cors = if origin_config == "*" {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
    } else {
        let allowed_origins: Vec<header::HeaderValue> = origin_config
            .split(',')
            .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(allowed_origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/leaderboard", get(leaderboard_handler))
        .route("/rooms", get(rooms_handler))
        .route("/rooms/:room_id", get(room_snapshot_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    active_rooms: usize,
    active_players: usize,
    active_sessions: usize,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: uptime_secs(),
        active_rooms: state.rooms.active_rooms(),
        active_players: state.rooms.total_players(),
        active_sessions: state.sessions.len(),
    })
}

// ============================================================================
// Room listing endpoints
// ============================================================================

#[derive(Serialize)]
struct RoomsResponse {
    rooms: Vec<RoomSummary>,
}

async fn rooms_handler(State(state): State<AppState>) -> Json<RoomsResponse> {
    Json(RoomsResponse {
        rooms: state.rooms.get_rooms(),
    })
}

async fn room_snapshot_handler(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Json<RoomData>, AppError> {
    state
        .rooms
        .get_room_snapshot(&room_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Room not found: {}", room_id)))
}

// ============================================================================
// Leaderboard endpoint
// ============================================================================

#[derive(Serialize)]
struct LeaderboardResponse {
    entries: Vec<PlayerStatsRow>,
}

async fn leaderboard_handler(
    State(state): State<AppState>,
) -> Result<Json<LeaderboardResponse>, AppError> {
    let entries = state
        .stats
        .get_top_scores(10)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(Json(LeaderboardResponse { entries }))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
