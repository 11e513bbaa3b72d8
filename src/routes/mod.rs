//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the REST and WebSocket endpoints under one Axum router with CORS
//! and a request timeout. Health endpoints sit outside `/api/v1` so probes
//! need no credentials.

pub mod auth;
pub mod leaderboard;
pub mod ws;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .route("/api/v1/submit-score", post(leaderboard::submit_score))
        .route("/api/v1/leaderboard", get(leaderboard::get_leaderboard))
        .route("/api/v1/leaderboard/user/{user_id}", get(leaderboard::get_user_rank))
        .route("/api/v1/users/{user_id}", get(leaderboard::get_user))
        .route("/api/v1/broadcast", post(leaderboard::trigger_broadcast))
        .route("/api/v1/ws/leaderboard", get(ws::handle_ws))
        .route("/api/v1/ws/stats", get(leaderboard::ws_stats))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .layer(cors)
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness: the Store must answer; the cache must answer when configured.
async fn readyz(State(state): State<AppState>) -> StatusCode {
    if sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(&state.pool)
        .await
        .is_err()
    {
        return StatusCode::SERVICE_UNAVAILABLE;
    }

    if let Some(cache) = &state.cache {
        if cache.ping().await.is_err() {
            return StatusCode::SERVICE_UNAVAILABLE;
        }
    }

    StatusCode::OK
}
