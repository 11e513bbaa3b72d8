//! Leaderboard REST routes — submission, ranked pages, rank-of-one.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use tracing::error;
use uuid::Uuid;

use crate::models::{ApiResponse, LeaderboardEntry, LeaderboardPage, PublicUser, Score, SubmitScoreRequest};
use crate::routes::auth::AuthUser;
use crate::services::leaderboard::{LeaderboardError, LeaderboardQuery};
use crate::state::AppState;

pub(crate) fn service_error_to_status(err: LeaderboardError) -> StatusCode {
    match err {
        LeaderboardError::Validation(_) => StatusCode::BAD_REQUEST,
        LeaderboardError::NotFound(_) => StatusCode::NOT_FOUND,
        LeaderboardError::Unauthorized => StatusCode::UNAUTHORIZED,
        LeaderboardError::Conflict => StatusCode::CONFLICT,
        LeaderboardError::Upstream(cause) => {
            error!(%cause, "upstream failure");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// SUBMISSION
// =============================================================================

/// `POST /api/v1/submit-score` — persist the subject's score and trigger a
/// broadcast. Rate limited per subject.
pub async fn submit_score(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SubmitScoreRequest>,
) -> Result<Json<ApiResponse<Score>>, StatusCode> {
    if state.limiter.check_and_record(auth.user_id).is_err() {
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let score = state
        .service
        .submit_score(auth.user_id, &body)
        .await
        .map_err(service_error_to_status)?;

    Ok(Json(ApiResponse::with_message(score, "score submitted successfully")))
}

// =============================================================================
// RANKED READS
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct LeaderboardParams {
    pub season: Option<String>,
    pub limit: Option<i64>,
    pub page: Option<i64>,
    pub sort: Option<String>,
    /// Accepted for parity with the wire contract; rank-of-one lives at
    /// `/leaderboard/user/{id}`.
    pub user_id: Option<Uuid>,
    pub cursor: Option<String>,
}

/// `GET /api/v1/leaderboard` — one ranked page. The page object is the
/// response body; it is the same shape subscribers receive inside
/// `leaderboard_update` frames.
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LeaderboardParams>,
) -> Result<Json<LeaderboardPage>, StatusCode> {
    let query = LeaderboardQuery::from_params(
        params.season.as_deref(),
        params.limit,
        params.page,
        params.sort.as_deref(),
    )
    .map_err(service_error_to_status)?;

    let page = state
        .service
        .get_leaderboard(&query)
        .await
        .map_err(service_error_to_status)?;

    Ok(Json(page))
}

#[derive(Debug, Deserialize)]
pub struct SeasonParam {
    pub season: Option<String>,
}

/// `GET /api/v1/leaderboard/user/{user_id}` — one user's ranked entry.
pub async fn get_user_rank(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(params): Query<SeasonParam>,
) -> Result<Json<ApiResponse<LeaderboardEntry>>, StatusCode> {
    let entry = state
        .service
        .get_user_rank(user_id, params.season.as_deref())
        .await
        .map_err(service_error_to_status)?;

    Ok(Json(ApiResponse::ok(entry)))
}

/// `GET /api/v1/users/{user_id}` — public profile of one player.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<ApiResponse<PublicUser>>, StatusCode> {
    let user = state
        .service
        .get_user(user_id)
        .await
        .map_err(service_error_to_status)?;

    Ok(Json(ApiResponse::ok(PublicUser::from(user))))
}

// =============================================================================
// BROADCAST / STATS
// =============================================================================

/// `POST /api/v1/broadcast` — manually push the current leaderboard to a
/// season's subscribers. Admin/testing surface.
pub async fn trigger_broadcast(
    State(state): State<AppState>,
    _auth: AuthUser,
    Query(params): Query<SeasonParam>,
) -> Result<Json<ApiResponse<serde_json::Value>>, StatusCode> {
    let season = crate::services::leaderboard::resolve_season(params.season.as_deref());

    use crate::hub::SnapshotSource;
    let envelope = state
        .service
        .fetch(&season, state.config.ws.max_limit)
        .await
        .ok_or(StatusCode::INTERNAL_SERVER_ERROR)?;
    state.hub.broadcast(envelope);

    Ok(Json(ApiResponse::ok(serde_json::json!({ "season": season }))))
}

/// `GET /api/v1/ws/stats` — hub subscriber counts.
pub async fn ws_stats(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> Result<Json<ApiResponse<crate::hub::HubStats>>, StatusCode> {
    let stats = state.hub.stats().await.ok_or(StatusCode::SERVICE_UNAVAILABLE)?;
    Ok(Json(ApiResponse::ok(stats)))
}

#[cfg(test)]
#[path = "leaderboard_test.rs"]
mod tests;
