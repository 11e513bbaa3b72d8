//! Auth routes — registration, login, and the bearer-credential extractor.

use axum::extract::{FromRef, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::response::Json;
use uuid::Uuid;

use crate::models::{ApiResponse, LoginRequest, LoginResponse, PublicUser, RegisterRequest};
use crate::services::auth::{bearer_token, Claims};
use crate::state::AppState;

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated subject extracted from the `Authorization: Bearer` header.
/// Use as a handler parameter to require authentication.
#[derive(Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub claims: Claims,
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(StatusCode::UNAUTHORIZED)?;
        let token = bearer_token(header).ok_or(StatusCode::UNAUTHORIZED)?;

        let app_state = AppState::from_ref(state);
        let claims = app_state
            .auth
            .validate(token)
            .map_err(|_| StatusCode::UNAUTHORIZED)?;

        Ok(Self { user_id: claims.sub, claims })
    }
}

// =============================================================================
// HANDLERS
// =============================================================================

/// `POST /api/v1/auth/register` — create an account, optionally seeded with
/// a first score.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PublicUser>>), StatusCode> {
    let user = state
        .service
        .register_user(&body)
        .await
        .map_err(super::leaderboard::service_error_to_status)?;

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(PublicUser::from(user)))))
}

/// `POST /api/v1/auth/login` — verify credentials and issue a token.
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, StatusCode> {
    let response = state
        .service
        .login(&body.email, &body.password)
        .await
        .map_err(super::leaderboard::service_error_to_status)?;

    Ok(Json(ApiResponse::ok(response)))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
