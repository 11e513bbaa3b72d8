use axum::extract::FromRequestParts;
use axum::http::Request;
use uuid::Uuid;

use super::*;
use crate::state::test_helpers::test_app_state;

fn parts_with_auth(value: Option<&str>) -> axum::http::request::Parts {
    let mut builder = Request::builder().uri("/api/v1/submit-score");
    if let Some(v) = value {
        builder = builder.header("authorization", v);
    }
    let (parts, ()) = builder.body(()).unwrap().into_parts();
    parts
}

#[tokio::test]
async fn extractor_rejects_missing_header() {
    let state = test_app_state();
    let mut parts = parts_with_auth(None);
    let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
    assert_eq!(err, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn extractor_rejects_malformed_header() {
    let state = test_app_state();
    for header in ["Basic abc", "Bearer", "token-without-scheme"] {
        let mut parts = parts_with_auth(Some(header));
        let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
        assert_eq!(err, StatusCode::UNAUTHORIZED, "header {header:?} should be rejected");
    }
}

#[tokio::test]
async fn extractor_rejects_garbage_token() {
    let state = test_app_state();
    let mut parts = parts_with_auth(Some("Bearer not.a.token"));
    let err = AuthUser::from_request_parts(&mut parts, &state).await.unwrap_err();
    assert_eq!(err, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn extractor_accepts_valid_credential() {
    let state = test_app_state();
    let subject = Uuid::new_v4();
    let (token, _) = state.auth.issue(subject, "alice@example.com").unwrap();

    let mut parts = parts_with_auth(Some(&format!("Bearer {token}")));
    let auth = AuthUser::from_request_parts(&mut parts, &state).await.unwrap();
    assert_eq!(auth.user_id, subject);
    assert_eq!(auth.claims.email, "alice@example.com");
}
