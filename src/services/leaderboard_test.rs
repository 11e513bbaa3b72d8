use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use super::*;
use crate::hub::{Hub, HubConfig};
use crate::models::test_helpers::entry;
use crate::state::test_helpers::test_config;

/// Service over a lazy pool that never connects. Only paths that fail
/// before touching the database can be exercised this way.
fn detached_service() -> LeaderboardService {
    let config = test_config();
    let pool = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(2))
        .connect_lazy(&config.database_url)
        .expect("connect_lazy should not fail");
    let auth = AuthGate::new(&config.auth);
    struct NoSource;
    #[async_trait::async_trait]
    impl SnapshotSource for NoSource {
        async fn fetch(&self, _season: &str, _limit: usize) -> Option<Envelope> {
            None
        }
    }
    let (hub, _task) = Hub::spawn(
        HubConfig { broadcast_interval: Duration::from_secs(3600), default_limit: 50 },
        std::sync::Arc::new(NoSource),
    );
    LeaderboardService::new(pool, None, hub, auth, config)
}

fn submit(value: i64) -> SubmitScoreRequest {
    SubmitScoreRequest { value, season: None, metadata: None }
}

#[tokio::test]
async fn submit_rejects_value_above_max_without_touching_store() {
    let service = detached_service();
    let err = service.submit_score(Uuid::new_v4(), &submit(10_001)).await.unwrap_err();
    assert!(matches!(err, LeaderboardError::Validation(_)));
}

#[tokio::test]
async fn submit_rejects_value_below_min_without_touching_store() {
    let service = detached_service();
    let err = service.submit_score(Uuid::new_v4(), &submit(-1)).await.unwrap_err();
    assert!(matches!(err, LeaderboardError::Validation(_)));
}

#[tokio::test]
async fn submit_accepts_boundary_values_past_validation() {
    // Boundary values clear validation and then fail on the unreachable
    // database, proving the rejection above happens before any I/O.
    let service = detached_service();
    let err = service.submit_score(Uuid::new_v4(), &submit(10_000)).await.unwrap_err();
    assert!(matches!(err, LeaderboardError::Upstream(_)));
}

#[tokio::test]
async fn register_validates_fields_before_store() {
    let service = detached_service();

    let bad_name = RegisterRequest {
        name: "  ".into(),
        email: "a@b.c".into(),
        password: "longenough".into(),
        initial_value: None,
        season: None,
    };
    assert!(matches!(
        service.register_user(&bad_name).await.unwrap_err(),
        LeaderboardError::Validation(_)
    ));

    let bad_email = RegisterRequest {
        name: "alice".into(),
        email: "nope".into(),
        password: "longenough".into(),
        initial_value: None,
        season: None,
    };
    assert!(matches!(
        service.register_user(&bad_email).await.unwrap_err(),
        LeaderboardError::Validation(_)
    ));

    let bad_password = RegisterRequest {
        name: "alice".into(),
        email: "a@b.c".into(),
        password: "short".into(),
        initial_value: None,
        season: None,
    };
    assert!(matches!(
        service.register_user(&bad_password).await.unwrap_err(),
        LeaderboardError::Validation(_)
    ));
}

#[tokio::test]
async fn register_rejects_out_of_bounds_initial_value() {
    let service = detached_service();
    let req = RegisterRequest {
        name: "alice".into(),
        email: "alice@example.com".into(),
        password: "longenough".into(),
        initial_value: Some(999_999),
        season: None,
    };
    assert!(matches!(
        service.register_user(&req).await.unwrap_err(),
        LeaderboardError::Validation(_)
    ));
}

#[test]
fn season_resolution_defaults_and_trims() {
    assert_eq!(resolve_season(None), "global");
    assert_eq!(resolve_season(Some("")), "global");
    assert_eq!(resolve_season(Some("  ")), "global");
    assert_eq!(resolve_season(Some("spring")), "spring");
    assert_eq!(resolve_season(Some(" spring ")), "spring");
}

#[test]
fn query_defaults_resolve() {
    let q = LeaderboardQuery::from_params(None, None, None, None).unwrap();
    assert_eq!(q.season, "global");
    assert_eq!(q.limit, 50);
    assert_eq!(q.page, 0);
    assert_eq!(q.order, SortOrder::Desc);
}

#[test]
fn query_rejects_bad_parameters() {
    assert!(LeaderboardQuery::from_params(None, Some(0), None, None).is_err());
    assert!(LeaderboardQuery::from_params(None, Some(101), None, None).is_err());
    assert!(LeaderboardQuery::from_params(None, None, Some(-1), None).is_err());
    assert!(LeaderboardQuery::from_params(None, None, None, Some("upward")).is_err());
}

#[test]
fn query_accepts_explicit_parameters() {
    let q = LeaderboardQuery::from_params(Some("spring"), Some(10), Some(3), Some("asc")).unwrap();
    assert_eq!(q.season, "spring");
    assert_eq!(q.limit, 10);
    assert_eq!(q.page, 3);
    assert_eq!(q.order, SortOrder::Asc);
    assert_eq!(q.offset(), 30);
}

#[test]
fn build_page_derives_has_next_and_cursor() {
    let full = vec![entry(1, 900), entry(2, 800)];
    let page = build_page(full, 10, 0, 2);
    assert!(page.has_next);
    assert_eq!(page.next_cursor.as_deref(), Some("2:800"));
    assert_eq!(page.total_count, 10);

    let partial = vec![entry(1, 900)];
    let page = build_page(partial, 1, 0, 2);
    assert!(!page.has_next);
    assert!(page.next_cursor.is_none());
}

#[test]
fn store_errors_map_to_service_kinds() {
    assert!(matches!(
        LeaderboardError::from(crate::store::StoreError::NotFound("score")),
        LeaderboardError::NotFound("score")
    ));
    assert!(matches!(
        LeaderboardError::from(crate::store::StoreError::Conflict),
        LeaderboardError::Conflict
    ));
}
