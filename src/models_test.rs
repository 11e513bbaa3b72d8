use chrono::Utc;
use uuid::Uuid;

use super::test_helpers::{entry, page};
use super::*;

#[test]
fn public_user_omits_password_hash() {
    let user = User {
        id: Uuid::new_v4(),
        name: "alice".into(),
        email: "alice@example.com".into(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$x$y".into(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let json = serde_json::to_string(&PublicUser::from(user)).unwrap();
    assert!(!json.contains("password_hash"));
    assert!(!json.contains("argon2id"));
    assert!(json.contains("alice@example.com"));
}

#[test]
fn user_round_trips_through_cache_serialization() {
    let user = User {
        id: Uuid::new_v4(),
        name: "bob".into(),
        email: "bob@example.com".into(),
        password_hash: "$argon2id$v=19$m=19456,t=2,p=1$x$y".into(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let json = serde_json::to_string(&user).unwrap();
    let restored: User = serde_json::from_str(&json).unwrap();
    assert_eq!(restored.id, user.id);
    assert_eq!(restored.password_hash, user.password_hash);
}

#[test]
fn update_frame_wire_shape() {
    let env = Envelope::new("global", page(vec![entry(1, 900), entry(2, 800)], 2, 50));
    let json = env.serialize_for(10).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["type"], "leaderboard_update");
    assert_eq!(value["season"], "global");
    assert_eq!(value["leaderboard"]["entries"].as_array().unwrap().len(), 2);
    assert_eq!(value["leaderboard"]["total_count"], 2);
    assert!(value["timestamp"].is_i64());
}

#[test]
fn envelope_projection_truncates_to_limit() {
    let env = Envelope::new("global", page(vec![entry(1, 3), entry(2, 2), entry(3, 1)], 3, 50));
    let json = env.serialize_for(2).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let entries = value["leaderboard"]["entries"].as_array().unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["rank"], 1);
    assert_eq!(entries[1]["rank"], 2);
}

#[test]
fn envelope_projection_bounded_by_population() {
    let env = Envelope::new("global", page(vec![entry(1, 3)], 1, 50));
    let json = env.serialize_for(10).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["leaderboard"]["entries"].as_array().unwrap().len(), 1);
}

#[test]
fn control_frame_parses_update_limit() {
    let frame: ControlFrame = serde_json::from_str(r#"{"type":"update_limit","limit":25}"#).unwrap();
    let ControlFrame::UpdateLimit { limit } = frame;
    assert_eq!(limit, 25);
}

#[test]
fn control_frame_rejects_unknown_type() {
    let result = serde_json::from_str::<ControlFrame>(r#"{"type":"resize","limit":25}"#);
    assert!(result.is_err());
}

#[test]
fn next_cursor_omitted_when_none() {
    let p = page(vec![], 0, 50);
    let json = serde_json::to_string(&p).unwrap();
    assert!(!json.contains("next_cursor"));
}
