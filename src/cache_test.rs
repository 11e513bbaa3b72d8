use uuid::Uuid;

use super::*;

#[test]
fn key_layout_is_stable() {
    let id = Uuid::nil();
    assert_eq!(user_id_key(id), format!("user:id:{id}"));
    assert_eq!(user_email_key("a@b.c"), "user:email:a@b.c");
    assert_eq!(score_key(id, "global"), format!("score:{id}:global"));
    assert_eq!(count_key("spring"), "count:spring");
}

#[test]
fn seasons_do_not_share_keys() {
    let id = Uuid::new_v4();
    assert_ne!(score_key(id, "global"), score_key(id, "spring"));
    assert_ne!(count_key("global"), count_key("spring"));
}
