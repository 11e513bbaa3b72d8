use super::*;
use crate::models::test_helpers::entry;

#[test]
fn sort_order_parses_and_defaults() {
    assert_eq!(SortOrder::parse(None).unwrap(), SortOrder::Desc);
    assert_eq!(SortOrder::parse(Some("desc")).unwrap(), SortOrder::Desc);
    assert_eq!(SortOrder::parse(Some("asc")).unwrap(), SortOrder::Asc);
    assert!(SortOrder::parse(Some("sideways")).is_err());
}

#[test]
fn api_limit_bounds() {
    assert_eq!(validate_api_limit(1).unwrap(), 1);
    assert_eq!(validate_api_limit(100).unwrap(), 100);
    assert!(validate_api_limit(0).is_err());
    assert!(validate_api_limit(101).is_err());
    assert!(validate_api_limit(-5).is_err());
}

#[test]
fn internal_limit_clamped_to_ceiling() {
    assert_eq!(clamp_internal_limit(1), 1);
    assert_eq!(clamp_internal_limit(50), 50);
    assert_eq!(clamp_internal_limit(0), 1);
    assert_eq!(clamp_internal_limit(1_000_000), MAX_INTERNAL_LIMIT);
}

#[test]
fn page_offset_is_zero_based() {
    assert_eq!(page_offset(0, 50).unwrap(), 0);
    assert_eq!(page_offset(3, 50).unwrap(), 150);
    assert!(page_offset(-1, 50).is_err());
}

#[test]
fn cursor_emitted_only_for_full_pages() {
    let full = vec![entry(1, 900), entry(2, 800)];
    assert_eq!(next_cursor(&full, 2).as_deref(), Some("2:800"));

    let partial = vec![entry(1, 900)];
    assert_eq!(next_cursor(&partial, 2), None);

    assert_eq!(next_cursor(&[], 2), None);
}
