use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

#[test]
fn clamp_limit_bounds() {
    assert_eq!(clamp_limit(25, 1000), 25);
    assert_eq!(clamp_limit(0, 1000), 1);
    assert_eq!(clamp_limit(-5, 1000), 1);
    assert_eq!(clamp_limit(5000, 1000), 1000);
    assert_eq!(clamp_limit(i64::MAX, 1000), 1000);
}

#[test]
fn update_limit_frame_applies_clamped_value() {
    let limit = AtomicUsize::new(50);
    apply_control_frame(r#"{"type":"update_limit","limit":10}"#, &limit, 1000);
    assert_eq!(limit.load(Ordering::Relaxed), 10);

    apply_control_frame(r#"{"type":"update_limit","limit":99999}"#, &limit, 1000);
    assert_eq!(limit.load(Ordering::Relaxed), 1000);

    apply_control_frame(r#"{"type":"update_limit","limit":0}"#, &limit, 1000);
    assert_eq!(limit.load(Ordering::Relaxed), 1);
}

#[test]
fn malformed_frames_leave_limit_untouched() {
    let limit = AtomicUsize::new(50);

    apply_control_frame("not json", &limit, 1000);
    assert_eq!(limit.load(Ordering::Relaxed), 50);

    apply_control_frame(r#"{"type":"resize","limit":10}"#, &limit, 1000);
    assert_eq!(limit.load(Ordering::Relaxed), 50);

    apply_control_frame(r#"{"type":"update_limit"}"#, &limit, 1000);
    assert_eq!(limit.load(Ordering::Relaxed), 50);
}
