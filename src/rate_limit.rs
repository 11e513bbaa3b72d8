//! In-memory rate limiting for score submissions.
//!
//! DESIGN
//! ======
//! Sliding-window counters backed by `HashMap<Uuid, VecDeque<Instant>>`,
//! keyed by the authenticated subject. Limit and window come from
//! configuration. Entries prune lazily on each check, so an idle user costs
//! nothing after their window drains.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::RateLimitConfig;

#[derive(Debug, thiserror::Error)]
#[error("rate limit exceeded (max {limit} requests per {window_secs}s)")]
pub struct RateLimitExceeded {
    pub limit: usize,
    pub window_secs: u64,
}

#[derive(Clone)]
pub struct RateLimiter {
    limit: usize,
    window: Duration,
    requests: Arc<Mutex<HashMap<Uuid, VecDeque<Instant>>>>,
}

impl RateLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            limit: config.requests,
            window: config.window,
            requests: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Check the subject's window and record the request if allowed.
    ///
    /// # Errors
    ///
    /// `RateLimitExceeded` when the subject has exhausted its window.
    pub fn check_and_record(&self, subject: Uuid) -> Result<(), RateLimitExceeded> {
        self.check_and_record_at(subject, Instant::now())
    }

    /// Internal: check + record with explicit timestamp (for testing).
    fn check_and_record_at(&self, subject: Uuid, now: Instant) -> Result<(), RateLimitExceeded> {
        let mut requests = self.requests.lock().unwrap();
        let window = requests.entry(subject).or_default();

        while let Some(&front) = window.front() {
            if now.duration_since(front) > self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.limit {
            return Err(RateLimitExceeded { limit: self.limit, window_secs: self.window.as_secs() });
        }

        window.push_back(now);
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(limit: usize, window_secs: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig { requests: limit, window: Duration::from_secs(window_secs) })
    }

    #[test]
    fn allows_up_to_limit() {
        let rl = limiter(5, 60);
        let subject = Uuid::new_v4();
        let now = Instant::now();

        for i in 0..5 {
            assert!(rl.check_and_record_at(subject, now).is_ok(), "request {i} should succeed");
        }
        assert!(rl.check_and_record_at(subject, now).is_err());
    }

    #[test]
    fn window_expiry_allows_new_requests() {
        let rl = limiter(3, 60);
        let subject = Uuid::new_v4();
        let start = Instant::now();

        for _ in 0..3 {
            rl.check_and_record_at(subject, start).unwrap();
        }
        assert!(rl.check_and_record_at(subject, start).is_err());

        let after_window = start + Duration::from_secs(61);
        assert!(rl.check_and_record_at(subject, after_window).is_ok());
    }

    #[test]
    fn distinct_subjects_do_not_interfere() {
        let rl = limiter(2, 60);
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let now = Instant::now();

        rl.check_and_record_at(a, now).unwrap();
        rl.check_and_record_at(a, now).unwrap();
        assert!(rl.check_and_record_at(a, now).is_err());
        assert!(rl.check_and_record_at(b, now).is_ok());
    }
}
