//! Ranking and pagination policy.
//!
//! DESIGN
//! ======
//! Rank is a whole-season property: equal values share a dense rank and the
//! next distinct value advances it by one. Display order within a page is
//! `(value, timestamp ASC, user_id ASC)` so ties render deterministically.
//! The rank window itself runs in SQL (see `store`); this module owns the
//! surrounding policy: sort order, limit bounds, offsets, and cursors.

use crate::models::LeaderboardEntry;

/// Largest page any internal caller (broadcast assembly) may request.
pub const MAX_INTERNAL_LIMIT: i64 = 10_000;

/// Largest page the REST API accepts.
pub const MAX_API_LIMIT: i64 = 100;

/// Page size applied when a query does not name one.
pub const DEFAULT_API_LIMIT: i64 = 50;

// =============================================================================
// SORT ORDER
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    /// Parse a query-string value. `None` input falls back to descending;
    /// anything other than `asc`/`desc` is rejected.
    pub fn parse(raw: Option<&str>) -> Result<Self, String> {
        match raw {
            None | Some("desc") => Ok(Self::Desc),
            Some("asc") => Ok(Self::Asc),
            Some(other) => Err(format!("invalid sort order: {other}")),
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Desc => "desc",
            Self::Asc => "asc",
        }
    }
}

// =============================================================================
// LIMITS AND OFFSETS
// =============================================================================

/// Validate an API-facing limit. Out-of-range values are rejected rather
/// than clamped so callers learn their request was wrong.
pub fn validate_api_limit(limit: i64) -> Result<i64, String> {
    if (1..=MAX_API_LIMIT).contains(&limit) {
        Ok(limit)
    } else {
        Err(format!("limit must be between 1 and {MAX_API_LIMIT}"))
    }
}

/// Bound an internal (broadcast) limit to the hard ceiling.
#[must_use]
pub fn clamp_internal_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(MAX_INTERNAL_LIMIT).clamp(1, MAX_INTERNAL_LIMIT)
}

/// Zero-based page to row offset.
pub fn page_offset(page: i64, limit: i64) -> Result<i64, String> {
    if page < 0 {
        return Err("page must be non-negative".into());
    }
    page.checked_mul(limit).ok_or_else(|| "page out of range".into())
}

// =============================================================================
// CURSOR
// =============================================================================

/// Opaque continuation token of the form `"{last_rank}:{last_value}"`,
/// emitted only when the page was full.
#[must_use]
pub fn next_cursor(entries: &[LeaderboardEntry], limit: i64) -> Option<String> {
    let has_next = entries.len() as i64 == limit;
    let last = entries.last()?;
    has_next.then(|| format!("{}:{}", last.rank, last.value))
}

#[cfg(test)]
#[path = "ranking_test.rs"]
mod tests;
