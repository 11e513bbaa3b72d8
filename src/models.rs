//! Domain and wire types.
//!
//! DESIGN
//! ======
//! Rows mirror the `users` and `scores` tables. Everything a client sees is
//! derived: `LeaderboardEntry` rows carry a rank computed at read time and
//! are never persisted. REST responses wrap payloads in a uniform
//! success envelope; WebSocket pushes use `UpdateFrame`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Season tag used when a request does not name one.
pub const DEFAULT_SEASON: &str = "global";

// =============================================================================
// USERS
// =============================================================================

/// A registered player. Mirrors the `users` table. Internal type: it round-
/// trips through the cache with its hash intact, so it must never be
/// serialized into a response. Handlers return [`PublicUser`].
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The client-visible projection of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for PublicUser {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    /// When present, the new account is seeded with this score atomically.
    #[serde(default)]
    pub initial_value: Option<i64>,
    #[serde(default)]
    pub season: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: Uuid,
    /// Unix seconds at which the credential expires.
    pub expires_at: i64,
}

// =============================================================================
// SCORES
// =============================================================================

/// A player's score in one season. Mirrors the `scores` table; at most one
/// row exists per `(user_id, season)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Score {
    pub id: Uuid,
    pub user_id: Uuid,
    pub value: i64,
    pub season: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitScoreRequest {
    pub value: i64,
    #[serde(default)]
    pub season: Option<String>,
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

// =============================================================================
// RANKED VIEWS
// =============================================================================

/// One ranked row. Derived at read time, never persisted; equal values share
/// a rank (dense rank) and display in timestamp order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: Uuid,
    pub user_name: String,
    pub value: i64,
    pub season: String,
    pub timestamp: DateTime<Utc>,
}

/// A paginated ranked view plus the metadata clients page with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaderboardPage {
    pub entries: Vec<LeaderboardEntry>,
    pub total_count: i64,
    pub page: i64,
    pub limit: i64,
    pub has_next: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

// =============================================================================
// BROADCAST ENVELOPE
// =============================================================================

/// One leaderboard snapshot bound for a season's subscribers. The hub
/// projects `page.entries` down to each subscriber's requested limit before
/// serializing.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub season: String,
    pub page: LeaderboardPage,
    /// Unix seconds when the snapshot was assembled.
    pub server_ts: i64,
}

impl Envelope {
    pub fn new(season: impl Into<String>, page: LeaderboardPage) -> Self {
        Self { season: season.into(), page, server_ts: Utc::now().timestamp() }
    }

    /// Serialize this envelope for one subscriber, truncating entries to
    /// `limit`. Fields mirror the `leaderboard_update` wire frame.
    pub fn serialize_for(&self, limit: usize) -> Result<String, serde_json::Error> {
        let mut page = self.page.clone();
        if page.entries.len() > limit {
            page.entries.truncate(limit);
        }
        serde_json::to_string(&UpdateFrame {
            kind: "leaderboard_update",
            season: &self.season,
            leaderboard: page,
            timestamp: self.server_ts,
        })
    }
}

/// Server→client WebSocket frame.
#[derive(Debug, Serialize)]
struct UpdateFrame<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    season: &'a str,
    leaderboard: LeaderboardPage,
    timestamp: i64,
}

/// Client→server WebSocket control frame. `update_limit` is the only
/// recognized type; anything else is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlFrame {
    UpdateLimit { limit: i64 },
}

// =============================================================================
// RESPONSE ENVELOPE
// =============================================================================

/// Uniform REST success wrapper: `{"success": true, "data": ...}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, message: None, data }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self { success: true, message: Some(message.into()), data }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// Ranked entry with a fresh random owner.
    #[must_use]
    pub fn entry(rank: i64, value: i64) -> LeaderboardEntry {
        LeaderboardEntry {
            rank,
            user_id: Uuid::new_v4(),
            user_name: format!("player-{rank}"),
            value,
            season: DEFAULT_SEASON.into(),
            timestamp: Utc::now(),
        }
    }

    /// Page wrapper around pre-built entries.
    #[must_use]
    pub fn page(entries: Vec<LeaderboardEntry>, total: i64, limit: i64) -> LeaderboardPage {
        LeaderboardPage { entries, total_count: total, page: 0, limit, has_next: false, next_cursor: None }
    }
}

#[cfg(test)]
#[path = "models_test.rs"]
mod tests;
