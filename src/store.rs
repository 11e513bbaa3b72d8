//! Store — all SQL against the `users` and `scores` tables.
//!
//! DESIGN
//! ======
//! Rank computation lives here, in the database, as a window over the whole
//! season: `DENSE_RANK()` cannot be derived from a page in isolation, so the
//! ranked-page query carries the window and the season total in one round
//! trip. Timestamps are stamped with server-side `now()` at commit; the
//! tie-break is only well-defined if one clock orders all writes.
//!
//! ERROR HANDLING
//! ==============
//! Absent rows surface as `StoreError::NotFound`, unique-key collisions as
//! `StoreError::Conflict`; everything else propagates the SQLx cause.

use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{LeaderboardEntry, Score, User};
use crate::ranking::SortOrder;

/// Postgres error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("email already registered")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

fn map_insert_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::Conflict;
        }
    }
    StoreError::Database(err)
}

// =============================================================================
// SCORES
// =============================================================================

/// Insert a score or replace the row holding the `(user_id, season)` slot.
/// Returns the persisted row: the surviving id and the commit timestamp.
///
/// # Errors
///
/// Returns a database error if the write fails.
pub async fn upsert_score(
    pool: &PgPool,
    user_id: Uuid,
    value: i64,
    season: &str,
    metadata: Option<&serde_json::Value>,
) -> Result<Score, StoreError> {
    let score = sqlx::query_as::<_, Score>(
        "INSERT INTO scores (id, user_id, value, season, metadata, timestamp)
         VALUES ($1, $2, $3, $4, $5, now())
         ON CONFLICT (user_id, season)
         DO UPDATE SET value = EXCLUDED.value, metadata = EXCLUDED.metadata, timestamp = now()
         RETURNING id, user_id, value, season, metadata, timestamp",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(value)
    .bind(season)
    .bind(metadata)
    .fetch_one(pool)
    .await?;

    Ok(score)
}

/// Fetch one user's score row for a season.
///
/// # Errors
///
/// `NotFound` when the user has no row in the season.
pub async fn find_score(pool: &PgPool, user_id: Uuid, season: &str) -> Result<Score, StoreError> {
    sqlx::query_as::<_, Score>(
        "SELECT id, user_id, value, season, metadata, timestamp
         FROM scores WHERE user_id = $1 AND season = $2",
    )
    .bind(user_id)
    .bind(season)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound("score"))
}

/// Number of score rows in a season.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn count_season(pool: &PgPool, season: &str) -> Result<i64, StoreError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM scores WHERE season = $1")
        .bind(season)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Remove one user's score for a season.
///
/// # Errors
///
/// `NotFound` when no row existed.
pub async fn delete_score(pool: &PgPool, user_id: Uuid, season: &str) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM scores WHERE user_id = $1 AND season = $2")
        .bind(user_id)
        .bind(season)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("score"));
    }
    Ok(())
}

// =============================================================================
// RANKED VIEWS
// =============================================================================

/// One page of the season's ranked order, plus the season total when the
/// page is non-empty (an empty page cannot carry the window total; callers
/// resolve it through `count_season` or its cached front).
///
/// Dense rank is computed over the entire season, not the returned page:
/// rows with equal value share a rank, the next distinct value advances it
/// by one, and ties display in `(timestamp, user_id)` order. Owners that no
/// longer exist render as "Unknown".
///
/// # Errors
///
/// Returns a database error if the query fails. An empty page is not an
/// error.
pub async fn ranked_page(
    pool: &PgPool,
    season: &str,
    limit: i64,
    offset: i64,
    order: SortOrder,
) -> Result<(Vec<LeaderboardEntry>, Option<i64>), StoreError> {
    let sql = match order {
        SortOrder::Desc => {
            "SELECT rank, user_id, user_name, value, season, timestamp, total_count
             FROM (
                 SELECT DENSE_RANK() OVER (ORDER BY s.value DESC) AS rank,
                        s.user_id,
                        COALESCE(u.name, 'Unknown') AS user_name,
                        s.value,
                        s.season,
                        s.timestamp,
                        COUNT(*) OVER () AS total_count,
                        ROW_NUMBER() OVER (ORDER BY s.value DESC, s.timestamp ASC, s.user_id ASC) AS row_pos
                 FROM scores s
                 LEFT JOIN users u ON u.id = s.user_id
                 WHERE s.season = $1
             ) ranked
             ORDER BY row_pos
             LIMIT $2 OFFSET $3"
        }
        SortOrder::Asc => {
            "SELECT rank, user_id, user_name, value, season, timestamp, total_count
             FROM (
                 SELECT DENSE_RANK() OVER (ORDER BY s.value ASC) AS rank,
                        s.user_id,
                        COALESCE(u.name, 'Unknown') AS user_name,
                        s.value,
                        s.season,
                        s.timestamp,
                        COUNT(*) OVER () AS total_count,
                        ROW_NUMBER() OVER (ORDER BY s.value ASC, s.timestamp ASC, s.user_id ASC) AS row_pos
                 FROM scores s
                 LEFT JOIN users u ON u.id = s.user_id
                 WHERE s.season = $1
             ) ranked
             ORDER BY row_pos
             LIMIT $2 OFFSET $3"
        }
    };

    let rows = sqlx::query_as::<_, RankedRow>(sql)
        .bind(season)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let total = rows.first().map(|row| row.total_count);
    Ok((rows.into_iter().map(RankedRow::into_entry).collect(), total))
}

/// One user's ranked entry, computed without scanning the season: the dense
/// rank equals one plus the number of distinct values above the user's.
///
/// # Errors
///
/// `NotFound` when the user has no score in the season.
pub async fn rank_of(pool: &PgPool, user_id: Uuid, season: &str) -> Result<LeaderboardEntry, StoreError> {
    sqlx::query_as::<_, LeaderboardEntry>(
        "SELECT (SELECT COUNT(DISTINCT s2.value)
                 FROM scores s2
                 WHERE s2.season = $2 AND s2.value > s.value) + 1 AS rank,
                s.user_id,
                COALESCE(u.name, 'Unknown') AS user_name,
                s.value,
                s.season,
                s.timestamp
         FROM scores s
         LEFT JOIN users u ON u.id = s.user_id
         WHERE s.user_id = $1 AND s.season = $2",
    )
    .bind(user_id)
    .bind(season)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound("score"))
}

#[derive(sqlx::FromRow)]
struct RankedRow {
    rank: i64,
    user_id: Uuid,
    user_name: String,
    value: i64,
    season: String,
    timestamp: chrono::DateTime<chrono::Utc>,
    total_count: i64,
}

impl RankedRow {
    fn into_entry(self) -> LeaderboardEntry {
        LeaderboardEntry {
            rank: self.rank,
            user_id: self.user_id,
            user_name: self.user_name,
            value: self.value,
            season: self.season,
            timestamp: self.timestamp,
        }
    }
}

// =============================================================================
// USERS
// =============================================================================

/// Insert a new user.
///
/// # Errors
///
/// `Conflict` when the email is already registered.
pub async fn create_user(pool: &PgPool, name: &str, email: &str, password_hash: &str) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (id, name, email, password_hash)
         VALUES ($1, $2, $3, $4)
         RETURNING id, name, email, password_hash, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(pool)
    .await
    .map_err(map_insert_error)
}

/// Insert a new user and their first score in one transaction. Either both
/// rows commit or neither does.
///
/// # Errors
///
/// `Conflict` on email collision; database errors roll the transaction back.
pub async fn create_user_with_initial_score(
    pool: &PgPool,
    name: &str,
    email: &str,
    password_hash: &str,
    value: i64,
    season: &str,
) -> Result<(User, Score), StoreError> {
    let mut tx = pool.begin().await?;

    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, name, email, password_hash)
         VALUES ($1, $2, $3, $4)
         RETURNING id, name, email, password_hash, created_at, updated_at",
    )
    .bind(Uuid::new_v4())
    .bind(name)
    .bind(email)
    .bind(password_hash)
    .fetch_one(tx.as_mut())
    .await
    .map_err(map_insert_error)?;

    let score = sqlx::query_as::<_, Score>(
        "INSERT INTO scores (id, user_id, value, season, timestamp)
         VALUES ($1, $2, $3, $4, now())
         RETURNING id, user_id, value, season, metadata, timestamp",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(value)
    .bind(season)
    .fetch_one(tx.as_mut())
    .await?;

    tx.commit().await?;
    Ok((user, score))
}

/// Fetch a user by id.
///
/// # Errors
///
/// `NotFound` when absent.
pub async fn find_user(pool: &PgPool, user_id: Uuid) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, created_at, updated_at FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound("user"))
}

/// Fetch a user by normalized email.
///
/// # Errors
///
/// `NotFound` when absent.
pub async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<User, StoreError> {
    sqlx::query_as::<_, User>(
        "SELECT id, name, email, password_hash, created_at, updated_at FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?
    .ok_or(StoreError::NotFound("user"))
}

/// Delete a user; the FK cascade removes their scores.
///
/// # Errors
///
/// `NotFound` when absent.
pub async fn delete_user(pool: &PgPool, user_id: Uuid) -> Result<(), StoreError> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound("user"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
