//! Redis read-through cache for point lookups.
//!
//! DESIGN
//! ======
//! Only single-row lookups and counts are cached: `user:id:{id}`,
//! `user:email:{email}`, `score:{user_id}:{season}`, `count:{season}`.
//! Ranked page projections are never cached: rank is a whole-season
//! property, so one score change invalidates every page of every sort
//! order, and the broadcast cadence refetches within seconds anyway.
//!
//! ERROR HANDLING
//! ==============
//! Read failures degrade to the Store (callers log and fall through). Write
//! invalidation is different: it runs on the submit path ahead of the
//! broadcast trigger, and its failure propagates to the caller.

use std::time::Duration;

use redis::AsyncCommands;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::CacheTtlConfig;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Shared handle to the Redis connection. Cloning is cheap; the multiplexed
/// connection fans concurrent commands over one socket.
#[derive(Clone)]
pub struct Cache {
    conn: redis::aio::MultiplexedConnection,
    ttl: CacheTtlConfig,
}

pub fn user_id_key(id: Uuid) -> String {
    format!("user:id:{id}")
}

pub fn user_email_key(email: &str) -> String {
    format!("user:email:{email}")
}

pub fn score_key(user_id: Uuid, season: &str) -> String {
    format!("score:{user_id}:{season}")
}

pub fn count_key(season: &str) -> String {
    format!("count:{season}")
}

fn leaderboard_prefix(season: &str) -> String {
    format!("leaderboard:{season}:")
}

impl Cache {
    /// Connect to Redis and verify the link with a ping.
    ///
    /// # Errors
    ///
    /// Returns a Redis error if the server is unreachable.
    pub async fn connect(url: &str, ttl: CacheTtlConfig) -> Result<Self, CacheError> {
        let client = redis::Client::open(url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("cache connection established");
        Ok(Self { conn, ttl })
    }

    /// Liveness probe for the readiness endpoint.
    ///
    /// # Errors
    ///
    /// Returns a Redis error if the server does not answer.
    pub async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    /// Fetch and deserialize a cached value. `None` on miss.
    ///
    /// # Errors
    ///
    /// Returns a Redis or deserialization error.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(key).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Serialize and store a value under the given TTL.
    ///
    /// # Errors
    ///
    /// Returns a Redis or serialization error.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(value)?;
        let _: () = conn.set_ex(key, json, ttl.as_secs()).await?;
        Ok(())
    }

    pub async fn get_i64(&self, key: &str) -> Result<Option<i64>, CacheError> {
        let mut conn = self.conn.clone();
        Ok(conn.get(key).await?)
    }

    pub async fn set_i64(&self, key: &str, value: i64, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs()).await?;
        Ok(())
    }

    /// Delete keys, ignoring ones that do not exist.
    ///
    /// # Errors
    ///
    /// Returns a Redis error if the command fails.
    pub async fn delete(&self, keys: &[String]) -> Result<(), CacheError> {
        if keys.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = conn.del(keys).await?;
        Ok(())
    }

    /// Delete every key under a prefix via SCAN, so externally maintained
    /// page caches cannot outlive a score change.
    ///
    /// # Errors
    ///
    /// Returns a Redis error if the scan or delete fails.
    pub async fn delete_prefix(&self, prefix: &str) -> Result<(), CacheError> {
        let mut scan_conn = self.conn.clone();
        let pattern = format!("{prefix}*");
        let keys: Vec<String> = {
            let mut iter = scan_conn.scan_match::<_, String>(&pattern).await?;
            let mut collected = Vec::new();
            while let Some(key) = iter.next_item().await {
                collected.push(key);
            }
            collected
        };

        if !keys.is_empty() {
            debug!(prefix, count = keys.len(), "deleting cached keys");
            self.delete(&keys).await?;
        }
        Ok(())
    }

    /// Invalidate everything a score upsert can make stale: the score row,
    /// the season count, and any season page keys. Runs to completion before
    /// the caller triggers a broadcast.
    ///
    /// # Errors
    ///
    /// Returns a Redis error if any delete fails.
    pub async fn invalidate_score(&self, user_id: Uuid, season: &str) -> Result<(), CacheError> {
        self.delete(&[score_key(user_id, season), count_key(season)]).await?;
        self.delete_prefix(&leaderboard_prefix(season)).await
    }

    pub fn user_ttl(&self) -> Duration {
        self.ttl.user
    }

    pub fn score_ttl(&self) -> Duration {
        self.ttl.score
    }

    pub fn count_ttl(&self) -> Duration {
        self.ttl.count
    }
}

#[cfg(test)]
#[path = "cache_test.rs"]
mod tests;
