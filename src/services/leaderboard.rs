//! Leaderboard service — validation, orchestration, and broadcast assembly.
//!
//! DESIGN
//! ======
//! The service owns the write→publish pipeline: a submitted score is
//! persisted, the cache entries it can stale are deleted, and only then is a
//! broadcast requested. The broadcast runs detached and reads fresh rows
//! from the Store rather than reusing what the writer had in hand, so the
//! response never waits on fan-out.
//!
//! The hub reaches back into this service only through the `SnapshotSource`
//! trait it was constructed with; the service holds the hub's command handle
//! for submit-triggered broadcasts. Neither side names the other's type.
//!
//! ERROR HANDLING
//! ==============
//! Request paths return typed errors for the routes to map onto statuses.
//! Broadcast paths never raise: failures are logged and the envelope is
//! dropped; the next tick redelivers.

use std::time::Duration;

use sqlx::PgPool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::{self, Cache};
use crate::config::Config;
use crate::hub::{HubHandle, SnapshotSource, Subscriber};
use crate::models::{
    Envelope, LeaderboardEntry, LeaderboardPage, LoginResponse, RegisterRequest, Score, SubmitScoreRequest, User,
    DEFAULT_SEASON,
};
use crate::ranking::{self, SortOrder};
use crate::services::auth::{self, AuthGate};
use crate::store::{self, StoreError};

/// Deadline for one broadcast Store read.
const BROADCAST_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum LeaderboardError {
    #[error("{0}")]
    Validation(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("invalid email or password")]
    Unauthorized,
    #[error("email already registered")]
    Conflict,
    #[error("upstream failure: {0}")]
    Upstream(String),
}

impl From<StoreError> for LeaderboardError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict => Self::Conflict,
            StoreError::Database(e) => Self::Upstream(e.to_string()),
        }
    }
}

/// Parameters of a page read, already defaulted and validated by the caller
/// boundary (see `from_params`).
#[derive(Debug, Clone)]
pub struct LeaderboardQuery {
    pub season: String,
    pub limit: i64,
    pub page: i64,
    pub order: SortOrder,
}

impl LeaderboardQuery {
    /// Resolve raw query parameters into a validated query. Missing values
    /// take the documented defaults; present-but-invalid values are
    /// rejected.
    ///
    /// # Errors
    ///
    /// `Validation` for out-of-range limit/page or unknown sort order.
    pub fn from_params(
        season: Option<&str>,
        limit: Option<i64>,
        page: Option<i64>,
        sort: Option<&str>,
    ) -> Result<Self, LeaderboardError> {
        let season = resolve_season(season);
        let limit = ranking::validate_api_limit(limit.unwrap_or(ranking::DEFAULT_API_LIMIT))
            .map_err(LeaderboardError::Validation)?;
        let page = page.unwrap_or(0);
        // Offset validity (page ≥ 0, no overflow) is checked here so the
        // store only ever sees well-formed windows.
        ranking::page_offset(page, limit).map_err(LeaderboardError::Validation)?;
        let order = SortOrder::parse(sort).map_err(LeaderboardError::Validation)?;
        Ok(Self { season, limit, page, order })
    }

    fn offset(&self) -> i64 {
        // Checked in from_params.
        self.page * self.limit
    }
}

/// Resolve an optional season tag to the stored value.
#[must_use]
pub fn resolve_season(season: Option<&str>) -> String {
    match season {
        Some(s) if !s.trim().is_empty() => s.trim().to_owned(),
        _ => DEFAULT_SEASON.to_owned(),
    }
}

// =============================================================================
// SERVICE
// =============================================================================

pub struct LeaderboardService {
    pool: PgPool,
    cache: Option<Cache>,
    hub: HubHandle,
    auth: AuthGate,
    config: Config,
}

impl LeaderboardService {
    #[must_use]
    pub fn new(pool: PgPool, cache: Option<Cache>, hub: HubHandle, auth: AuthGate, config: Config) -> Self {
        Self { pool, cache, hub, auth, config }
    }

    // -------------------------------------------------------------------------
    // ACCOUNTS
    // -------------------------------------------------------------------------

    /// Register a new player. When the request carries an initial value the
    /// user row and first score commit in one transaction.
    ///
    /// # Errors
    ///
    /// `Validation` for malformed fields, `Conflict` for a taken email.
    pub async fn register_user(&self, req: &RegisterRequest) -> Result<User, LeaderboardError> {
        let name = req.name.trim();
        if name.is_empty() || name.len() > 255 {
            return Err(LeaderboardError::Validation("name must be 1..255 characters".into()));
        }
        let email = auth::normalize_email(&req.email);
        if !email.contains('@') {
            return Err(LeaderboardError::Validation("invalid email".into()));
        }
        if req.password.len() < 8 {
            return Err(LeaderboardError::Validation("password must be at least 8 characters".into()));
        }

        let hash = auth::hash_password(&req.password)
            .map_err(|e| LeaderboardError::Upstream(e.to_string()))?;

        let user = match req.initial_value {
            Some(value) => {
                self.validate_value(value)?;
                let season = resolve_season(req.season.as_deref());
                let (user, _) =
                    store::create_user_with_initial_score(&self.pool, name, &email, &hash, value, &season).await?;
                // The seeded score changes the season's ranking right away.
                self.request_broadcast(season);
                user
            }
            None => store::create_user(&self.pool, name, &email, &hash).await?,
        };

        Ok(user)
    }

    /// Verify a login and issue a credential.
    ///
    /// # Errors
    ///
    /// `Unauthorized` for an unknown email or wrong password; callers
    /// cannot distinguish the two.
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, LeaderboardError> {
        let email = auth::normalize_email(email);
        let user = match self.find_user_by_email_cached(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(LeaderboardError::Unauthorized),
            Err(e) => return Err(e.into()),
        };

        if !auth::verify_password(password, &user.password_hash) {
            return Err(LeaderboardError::Unauthorized);
        }

        let (token, expires_at) = self
            .auth
            .issue(user.id, &user.email)
            .map_err(|e| LeaderboardError::Upstream(e.to_string()))?;
        Ok(LoginResponse { token, user_id: user.id, expires_at })
    }

    // -------------------------------------------------------------------------
    // SCORES
    // -------------------------------------------------------------------------

    /// Submit or replace the subject's score for a season.
    ///
    /// The write commits, cache invalidation completes, and only then is the
    /// broadcast requested; the broadcast itself runs detached and reads
    /// fresh state.
    ///
    /// # Errors
    ///
    /// `Validation` when the value is out of configured bounds; `Upstream`
    /// when the Store or the invalidation fails.
    pub async fn submit_score(&self, subject: Uuid, req: &SubmitScoreRequest) -> Result<Score, LeaderboardError> {
        let season = resolve_season(req.season.as_deref());
        self.validate_value(req.value)?;

        let score = store::upsert_score(&self.pool, subject, req.value, &season, req.metadata.as_ref()).await?;

        if let Some(cache) = &self.cache {
            // A stale score or count must not be readable once the submit
            // response lands, so invalidation failure fails the request
            // (the row itself is already committed).
            cache
                .invalidate_score(subject, &season)
                .await
                .map_err(|e| LeaderboardError::Upstream(e.to_string()))?;
        }

        self.request_broadcast(season);
        Ok(score)
    }

    /// One page of the ranked season view.
    ///
    /// # Errors
    ///
    /// `Upstream` if the Store fails.
    pub async fn get_leaderboard(&self, query: &LeaderboardQuery) -> Result<LeaderboardPage, LeaderboardError> {
        let (entries, total) =
            store::ranked_page(&self.pool, &query.season, query.limit, query.offset(), query.order).await?;
        // An empty page (offset past the end, or an empty season) carries no
        // window total; the cached count answers for it.
        let total_count = match total {
            Some(total) => total,
            None => self.count_season(Some(&query.season)).await?,
        };
        Ok(build_page(entries, total_count, query.page, query.limit))
    }

    /// One user's ranked entry.
    ///
    /// # Errors
    ///
    /// `NotFound` when the user has no score in the season.
    pub async fn get_user_rank(&self, user_id: Uuid, season: Option<&str>) -> Result<LeaderboardEntry, LeaderboardError> {
        let season = resolve_season(season);
        Ok(store::rank_of(&self.pool, user_id, &season).await?)
    }

    /// One user's raw score row, read through the cache.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    pub async fn get_user_score(&self, user_id: Uuid, season: Option<&str>) -> Result<Score, LeaderboardError> {
        let season = resolve_season(season);

        if let Some(cache) = &self.cache {
            let key = cache::score_key(user_id, &season);
            match cache.get_json::<Score>(&key).await {
                Ok(Some(score)) => return Ok(score),
                Ok(None) => {}
                Err(e) => debug!(error = %e, "score cache read failed; falling through"),
            }

            let score = store::find_score(&self.pool, user_id, &season).await?;
            if let Err(e) = cache.set_json(&key, &score, cache.score_ttl()).await {
                debug!(error = %e, "score cache write failed");
            }
            return Ok(score);
        }

        Ok(store::find_score(&self.pool, user_id, &season).await?)
    }

    /// Season population, read through the cache.
    ///
    /// # Errors
    ///
    /// `Upstream` if the Store fails.
    pub async fn count_season(&self, season: Option<&str>) -> Result<i64, LeaderboardError> {
        let season = resolve_season(season);

        if let Some(cache) = &self.cache {
            let key = cache::count_key(&season);
            match cache.get_i64(&key).await {
                Ok(Some(count)) => return Ok(count),
                Ok(None) => {}
                Err(e) => debug!(error = %e, "count cache read failed; falling through"),
            }

            let count = store::count_season(&self.pool, &season).await?;
            if let Err(e) = cache.set_i64(&key, count, cache.count_ttl()).await {
                debug!(error = %e, "count cache write failed");
            }
            return Ok(count);
        }

        Ok(store::count_season(&self.pool, &season).await?)
    }

    /// One user by id, read through the cache.
    ///
    /// # Errors
    ///
    /// `NotFound` when absent.
    pub async fn get_user(&self, user_id: Uuid) -> Result<User, LeaderboardError> {
        if let Some(cache) = &self.cache {
            let key = cache::user_id_key(user_id);
            match cache.get_json::<User>(&key).await {
                Ok(Some(user)) => return Ok(user),
                Ok(None) => {}
                Err(e) => debug!(error = %e, "user cache read failed; falling through"),
            }

            let user = store::find_user(&self.pool, user_id).await?;
            if let Err(e) = cache.set_json(&key, &user, cache.user_ttl()).await {
                debug!(error = %e, "user cache write failed");
            }
            return Ok(user);
        }

        Ok(store::find_user(&self.pool, user_id).await?)
    }

    // -------------------------------------------------------------------------
    // BROADCAST PIPELINE
    // -------------------------------------------------------------------------

    /// Deliver the current ranked prefix straight into a new subscriber's
    /// queue. A full queue drops the snapshot; the next tick supersedes it.
    pub async fn send_initial_snapshot(&self, subscriber: &Subscriber) {
        let limit = subscriber
            .requested_limit
            .load(std::sync::atomic::Ordering::Relaxed)
            .max(1);

        let Some(envelope) = self.assemble_envelope(&subscriber.season, limit).await else {
            return;
        };
        match envelope.serialize_for(limit) {
            Ok(payload) => {
                if subscriber.tx.try_send(payload).is_err() {
                    warn!(season = %subscriber.season, "initial snapshot dropped: send queue full");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize initial snapshot"),
        }
    }

    /// Fire-and-forget broadcast for a season after a write. The spawned
    /// task re-reads the Store, so it always observes the committed row.
    fn request_broadcast(&self, season: String) {
        let pool = self.pool.clone();
        let hub = self.hub.clone();
        let ws = self.config.ws;
        tokio::spawn(async move {
            let assembler = EnvelopeAssembler { pool };
            match tokio::time::timeout(BROADCAST_FETCH_TIMEOUT, assembler.assemble(&season, ws.max_limit)).await {
                Ok(Some(envelope)) => hub.broadcast(envelope),
                Ok(None) => {}
                Err(_) => warn!(%season, "broadcast assembly timed out"),
            }
        });
    }

    async fn assemble_envelope(&self, season: &str, limit: usize) -> Option<Envelope> {
        EnvelopeAssembler { pool: self.pool.clone() }.assemble(season, limit).await
    }

    fn validate_value(&self, value: i64) -> Result<(), LeaderboardError> {
        let v = self.config.validation;
        if value < v.min_score {
            return Err(LeaderboardError::Validation(format!("value cannot be less than {}", v.min_score)));
        }
        if value > v.max_score {
            return Err(LeaderboardError::Validation(format!("value exceeds maximum of {}", v.max_score)));
        }
        Ok(())
    }

    async fn find_user_by_email_cached(&self, email: &str) -> Result<User, StoreError> {
        if let Some(cache) = &self.cache {
            let key = cache::user_email_key(email);
            match cache.get_json::<User>(&key).await {
                Ok(Some(user)) => return Ok(user),
                Ok(None) => {}
                Err(e) => debug!(error = %e, "user cache read failed; falling through"),
            }

            let user = store::find_user_by_email(&self.pool, email).await?;
            if let Err(e) = cache.set_json(&key, &user, cache.user_ttl()).await {
                debug!(error = %e, "user cache write failed");
            }
            return Ok(user);
        }

        store::find_user_by_email(&self.pool, email).await
    }
}

/// Fresh-read envelope assembly shared by the submit path and the periodic
/// tick. Failures are logged here and surface as `None`; broadcast callers
/// have nothing useful to do with them.
struct EnvelopeAssembler {
    pool: PgPool,
}

impl EnvelopeAssembler {
    async fn assemble(&self, season: &str, limit: usize) -> Option<Envelope> {
        let limit = ranking::clamp_internal_limit(limit);
        match store::ranked_page(&self.pool, season, limit, 0, SortOrder::Desc).await {
            Ok((entries, total)) => {
                // Offset is zero here, so an absent total means an empty
                // season.
                let page = build_page(entries, total.unwrap_or(0), 0, limit);
                Some(Envelope::new(season, page))
            }
            Err(e) => {
                warn!(error = %e, %season, "failed to assemble broadcast envelope");
                None
            }
        }
    }
}

#[async_trait::async_trait]
impl SnapshotSource for LeaderboardService {
    async fn fetch(&self, season: &str, limit: usize) -> Option<Envelope> {
        self.assemble_envelope(season, limit).await
    }
}

/// Attach pagination metadata to a fetched page.
#[must_use]
pub fn build_page(entries: Vec<LeaderboardEntry>, total_count: i64, page: i64, limit: i64) -> LeaderboardPage {
    let has_next = entries.len() as i64 == limit;
    let next_cursor = ranking::next_cursor(&entries, limit);
    LeaderboardPage { entries, total_count, page, limit, has_next, next_cursor }
}

#[cfg(test)]
#[path = "leaderboard_test.rs"]
mod tests;
