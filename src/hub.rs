//! SubscriberHub — registry, periodic tick, and broadcast fan-out.
//!
//! DESIGN
//! ======
//! One task owns every piece of subscriber state. Registration, removal,
//! fan-out, stats, and shutdown all arrive as commands on a single channel
//! and are applied in order, so no two broadcasts to the same subscriber can
//! interleave and the registry never needs a lock.
//!
//! The periodic tick does not read the database itself: the hub is built
//! with a `SnapshotSource` and calls it with each populated season's maximum
//! requested limit. Fetches run in their own tasks under a deadline; their
//! terminal step re-enters the loop as a `Broadcast` command. Subscribers
//! joining or leaving mid-fetch never abort an assembly in flight.
//!
//! BACKPRESSURE
//! ============
//! Send queues are bounded at 256. A subscriber whose queue is full at
//! fan-out time is a slow consumer: it is removed from the registry and its
//! queue is closed in the same step. No retry, no resize.
//!
//! Identical consecutive envelopes are delivered anyway: initial snapshots,
//! reconnects, and liveness all depend on redelivery, so there is no
//! content-hash suppression.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::Envelope;

/// Depth of each subscriber's send queue.
pub const SEND_QUEUE_DEPTH: usize = 256;

/// Depth of the hub command channel.
const COMMAND_QUEUE_DEPTH: usize = 256;

/// Deadline for one periodic snapshot fetch.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// SNAPSHOT SOURCE
// =============================================================================

/// Fetches a fresh ranked snapshot for broadcast assembly. Injected at hub
/// construction; the hub never learns who implements it.
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Assemble an envelope of up to `limit` entries for a season. `None`
    /// means the fetch failed and was already logged; ticks must not raise.
    async fn fetch(&self, season: &str, limit: usize) -> Option<Envelope>;
}

// =============================================================================
// SUBSCRIBER
// =============================================================================

/// One live subscription as the hub sees it. The write loop holds the
/// receiving half of `tx`; dropping `tx` is how the hub closes a queue.
pub struct Subscriber {
    pub id: Uuid,
    pub user_id: Uuid,
    pub season: String,
    /// Mutable from the connection's read loop, read by the hub at fan-out.
    pub requested_limit: Arc<AtomicUsize>,
    pub tx: mpsc::Sender<String>,
}

impl Subscriber {
    fn limit(&self) -> usize {
        self.requested_limit.load(Ordering::Relaxed).max(1)
    }
}

/// Hub statistics for the stats endpoint.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HubStats {
    pub total_subscribers: usize,
    pub seasons: HashMap<String, usize>,
}

enum Command {
    Register(Subscriber),
    Unregister { season: String, id: Uuid },
    Broadcast(Envelope),
    Stats(oneshot::Sender<HubStats>),
    Shutdown,
}

// =============================================================================
// HANDLE
// =============================================================================

/// Cheap clonable handle for submitting commands to the hub loop.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::Sender<Command>,
}

impl HubHandle {
    /// Add a subscriber to its season bucket.
    pub async fn register(&self, subscriber: Subscriber) {
        let _ = self.tx.send(Command::Register(subscriber)).await;
    }

    /// Remove a subscriber; its queue closes and empty buckets are pruned.
    pub async fn unregister(&self, season: &str, id: Uuid) {
        let _ = self
            .tx
            .send(Command::Unregister { season: season.to_owned(), id })
            .await;
    }

    /// Queue an envelope for fan-out. Non-blocking: if the command queue is
    /// full the envelope is dropped; the next tick supersedes it.
    pub fn broadcast(&self, envelope: Envelope) {
        if let Err(e) = self.tx.try_send(Command::Broadcast(envelope)) {
            warn!(error = %e, "hub command queue full; dropping broadcast");
        }
    }

    /// Snapshot of subscriber counts.
    pub async fn stats(&self) -> Option<HubStats> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(Command::Stats(reply)).await.ok()?;
        rx.await.ok()
    }

    /// Close every subscriber queue and stop the loop.
    pub async fn shutdown(&self) {
        let _ = self.tx.send(Command::Shutdown).await;
    }
}

// =============================================================================
// HUB
// =============================================================================

#[derive(Debug, Clone, Copy)]
pub struct HubConfig {
    pub broadcast_interval: Duration,
    /// Floor for the per-season max limit computed at tick time.
    pub default_limit: usize,
}

pub struct Hub {
    registry: HashMap<String, HashMap<Uuid, Subscriber>>,
    rx: mpsc::Receiver<Command>,
    handle: HubHandle,
    source: Arc<dyn SnapshotSource>,
    config: HubConfig,
}

/// First construction phase: the command handle exists before the loop
/// starts, so the snapshot source being injected can itself hold the handle
/// for write-triggered broadcasts. Commands sent before `start` are buffered
/// on the channel.
pub struct HubLauncher {
    rx: mpsc::Receiver<Command>,
    handle: HubHandle,
    config: HubConfig,
}

impl HubLauncher {
    /// Second phase: inject the source and start the loop.
    pub fn start(self, source: Arc<dyn SnapshotSource>) -> JoinHandle<()> {
        let hub = Hub { registry: HashMap::new(), rx: self.rx, handle: self.handle, source, config: self.config };
        tokio::spawn(hub.run())
    }
}

impl Hub {
    /// Create the command handle and a launcher holding the receiving half.
    #[must_use]
    pub fn builder(config: HubConfig) -> (HubHandle, HubLauncher) {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let handle = HubHandle { tx };
        (handle.clone(), HubLauncher { rx, handle, config })
    }

    /// Single-phase spawn for callers with no construction cycle.
    #[must_use]
    pub fn spawn(config: HubConfig, source: Arc<dyn SnapshotSource>) -> (HubHandle, JoinHandle<()>) {
        let (handle, launcher) = Self::builder(config);
        let task = launcher.start(source);
        (handle, task)
    }

    async fn run(mut self) {
        info!(
            interval_secs = self.config.broadcast_interval.as_secs(),
            default_limit = self.config.default_limit,
            "subscriber hub started"
        );

        let mut ticker = tokio::time::interval(self.config.broadcast_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // interval() fires immediately; burn the first tick so startup does
        // not race the first registration.
        ticker.tick().await;

        loop {
            tokio::select! {
                cmd = self.rx.recv() => match cmd {
                    Some(Command::Register(sub)) => self.register(sub),
                    Some(Command::Unregister { season, id }) => self.unregister(&season, id),
                    Some(Command::Broadcast(envelope)) => self.fan_out(&envelope),
                    Some(Command::Stats(reply)) => {
                        let _ = reply.send(self.stats());
                    }
                    Some(Command::Shutdown) | None => break,
                },
                _ = ticker.tick() => self.spawn_periodic_fetches(),
            }
        }

        let total = self.registry.values().map(HashMap::len).sum::<usize>();
        self.registry.clear();
        info!(closed = total, "subscriber hub shut down");
    }

    fn register(&mut self, sub: Subscriber) {
        let season = sub.season.clone();
        let bucket = self.registry.entry(season.clone()).or_default();
        bucket.insert(sub.id, sub);
        info!(%season, subscribers = bucket.len(), "subscriber registered");
    }

    fn unregister(&mut self, season: &str, id: Uuid) {
        let Some(bucket) = self.registry.get_mut(season) else {
            return;
        };
        // Dropping the entry drops its sender, which closes the send queue
        // and unblocks the connection's write loop.
        if bucket.remove(&id).is_some() {
            info!(%season, %id, remaining = bucket.len(), "subscriber unregistered");
        }
        let empty = bucket.is_empty();
        if empty {
            self.registry.remove(season);
        }
    }

    /// Deliver an envelope to every subscriber of its season, each projected
    /// to that subscriber's requested limit.
    fn fan_out(&mut self, envelope: &Envelope) {
        let Some(bucket) = self.registry.get_mut(&envelope.season) else {
            debug!(season = %envelope.season, "no subscribers for broadcast");
            return;
        };

        let mut dropped = Vec::new();
        let mut sent = 0usize;

        for (id, sub) in bucket.iter() {
            let payload = match envelope.serialize_for(sub.limit()) {
                Ok(p) => p,
                Err(e) => {
                    warn!(error = %e, "failed to serialize broadcast payload");
                    continue;
                }
            };
            match sub.tx.try_send(payload) {
                Ok(()) => sent += 1,
                Err(mpsc::error::TrySendError::Full(_) | mpsc::error::TrySendError::Closed(_)) => {
                    dropped.push(*id);
                }
            }
        }

        for id in &dropped {
            if let Some(sub) = bucket.remove(id) {
                warn!(season = %sub.season, user_id = %sub.user_id, "send queue full; dropping subscriber");
            }
        }
        let empty = bucket.is_empty();
        if empty {
            self.registry.remove(&envelope.season);
        }

        debug!(
            season = %envelope.season,
            entries = envelope.page.entries.len(),
            sent,
            dropped = dropped.len(),
            "broadcast fan-out complete"
        );
    }

    /// For each populated season, fetch a fresh snapshot sized to the
    /// largest limit any of its subscribers wants. One task per season; the
    /// fetch deadline, not subscriber churn, bounds each task.
    fn spawn_periodic_fetches(&self) {
        for (season, bucket) in &self.registry {
            let max_limit = bucket
                .values()
                .map(Subscriber::limit)
                .max()
                .unwrap_or(0)
                .max(self.config.default_limit);

            let season = season.clone();
            let source = Arc::clone(&self.source);
            let handle = self.handle.clone();
            tokio::spawn(async move {
                match tokio::time::timeout(FETCH_TIMEOUT, source.fetch(&season, max_limit)).await {
                    Ok(Some(envelope)) => handle.broadcast(envelope),
                    Ok(None) => {}
                    Err(_) => warn!(%season, "periodic snapshot fetch timed out"),
                }
            });
        }
    }

    fn stats(&self) -> HubStats {
        HubStats {
            total_subscribers: self.registry.values().map(HashMap::len).sum(),
            seasons: self
                .registry
                .iter()
                .map(|(season, bucket)| (season.clone(), bucket.len()))
                .collect(),
        }
    }
}

#[cfg(test)]
#[path = "hub_test.rs"]
mod tests;
