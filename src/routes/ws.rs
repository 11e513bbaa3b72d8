//! WebSocket subscription handler.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade: credential from the bearer header or the `token` query
//!    parameter (browsers cannot set headers on upgrade; both are treated
//!    identically), season from the query.
//! 2. Register with the hub, then immediately queue the initial snapshot.
//! 3. Two loops per connection:
//!    - read: arms a pong deadline, re-arms it on each pong, applies
//!      `update_limit` control frames, and owns unregistration on any exit.
//!    - write: drains the send queue under a write deadline and pings on a
//!      ticker that outpaces the pong deadline.
//! 4. The hub closing the send queue (unregister, slow-consumer drop, or
//!    shutdown) ends the write loop; the closed socket then wakes the read
//!    loop, which unregisters (a no-op if the hub already dropped us).

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::hub::{Subscriber, SEND_QUEUE_DEPTH};
use crate::models::ControlFrame;
use crate::services::auth::bearer_token;
use crate::services::leaderboard::resolve_season;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SubscribeParams {
    pub season: Option<String>,
    pub token: Option<String>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<SubscribeParams>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let credential = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .map(str::to_owned)
        .or_else(|| params.token.clone());

    let Some(credential) = credential else {
        return (StatusCode::UNAUTHORIZED, "credential required").into_response();
    };
    let user_id = match state.auth.validate(&credential) {
        Ok(claims) => claims.sub,
        Err(_) => return (StatusCode::UNAUTHORIZED, "invalid or expired credential").into_response(),
    };

    let season = resolve_season(params.season.as_deref());
    let max_frame = state.config.ws.max_frame_bytes;

    ws.max_message_size(max_frame)
        .on_upgrade(move |socket| run_subscription(socket, state, user_id, season))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_subscription(socket: WebSocket, state: AppState, user_id: Uuid, season: String) {
    let subscriber_id = Uuid::new_v4();
    let requested_limit = Arc::new(AtomicUsize::new(state.config.ws.default_limit));
    let (queue_tx, queue_rx) = mpsc::channel::<String>(SEND_QUEUE_DEPTH);

    let subscriber = Subscriber {
        id: subscriber_id,
        user_id,
        season: season.clone(),
        requested_limit: Arc::clone(&requested_limit),
        tx: queue_tx,
    };

    info!(%subscriber_id, %user_id, %season, "subscriber connected");

    // Snapshot before the hub owns the subscriber: the struct carries its
    // own queue sender, so delivery cannot race registration.
    state.service.send_initial_snapshot(&subscriber).await;
    state.hub.register(subscriber).await;

    let (sink, stream) = socket.split();
    let write = tokio::spawn(write_loop(sink, queue_rx, state.clone()));

    read_loop(stream, &state, &requested_limit).await;

    // The read side owns unregistration; the hub drops the queue sender,
    // which closes the queue and lets the write loop drain out. Every write
    // carries a deadline, so the join is bounded even on a wedged socket.
    state.hub.unregister(&season, subscriber_id).await;
    let _ = write.await;
    info!(%subscriber_id, %user_id, %season, "subscriber disconnected");
}

// =============================================================================
// READ LOOP
// =============================================================================

/// Consume inbound frames until the connection dies or the client misses a
/// pong deadline. The only recognized control message updates the
/// subscriber's requested limit.
async fn read_loop(mut stream: SplitStream<WebSocket>, state: &AppState, requested_limit: &Arc<AtomicUsize>) {
    let pong_wait = state.config.ws.pong_wait;
    let max_limit = state.config.ws.max_limit;

    let pong_deadline = sleep(pong_wait);
    tokio::pin!(pong_deadline);

    loop {
        tokio::select! {
            message = stream.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        apply_control_frame(&text, requested_limit, max_limit);
                    }
                    Some(Ok(Message::Pong(_))) => {
                        pong_deadline.as_mut().reset(Instant::now() + pong_wait);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "websocket read error");
                        break;
                    }
                }
            }
            () = &mut pong_deadline => {
                warn!("pong deadline missed; closing subscriber");
                break;
            }
        }
    }
}

/// Parse and apply one inbound control frame. Unknown or malformed frames
/// are ignored; the read loop is not a request surface.
fn apply_control_frame(text: &str, requested_limit: &AtomicUsize, max_limit: usize) {
    match serde_json::from_str::<ControlFrame>(text) {
        Ok(ControlFrame::UpdateLimit { limit }) => {
            let clamped = clamp_limit(limit, max_limit);
            requested_limit.store(clamped, Ordering::Relaxed);
            info!(requested = limit, applied = clamped, "subscriber updated requested limit");
        }
        Err(e) => debug!(error = %e, "ignoring unrecognized client frame"),
    }
}

/// Clamp a client-requested limit into `[1, max_limit]`.
fn clamp_limit(limit: i64, max_limit: usize) -> usize {
    usize::try_from(limit.max(1)).unwrap_or(1).min(max_limit)
}

// =============================================================================
// WRITE LOOP
// =============================================================================

/// Drain queued payloads to the socket and keep the heartbeat alive. Exits
/// when the hub closes the queue or a write fails.
async fn write_loop(mut sink: SplitSink<WebSocket, Message>, mut queue: mpsc::Receiver<String>, state: AppState) {
    let write_wait = state.config.ws.write_wait;
    let mut ping = tokio::time::interval(state.config.ws.ping_period);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    // The first interval tick fires immediately; skip it so the initial
    // snapshot goes out before any ping.
    ping.tick().await;

    loop {
        tokio::select! {
            payload = queue.recv() => {
                match payload {
                    Some(json) => {
                        match timeout(write_wait, sink.send(Message::Text(json.into()))).await {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => {
                                debug!(error = %e, "websocket write failed");
                                break;
                            }
                            Err(_) => {
                                warn!("websocket write deadline exceeded");
                                break;
                            }
                        }
                    }
                    None => {
                        // Queue closed by the hub: polite close, then exit.
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
            _ = ping.tick() => {
                match timeout(write_wait, sink.send(Message::Ping(Vec::new().into()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(_)) | Err(_) => break,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
