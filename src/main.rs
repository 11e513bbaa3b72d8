#![allow(dead_code)]

mod cache;
mod config;
mod db;
mod hub;
mod models;
mod ranking;
mod rate_limit;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use crate::hub::{Hub, HubConfig, SnapshotSource};
use crate::services::auth::AuthGate;
use crate::services::leaderboard::LeaderboardService;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = match config::Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    let pool = db::init_pool(&config.database_url, config.db_max_conns, config.db_min_conns)
        .await
        .expect("database init failed");

    // Cache is optional: without it the service reads the Store directly.
    let cache = match &config.redis_url {
        Some(url) => match cache::Cache::connect(url, config.cache_ttl).await {
            Ok(cache) => Some(cache),
            Err(e) => {
                tracing::warn!(error = %e, "cache not available; running uncached");
                None
            }
        },
        None => {
            tracing::info!("no REDIS_URL configured; running uncached");
            None
        }
    };

    let auth = AuthGate::new(&config.auth);

    // The hub's tick needs the service as its snapshot source, and the
    // service needs the hub handle for write-triggered broadcasts. The
    // two-phase builder keeps that a construction detail rather than a
    // runtime cycle: neither side ever names the other's type.
    let (hub, launcher) = Hub::builder(HubConfig {
        broadcast_interval: config.ws.broadcast_interval,
        default_limit: config.ws.default_limit,
    });
    let service = Arc::new(LeaderboardService::new(
        pool.clone(),
        cache.clone(),
        hub.clone(),
        auth.clone(),
        config.clone(),
    ));
    let hub_task = launcher.start(Arc::clone(&service) as Arc<dyn SnapshotSource>);

    let app_state = state::AppState::new(pool, cache, hub.clone(), service, auth, config.clone());
    let app = routes::app(app_state);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .expect("failed to bind");

    tracing::info!(port = config.port, "podium listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    // Cascade: closing the hub closes every subscriber queue, which ends
    // the per-connection write loops.
    hub.shutdown().await;
    let _ = hub_task.await;
    tracing::info!("podium stopped");
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
