//! Traffic simulator — registers demo players and submits randomized scores
//! against a running server through the public API.
//!
//! Useful for watching live subscribers move: point a WebSocket client at
//! the same season and let this run.

use std::time::Duration;

use clap::Parser;
use rand::Rng;
use serde::Deserialize;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "simulator", about = "Podium leaderboard traffic generator")]
struct Args {
    #[arg(long, env = "PODIUM_BASE_URL", default_value = "http://127.0.0.1:8080")]
    base_url: String,

    /// Number of demo players to register.
    #[arg(long, default_value_t = 8)]
    players: usize,

    /// Season to submit into.
    #[arg(long, default_value = "global")]
    season: String,

    /// Seconds between submissions.
    #[arg(long, default_value_t = 5)]
    interval: u64,

    /// Largest random score submitted.
    #[arg(long, default_value_t = 10_000)]
    max_value: i64,
}

#[derive(Debug, thiserror::Error)]
enum SimError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server rejected {action}: {status}")]
    Rejected { action: &'static str, status: reqwest::StatusCode },
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    data: T,
}

struct Player {
    name: String,
    token: String,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let client = reqwest::Client::new();
    let run_tag: u32 = rand::rng().random();

    let mut players = Vec::with_capacity(args.players);
    for i in 0..args.players {
        let name = format!("sim-player-{i}");
        let email = format!("sim-{run_tag}-{i}@example.test");
        match register_and_login(&client, &args.base_url, &name, &email).await {
            Ok(player) => players.push(player),
            Err(e) => {
                error!(error = %e, name, "failed to provision player");
            }
        }
    }

    if players.is_empty() {
        error!("no players provisioned; is the server running?");
        std::process::exit(1);
    }

    info!(count = players.len(), season = %args.season, interval = args.interval, "simulation loop starting");

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval));
    loop {
        ticker.tick().await;

        let idx = rand::rng().random_range(0..players.len());
        let value = rand::rng().random_range(0..=args.max_value);
        let player = &players[idx];

        match submit_score(&client, &args.base_url, &player.token, &args.season, value).await {
            Ok(()) => info!(player = %player.name, value, "score submitted"),
            Err(e) => error!(error = %e, player = %player.name, "submission failed"),
        }
    }
}

async fn register_and_login(
    client: &reqwest::Client,
    base_url: &str,
    name: &str,
    email: &str,
) -> Result<Player, SimError> {
    let password = "simulator-pass";

    let response = client
        .post(format!("{base_url}/api/v1/auth/register"))
        .json(&serde_json::json!({ "name": name, "email": email, "password": password }))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(SimError::Rejected { action: "register", status: response.status() });
    }

    let response = client
        .post(format!("{base_url}/api/v1/auth/login"))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(SimError::Rejected { action: "login", status: response.status() });
    }
    let login: ApiEnvelope<LoginData> = response.json().await?;

    Ok(Player { name: name.to_owned(), token: login.data.token })
}

async fn submit_score(
    client: &reqwest::Client,
    base_url: &str,
    token: &str,
    season: &str,
    value: i64,
) -> Result<(), SimError> {
    let response = client
        .post(format!("{base_url}/api/v1/submit-score"))
        .bearer_auth(token)
        .json(&serde_json::json!({ "value": value, "season": season }))
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(SimError::Rejected { action: "submit-score", status: response.status() });
    }
    Ok(())
}
