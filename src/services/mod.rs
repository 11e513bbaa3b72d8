//! Service layer: authentication and leaderboard orchestration.

pub mod auth;
pub mod leaderboard;
