//! Shacker Backend Library
//!
//! Session/identity and play-quota authority for the Shacker game: password
//! and wallet authentication, session tokens, daily play limits, scores and
//! cross-device wallet linking.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod leaderboard;
pub mod link;
pub mod middleware;
pub mod models;
pub mod quota;
pub mod routes;
pub mod state;
pub mod store;
