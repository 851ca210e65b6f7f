//! Data models for the Shacker backend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod auth;
pub use auth::*;

/// Player account
#[derive(Debug, sqlx::FromRow, Clone)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    /// bcrypt hash; `None` for wallet-only accounts
    pub password_hash: Option<String>,
    /// Always lower-cased
    pub wallet_address: Option<String>,
    pub wallet_verified: bool,
    pub wallet_linked_at: Option<DateTime<Utc>>,
    pub is_banned: bool,
    pub games_today: i32,
    pub last_game_date: Option<DateTime<Utc>>,
    pub total_games: i32,
    pub best_score: i64,
    pub has_nft: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when an account is created
#[derive(Debug, Clone, Default)]
pub struct NewAccount {
    pub username: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub wallet_address: Option<String>,
    pub has_nft: bool,
}

/// One accepted score submission (append-only)
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct GameSession {
    pub id: Uuid,
    pub account_id: Uuid,
    pub score: i64,
    pub level: i32,
    pub created_at: DateTime<Utc>,
}

/// Leaderboard row, shared by the store query and the JSONBin mirror
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub name: String,
    pub score: i64,
    #[serde(default)]
    pub level: i32,
    #[serde(default)]
    pub date: DateTime<Utc>,
}

/// Link session status
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    Pending,
    Completed,
}

impl LinkStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkStatus::Pending => "pending",
            LinkStatus::Completed => "completed",
        }
    }
}

/// Cross-device wallet link handshake
#[derive(Debug, Clone)]
pub struct LinkSession {
    pub id: String,
    pub account_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: LinkStatus,
    pub wallet_address: Option<String>,
}

impl LinkSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
