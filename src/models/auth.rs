//! Request/response DTOs for the HTTP surface
//!
//! Field names follow what the game client already sends and reads:
//! camelCase for most bodies, snake_case where the wallet connector uses it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

// ============================================================================
// Password authentication
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Length is checked on the trimmed name at registration
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Returned by `/register` and `/login`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub success: bool,
    pub token: String,
    pub username: String,
    pub games_left: u32,
}

// ============================================================================
// Play quota and scores
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanPlayResponse {
    pub can_play: bool,
    pub games_left: u32,
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct SubmitScoreRequest {
    pub score: i64,
    /// Older clients omit the level
    #[serde(default = "first_level")]
    pub level: i32,
}

fn first_level() -> i32 {
    1
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitScoreResponse {
    pub success: bool,
    pub games_left: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub username: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub total_games: i32,
    pub best_score: i64,
    pub games_today: u32,
    pub wallet_address: Option<String>,
    #[serde(rename = "hasNFT")]
    pub has_nft: bool,
    pub can_play: bool,
    pub games_left: u32,
}

// ============================================================================
// Wallet authentication
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct NonceRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct NonceResponse {
    pub nonce: String,
}

#[derive(Debug, Deserialize)]
pub struct WalletVerifyRequest {
    pub address: String,
    pub signature: String,
    pub nonce: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletAuthResponse {
    pub success: bool,
    pub token: String,
    pub username: String,
    #[serde(rename = "hasNFT")]
    pub has_nft: bool,
    pub games_left: u32,
}

#[derive(Debug, Deserialize)]
pub struct LinkWalletRequest {
    pub wallet_address: String,
    pub signature: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct LinkWalletResponse {
    pub success: bool,
    pub wallet: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckNftRequest {
    pub wallet_address: String,
}

#[derive(Debug, Serialize)]
pub struct CheckNftResponse {
    pub owns_nft: bool,
}

// ============================================================================
// Cross-device link sessions
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkSessionResponse {
    pub session_id: String,
    pub link_url: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct CheckSessionQuery {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct CheckSessionResponse {
    pub valid: bool,
    pub status: String,
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteLinkSessionRequest {
    pub session_id: String,
    pub wallet_address: String,
    pub signature: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusQuery {
    pub session_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub status: String,
    pub wallet_address: Option<String>,
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let ok = RegisterRequest {
            username: "alice".to_string(),
            email: "a@x.com".to_string(),
            password: "secret1".to_string(),
        };
        assert!(ok.validate().is_ok());

        let short = RegisterRequest {
            username: "al".to_string(),
            ..ok
        };
        assert!(short.validate().is_err());
    }

    #[test]
    fn test_wallet_auth_response_field_names() {
        let body = serde_json::to_value(WalletAuthResponse {
            success: true,
            token: "t".to_string(),
            username: "Player_abcdef".to_string(),
            has_nft: false,
            games_left: 10,
        })
        .unwrap();
        assert_eq!(body["hasNFT"], false);
        assert_eq!(body["gamesLeft"], 10);
    }
}
