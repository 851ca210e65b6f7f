//! Play quota, score submission and leaderboard handlers

use axum::{extract::State, Json};
use chrono::Utc;

use super::{ApiJson, AuthenticatedPlayer};
use crate::error::ApiError;
use crate::leaderboard::LEADERBOARD_SIZE;
use crate::models::{
    CanPlayResponse, LeaderboardEntry, ProfileResponse, SubmitScoreRequest, SubmitScoreResponse,
};
use crate::quota::rolled_over_count;
use crate::state::AppState;

/// GET /can-play - Remaining games for today
pub async fn can_play(
    State(state): State<AppState>,
    player: AuthenticatedPlayer,
) -> Result<Json<CanPlayResponse>, ApiError> {
    let (account, status) = state.quota.can_play(player.account_id).await?;

    Ok(Json(CanPlayResponse {
        can_play: status.allowed && !account.is_banned,
        games_left: status.remaining,
        limit: status.limit,
    }))
}

/// POST /scores - Record a finished game
pub async fn submit_score(
    State(state): State<AppState>,
    player: AuthenticatedPlayer,
    ApiJson(req): ApiJson<SubmitScoreRequest>,
) -> Result<Json<SubmitScoreResponse>, ApiError> {
    let receipt = state
        .quota
        .record_play(player.account_id, req.score, req.level)
        .await?;

    Ok(Json(SubmitScoreResponse {
        success: true,
        games_left: receipt.games_left,
    }))
}

/// GET /scores - Top game sessions, highest first
pub async fn get_scores(
    State(state): State<AppState>,
) -> Result<Json<Vec<LeaderboardEntry>>, ApiError> {
    let entries = state.accounts.top_scores(LEADERBOARD_SIZE as u32).await?;
    Ok(Json(entries))
}

/// GET /profile - Account summary for the signed-in player
pub async fn get_profile(
    State(state): State<AppState>,
    player: AuthenticatedPlayer,
) -> Result<Json<ProfileResponse>, ApiError> {
    let (account, status) = state.quota.can_play(player.account_id).await?;
    let games_today = rolled_over_count(account.last_game_date, account.games_today, Utc::now());

    Ok(Json(ProfileResponse {
        can_play: status.allowed && !account.is_banned,
        games_left: status.remaining,
        games_today,
        username: account.username,
        email: account.email,
        created_at: account.created_at,
        total_games: account.total_games,
        best_score: account.best_score,
        wallet_address: account.wallet_address,
        has_nft: account.has_nft,
    }))
}
