//! Password authentication HTTP handlers

use axum::{extract::State, Json};
use chrono::Utc;
use validator::Validate;

use super::ApiJson;
use crate::error::ApiError;
use crate::models::{AuthResponse, LoginRequest, RegisterRequest};
use crate::quota::can_play;
use crate::state::AppState;

/// POST /register - Create a password account and sign it in
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    req.validate()?;

    let account = state
        .passwords
        .register(&req.username, &req.email, &req.password)
        .await?;
    let token = state.sessions.mint(&account)?;
    let quota = can_play(&account, state.quota.policy(), Utc::now());

    Ok(Json(AuthResponse {
        success: true,
        token,
        username: account.username,
        games_left: quota.remaining,
    }))
}

/// POST /login - Exchange username and password for a session token
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let account = state.passwords.login(&req.username, &req.password).await?;
    let token = state.sessions.mint(&account)?;
    let quota = can_play(&account, state.quota.policy(), Utc::now());

    tracing::info!(account_id = %account.id, "Password login");

    Ok(Json(AuthResponse {
        success: true,
        token,
        username: account.username,
        games_left: quota.remaining,
    }))
}
