//! Cross-device wallet link handlers

use axum::{extract::State, Json};

use super::{ApiJson, ApiQuery, AuthenticatedPlayer};
use crate::error::ApiError;
use crate::models::{
    CheckSessionQuery, CheckSessionResponse, CompleteLinkSessionRequest,
    CreateLinkSessionResponse, LinkStatus, LinkWalletResponse, SessionStatusQuery,
    SessionStatusResponse,
};
use crate::state::AppState;

/// POST /wallet/create-session - Open a link session for the signed-in player
pub async fn create_session(
    State(state): State<AppState>,
    player: AuthenticatedPlayer,
) -> Result<Json<CreateLinkSessionResponse>, ApiError> {
    let session = state
        .links
        .create_session(player.account_id, &player.username)
        .await?;

    Ok(Json(CreateLinkSessionResponse {
        link_url: format!("{}?session={}", state.link_base_url, session.id),
        session_id: session.id,
        expires_at: session.expires_at,
    }))
}

/// GET /wallet/check-session?id= - Public view for the wallet device
pub async fn check_session(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<CheckSessionQuery>,
) -> Result<Json<CheckSessionResponse>, ApiError> {
    let session = state.links.check_session(&query.id).await?;

    Ok(Json(CheckSessionResponse {
        valid: true,
        status: session.status.as_str().to_string(),
        username: session.username,
    }))
}

/// POST /wallet/link-session - Wallet device completes the link
pub async fn complete_session(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CompleteLinkSessionRequest>,
) -> Result<Json<LinkWalletResponse>, ApiError> {
    let account = state
        .links
        .complete_session(
            &req.session_id,
            &req.wallet_address,
            &req.signature,
            &req.message,
        )
        .await?;

    Ok(Json(LinkWalletResponse {
        success: true,
        wallet: account.wallet_address.unwrap_or_default(),
    }))
}

/// GET /wallet/session-status?sessionId= - Poll from the signed-in device
pub async fn session_status(
    State(state): State<AppState>,
    player: AuthenticatedPlayer,
    ApiQuery(query): ApiQuery<SessionStatusQuery>,
) -> Result<Json<SessionStatusResponse>, ApiError> {
    let session = state
        .links
        .poll_session(&query.session_id, player.account_id)
        .await?;

    Ok(Json(SessionStatusResponse {
        status: session.status.as_str().to_string(),
        completed: session.status == LinkStatus::Completed,
        wallet_address: session.wallet_address,
    }))
}
