//! Wallet authentication HTTP handlers
//!
//! Sign-in by signed nonce, direct wallet linking and NFT lookups.

use axum::{extract::State, Json};
use chrono::Utc;

use super::{ApiJson, AuthenticatedPlayer};
use crate::auth::normalize_address;
use crate::error::ApiError;
use crate::models::{
    CheckNftRequest, CheckNftResponse, LinkWalletRequest, LinkWalletResponse, NonceRequest,
    NonceResponse, WalletAuthResponse, WalletVerifyRequest,
};
use crate::quota::can_play;
use crate::state::AppState;

/// POST /wallet/nonce - Issue a sign-in nonce for an address
pub async fn request_nonce(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<NonceRequest>,
) -> Result<Json<NonceResponse>, ApiError> {
    let nonce = state.wallets.issue_nonce(&req.address).await?;
    Ok(Json(NonceResponse { nonce }))
}

/// POST /wallet/verify - Verify the signed nonce and sign the wallet in
pub async fn verify_signature(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<WalletVerifyRequest>,
) -> Result<Json<WalletAuthResponse>, ApiError> {
    let account = state
        .wallets
        .verify(&req.address, &req.signature, &req.nonce)
        .await?;
    let token = state.sessions.mint(&account)?;
    let quota = can_play(&account, state.quota.policy(), Utc::now());

    tracing::info!(account_id = %account.id, "Wallet login");

    Ok(Json(WalletAuthResponse {
        success: true,
        token,
        username: account.username,
        has_nft: account.has_nft,
        games_left: quota.remaining,
    }))
}

/// POST /wallet/link - Link a wallet to the signed-in account
pub async fn link_wallet(
    State(state): State<AppState>,
    player: AuthenticatedPlayer,
    ApiJson(req): ApiJson<LinkWalletRequest>,
) -> Result<Json<LinkWalletResponse>, ApiError> {
    let account = state
        .wallets
        .link_wallet(
            player.account_id,
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

/// POST /wallet/check-nft - Whether an address holds the configured NFT
pub async fn check_nft(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<CheckNftRequest>,
) -> Result<Json<CheckNftResponse>, ApiError> {
    let address = normalize_address(&req.wallet_address)
        .map_err(|e| ApiError::ValidationError(e.to_string()))?;

    let owns_nft = state.wallets.nft().owns(&address).await;
    Ok(Json(CheckNftResponse { owns_nft }))
}
