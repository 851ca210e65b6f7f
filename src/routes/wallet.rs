//! Wallet authentication and linking routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{link, wallet};
use crate::state::AppState;

/// Create wallet routes, including the cross-device link session flow
pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/wallet/nonce", post(wallet::request_nonce))
        .route("/wallet/verify", post(wallet::verify_signature))
        .route("/wallet/link", post(wallet::link_wallet))
        .route("/wallet/check-nft", post(wallet::check_nft))
        .route("/wallet/create-session", post(link::create_session))
        .route("/wallet/check-session", get(link::check_session))
        .route("/wallet/link-session", post(link::complete_session))
        .route("/wallet/session-status", get(link::session_status))
}
