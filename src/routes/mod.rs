//! Route definitions for the Shacker API

mod auth;
mod scores;
mod wallet;

use axum::Router;

use crate::state::AppState;

pub use auth::auth_routes;
pub use scores::score_routes;
pub use wallet::wallet_routes;

/// All API routes, without middleware
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(score_routes())
        .merge(wallet_routes())
}
