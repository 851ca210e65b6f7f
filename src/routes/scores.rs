//! Quota, score and profile routes

use axum::{routing::get, Router};

use crate::handlers::scores;
use crate::state::AppState;

pub fn score_routes() -> Router<AppState> {
    Router::new()
        .route("/can-play", get(scores::can_play))
        .route("/scores", get(scores::get_scores).post(scores::submit_score))
        .route("/profile", get(scores::get_profile))
}
