//! Bearer token extraction
//!
//! A missing `Authorization` header is 401. A token that is present but
//! invalid or expired is 403.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::{SessionIssuer, TokenError};
use crate::error::ApiError;

/// Player identity taken from a verified session token. Wallet and NFT
/// claims are informational for clients; handlers re-read the account.
#[derive(Debug, Clone)]
pub struct AuthenticatedPlayer {
    pub account_id: Uuid,
    pub username: String,
}

/// Extractor for authenticated players
///
/// ```rust,ignore
/// async fn protected_handler(player: AuthenticatedPlayer) -> impl IntoResponse {
///     format!("Hello, {}", player.username)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedPlayer
where
    Arc<SessionIssuer>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::from(TokenError::Missing))?;

        let issuer = Arc::<SessionIssuer>::from_ref(state);
        let claims = issuer.verify(bearer.token()).map_err(|e| {
            tracing::debug!(error = %e, "Session token rejected");
            ApiError::from(e)
        })?;

        Ok(AuthenticatedPlayer {
            account_id: claims.account_id()?,
            username: claims.username,
        })
    }
}
