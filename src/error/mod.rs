//! Centralized API error handling for Shacker
//!
//! Every domain error converts into `ApiError`, which is the only place HTTP
//! status codes are chosen. Server-side failures are logged with their cause
//! and answered with a generic message.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::auth::{PasswordError, TokenError, WalletError};
use crate::link::LinkError;
use crate::quota::QuotaError;
use crate::store::StoreError;

/// API error type with HTTP status code mapping
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// No credentials presented
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Credentials presented but rejected (invalid, expired, banned, not owner)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// JSON error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

/// Error details in the response
#[derive(Serialize)]
pub struct ErrorDetails {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Get the error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Unauthorized(_) => "UNAUTHORIZED",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::TooManyRequests(_) => "TOO_MANY_REQUESTS",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
        }
    }

    /// Get the HTTP status code. Conflicts answer 400 like other rejected
    /// input.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::TooManyRequests(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ValidationError(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show a client
    fn public_message(&self) -> String {
        match self {
            ApiError::InternalError(_) => "Internal server error".to_string(),
            ApiError::NotFound(m)
            | ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::Conflict(m)
            | ApiError::TooManyRequests(m)
            | ApiError::ValidationError(m) => m.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();

        match &self {
            ApiError::InternalError(cause) => {
                tracing::error!(error = %cause, code = %error_code, "Server error occurred");
            }
            _ => {
                tracing::debug!(error = %self, code = %error_code, "Client error occurred");
            }
        }

        let body = ErrorResponse {
            error: ErrorDetails {
                code: error_code.to_string(),
                message: self.public_message(),
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

// Conversions from domain errors

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateUsername => ApiError::Conflict("Username already taken".into()),
            StoreError::DuplicateEmail => ApiError::Conflict("Email already registered".into()),
            StoreError::WalletAlreadyLinked => {
                ApiError::Conflict("Wallet already linked to another account".into())
            }
            StoreError::NotFound => ApiError::NotFound("Account not found".into()),
            StoreError::DailyLimitReached => {
                ApiError::TooManyRequests("Daily game limit reached".into())
            }
            StoreError::Timeout | StoreError::Unavailable(_) => {
                ApiError::InternalError(err.to_string())
            }
        }
    }
}

impl From<TokenError> for ApiError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Missing => ApiError::Unauthorized("No token provided".into()),
            TokenError::Expired => ApiError::Forbidden("Token expired".into()),
            TokenError::Invalid(_) => ApiError::Forbidden("Invalid token".into()),
            TokenError::EncodingFailed(_) => ApiError::InternalError(err.to_string()),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        match err {
            PasswordError::WeakPassword | PasswordError::InvalidUsername => {
                ApiError::ValidationError(err.to_string())
            }
            PasswordError::UsernameTaken | PasswordError::EmailTaken => {
                ApiError::Conflict(err.to_string())
            }
            PasswordError::InvalidCredentials => {
                ApiError::Unauthorized("Invalid username or password".into())
            }
            PasswordError::AccountBanned => ApiError::Forbidden("Account banned".into()),
            PasswordError::Hashing(_) => ApiError::InternalError(err.to_string()),
            PasswordError::Store(e) => e.into(),
        }
    }
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InvalidAddress | WalletError::InvalidMessage(_) => {
                ApiError::ValidationError(err.to_string())
            }
            WalletError::InvalidOrExpiredNonce | WalletError::InvalidSignature => {
                ApiError::Unauthorized(err.to_string())
            }
            WalletError::WalletAlreadyLinked => ApiError::Conflict(err.to_string()),
            WalletError::AccountBanned => ApiError::Forbidden("Account banned".into()),
            WalletError::AccountNotFound => ApiError::NotFound("Account not found".into()),
            WalletError::Store(e) => e.into(),
        }
    }
}

impl From<QuotaError> for ApiError {
    fn from(err: QuotaError) -> Self {
        match err {
            QuotaError::InvalidScore(_) => ApiError::ValidationError(err.to_string()),
            QuotaError::DailyLimitReached => {
                ApiError::TooManyRequests("Daily game limit reached".into())
            }
            QuotaError::AccountBanned => ApiError::Forbidden("Account banned".into()),
            QuotaError::AccountNotFound => ApiError::NotFound("Account not found".into()),
            QuotaError::Store(e) => e.into(),
        }
    }
}

impl From<LinkError> for ApiError {
    fn from(err: LinkError) -> Self {
        match err {
            LinkError::SessionExpired => {
                ApiError::NotFound("Link session not found or expired".into())
            }
            LinkError::AlreadyCompleted => ApiError::Conflict(err.to_string()),
            LinkError::Unauthorized => {
                ApiError::Forbidden("Link session belongs to another account".into())
            }
            LinkError::Wallet(e) => e.into(),
            LinkError::Store(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::ValidationError(rejection.body_text())
    }
}
