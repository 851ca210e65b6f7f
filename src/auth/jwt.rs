//! Session tokens
//!
//! Stateless HS256 bearer tokens. A token carries the account id and username
//! plus optional wallet/NFT claims; validity is checked on every request by
//! signature and expiry alone.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::Account;

/// Token errors
#[derive(Error, Debug)]
pub enum TokenError {
    #[error("No token provided")]
    Missing,

    #[error("Invalid token: {0}")]
    Invalid(String),

    #[error("Token expired")]
    Expired,

    #[error("Token encoding failed: {0}")]
    EncodingFailed(String),
}

/// Session token claims
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SessionClaims {
    /// Subject (account id)
    pub sub: String,
    pub username: String,
    /// Lower-cased wallet, present for wallet sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<String>,
    #[serde(default)]
    pub has_nft: bool,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

impl SessionClaims {
    pub fn account_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|e| TokenError::Invalid(e.to_string()))
    }
}

/// Optional claims beyond identity
#[derive(Debug, Clone, Default)]
pub struct ExtraClaims {
    pub wallet: Option<String>,
    pub has_nft: bool,
}

/// Mints and verifies session tokens with a single process-wide secret
#[derive(Clone)]
pub struct SessionIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionIssuer {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Issue a token for `account`. Wallet and NFT claims are copied from the
    /// account when it has a wallet.
    pub fn mint(&self, account: &Account) -> Result<String, TokenError> {
        self.mint_for(
            account.id,
            &account.username,
            ExtraClaims {
                wallet: account.wallet_address.clone(),
                has_nft: account.has_nft,
            },
        )
    }

    pub fn mint_for(
        &self,
        account_id: Uuid,
        username: &str,
        extra: ExtraClaims,
    ) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: account_id.to_string(),
            username: username.to_string(),
            wallet: extra.wallet,
            has_nft: extra.has_nft,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::EncodingFailed(e.to_string()))
    }

    /// Verify signature and expiry. No leeway: a token is rejected from the
    /// second its `exp` passes.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        let data = decode::<SessionClaims>(token, &self.decoding, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid(e.to_string()),
            }
        })?;

        Ok(data.claims)
    }
}
