//! Password credentials
//!
//! bcrypt hashing runs on the blocking pool. Login compares against a dummy
//! hash when the username does not exist, so the response time does not tell
//! a caller whether an account exists.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use crate::models::{Account, NewAccount};
use crate::store::{AccountStore, StoreError};

/// Shortest password accepted at registration
pub const MIN_PASSWORD_LEN: usize = 6;
/// Username length bounds, counted after trimming
pub const USERNAME_LEN: std::ops::RangeInclusive<usize> = 3..=20;

/// Password authentication errors
#[derive(Error, Debug)]
pub enum PasswordError {
    #[error("Password must be at least 6 characters")]
    WeakPassword,

    #[error("Username must be 3-20 characters")]
    InvalidUsername,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Email already registered")]
    EmailTaken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Account banned")]
    AccountBanned,

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for PasswordError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DuplicateUsername => PasswordError::UsernameTaken,
            StoreError::DuplicateEmail => PasswordError::EmailTaken,
            other => PasswordError::Store(other),
        }
    }
}

pub struct PasswordAuthenticator {
    store: Arc<dyn AccountStore>,
    cost: u32,
    dummy_hash: String,
}

impl PasswordAuthenticator {
    pub async fn new(store: Arc<dyn AccountStore>, cost: u32) -> Result<Self, PasswordError> {
        let dummy_hash = hash_password("not-a-real-password".to_string(), cost).await?;
        Ok(Self {
            store,
            cost,
            dummy_hash,
        })
    }

    /// Create a password account. Username and email uniqueness are decided
    /// by the store.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, PasswordError> {
        let username = username.trim();
        if !USERNAME_LEN.contains(&username.chars().count()) {
            return Err(PasswordError::InvalidUsername);
        }
        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(PasswordError::WeakPassword);
        }

        let password_hash = hash_password(password.to_string(), self.cost).await?;

        let account = self
            .store
            .create_account(
                NewAccount {
                    username: username.to_string(),
                    email: Some(email.trim().to_lowercase()),
                    password_hash: Some(password_hash),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await?;

        tracing::info!(
            account_id = %account.id,
            username = %account.username,
            "Account registered"
        );
        Ok(account)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Account, PasswordError> {
        let account = match self.store.find_by_username(username.trim()).await {
            Ok(account) => Some(account),
            Err(StoreError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        let stored_hash = account
            .as_ref()
            .and_then(|a| a.password_hash.clone())
            .unwrap_or_else(|| self.dummy_hash.clone());

        let matches = verify_password(password.to_string(), stored_hash).await?;

        let account = match account {
            Some(account) if matches && account.password_hash.is_some() => account,
            _ => {
                tracing::debug!(username = %username, "Login rejected");
                return Err(PasswordError::InvalidCredentials);
            }
        };

        if account.is_banned {
            tracing::warn!(account_id = %account.id, "Banned account attempted login");
            return Err(PasswordError::AccountBanned);
        }

        Ok(account)
    }
}

async fn hash_password(password: String, cost: u32) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| PasswordError::Hashing(e.to_string()))?
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}

async fn verify_password(password: String, hash: String) -> Result<bool, PasswordError> {
    tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| PasswordError::Hashing(e.to_string()))?
        .map_err(|e| PasswordError::Hashing(e.to_string()))
}
