//! Credential store
//!
//! Persistence traits for accounts, game sessions and wallet nonces. Every
//! uniqueness rule and every quota increment is enforced inside the store
//! implementation (unique constraints, row locks), never by a separate
//! read-then-write in the services above it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Account, LeaderboardEntry, NewAccount};
use crate::quota::QuotaPolicy;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Username already taken")]
    DuplicateUsername,

    #[error("Email already registered")]
    DuplicateEmail,

    #[error("Wallet already linked to another account")]
    WalletAlreadyLinked,

    #[error("Account not found")]
    NotFound,

    #[error("Daily game limit reached")]
    DailyLimitReached,

    #[error("Storage call timed out")]
    Timeout,

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => match db.constraint() {
                Some("accounts_username_key") => StoreError::DuplicateUsername,
                Some("accounts_email_key") => StoreError::DuplicateEmail,
                Some("accounts_wallet_address_key") => StoreError::WalletAlreadyLinked,
                _ => StoreError::Unavailable(e.to_string()),
            },
            _ => StoreError::Unavailable(e.to_string()),
        }
    }
}

/// Result of an accepted play
#[derive(Debug, Clone)]
pub struct PlayOutcome {
    /// Account state after the update
    pub account: Account,
    /// Games still available today
    pub games_left: u32,
}

/// Account persistence
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Insert a new account; uniqueness violations surface as `Duplicate*` /
    /// `WalletAlreadyLinked`.
    async fn create_account(
        &self,
        account: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Account, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Account, StoreError>;

    /// Look up by lower-cased wallet address
    async fn find_by_wallet(&self, address: &str) -> Result<Account, StoreError>;

    /// Attach a lower-cased wallet to an account. Re-linking the wallet the
    /// account already holds succeeds unchanged.
    async fn link_wallet(
        &self,
        id: Uuid,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError>;

    async fn set_has_nft(&self, id: Uuid, has_nft: bool) -> Result<(), StoreError>;

    /// Quota check, game session append and counter update as one atomic step.
    async fn record_play(
        &self,
        id: Uuid,
        score: i64,
        level: i32,
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<PlayOutcome, StoreError>;

    /// Best individual game sessions, highest score first
    async fn top_scores(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError>;

    /// Connectivity check for `/health`
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Single-use wallet nonces
#[async_trait]
pub trait NonceStore: Send + Sync {
    /// Store a nonce for a lower-cased address, replacing any previous one.
    async fn put_nonce(
        &self,
        address: &str,
        nonce: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Atomically remove the nonce if it matches. Returns `true` only when it
    /// matched and had not expired; a matching expired nonce is removed too.
    async fn take_nonce(
        &self,
        address: &str,
        nonce: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// Bound a storage future by `limit`. A timed-out future is dropped, which
/// rolls back any open transaction.
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| StoreError::Timeout)?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bounded_times_out() {
        let result: Result<(), StoreError> = bounded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(StoreError::Timeout)));
    }

    #[tokio::test]
    async fn test_bounded_passes_result_through() {
        let result = bounded(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }
}
