//! Wallet authentication
//!
//! Per wallet the flow is nonce issued, signature verified, account resolved.
//! Nonces are consumed before the signature is checked, so a nonce is spent
//! even when the rest of the attempt fails.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::crypto::{generate_secure_token, normalize_address, verify_wallet_signature};
use super::nft::NftChecker;
use crate::models::{Account, NewAccount};
use crate::store::{AccountStore, NonceStore, StoreError};

/// Lifetime of a sign-in nonce
pub const NONCE_TTL_MINUTES: i64 = 10;
/// Allowed clock distance for the timestamp inside a link message
pub const LINK_MESSAGE_MAX_AGE_MINUTES: i64 = 10;

const PLAYER_PREFIX: &str = "Player_";
/// Address characters used for auto-provisioned names, tried in order
const PLAYER_SUFFIX_LENGTHS: [usize; 3] = [6, 9, 13];

/// Wallet authentication errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid wallet address")]
    InvalidAddress,

    #[error("Invalid or expired nonce")]
    InvalidOrExpiredNonce,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Invalid link message: {0}")]
    InvalidMessage(String),

    #[error("Wallet already linked to another account")]
    WalletAlreadyLinked,

    #[error("Account banned")]
    AccountBanned,

    #[error("Account not found")]
    AccountNotFound,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for WalletError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::WalletAlreadyLinked => WalletError::WalletAlreadyLinked,
            StoreError::NotFound => WalletError::AccountNotFound,
            other => WalletError::Store(other),
        }
    }
}

/// Challenge text a wallet signs to sign in. `address` is used exactly as the
/// client sent it.
pub fn auth_message(address: &str, nonce: &str) -> String {
    format!(
        "🎮 Welcome to Shacker Game!\n\n\
         Sign this message to prove you own this wallet.\n\n\
         Wallet: {}\nNonce: {}\n\n\
         This won't cost any gas.",
        address, nonce
    )
}

/// Text a wallet signs to be linked to `username`
pub fn link_message(username: &str, timestamp_ms: i64) -> String {
    format!(
        "Link this wallet to Shacker account: {}\n\nTimestamp: {}",
        username, timestamp_ms
    )
}

/// Check that `message` is a link message for `username` signed recently.
pub fn check_link_message(
    message: &str,
    username: &str,
    now: DateTime<Utc>,
) -> Result<(), WalletError> {
    let prefix = format!("Link this wallet to Shacker account: {}\n\nTimestamp: ", username);
    let timestamp = message
        .strip_prefix(&prefix)
        .ok_or_else(|| WalletError::InvalidMessage("message does not name this account".into()))?
        .trim()
        .parse::<i64>()
        .map_err(|_| WalletError::InvalidMessage("malformed timestamp".into()))?;

    let age = (now.timestamp_millis() - timestamp).abs();
    if age > Duration::minutes(LINK_MESSAGE_MAX_AGE_MINUTES).num_milliseconds() {
        return Err(WalletError::InvalidMessage("message expired".into()));
    }
    Ok(())
}

/// Name for an auto-provisioned account: `Player_` plus `len` characters of
/// the address after `0x`.
pub fn placeholder_username(address: &str, len: usize) -> String {
    let hex_part = address.trim_start_matches("0x");
    let end = len.min(hex_part.len());
    format!("{}{}", PLAYER_PREFIX, &hex_part[..end])
}

pub struct WalletAuthenticator {
    accounts: Arc<dyn AccountStore>,
    nonces: Arc<dyn NonceStore>,
    nft: NftChecker,
}

impl WalletAuthenticator {
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        nonces: Arc<dyn NonceStore>,
        nft: NftChecker,
    ) -> Self {
        Self {
            accounts,
            nonces,
            nft,
        }
    }

    pub fn nft(&self) -> &NftChecker {
        &self.nft
    }

    /// Issue a fresh nonce for `address`, replacing any outstanding one
    pub async fn issue_nonce(&self, address: &str) -> Result<String, WalletError> {
        let address = normalize_address(address).map_err(|_| WalletError::InvalidAddress)?;
        let nonce = generate_secure_token();
        let expires_at = Utc::now() + Duration::minutes(NONCE_TTL_MINUTES);

        self.nonces.put_nonce(&address, &nonce, expires_at).await?;

        tracing::debug!(wallet = %address, "Nonce issued");
        Ok(nonce)
    }

    /// Verify a signed challenge and resolve (or provision) the account that
    /// owns the wallet.
    pub async fn verify(
        &self,
        address: &str,
        signature: &str,
        nonce: &str,
    ) -> Result<Account, WalletError> {
        let normalized = normalize_address(address).map_err(|_| WalletError::InvalidAddress)?;

        if !self.nonces.take_nonce(&normalized, nonce, Utc::now()).await? {
            tracing::debug!(wallet = %normalized, "Nonce rejected");
            return Err(WalletError::InvalidOrExpiredNonce);
        }

        let message = auth_message(address, nonce);
        if let Err(e) = verify_wallet_signature(address, &message, signature) {
            tracing::debug!(wallet = %normalized, error = %e, "Wallet signature rejected");
            return Err(WalletError::InvalidSignature);
        }

        let owns_nft = self.nft.owns(&normalized).await;

        let mut account = match self.accounts.find_by_wallet(&normalized).await {
            Ok(account) => account,
            Err(StoreError::NotFound) => self.provision(&normalized, owns_nft).await?,
            Err(e) => return Err(e.into()),
        };

        if account.is_banned {
            tracing::warn!(account_id = %account.id, "Banned account attempted wallet login");
            return Err(WalletError::AccountBanned);
        }

        if account.has_nft != owns_nft {
            self.accounts.set_has_nft(account.id, owns_nft).await?;
            account.has_nft = owns_nft;
        }

        Ok(account)
    }

    async fn provision(&self, address: &str, has_nft: bool) -> Result<Account, WalletError> {
        let now = Utc::now();

        for len in PLAYER_SUFFIX_LENGTHS {
            let candidate = NewAccount {
                username: placeholder_username(address, len),
                wallet_address: Some(address.to_string()),
                has_nft,
                ..Default::default()
            };

            match self.accounts.create_account(candidate, now).await {
                Ok(account) => {
                    tracing::info!(
                        account_id = %account.id,
                        username = %account.username,
                        wallet = %address,
                        "Wallet account provisioned"
                    );
                    return Ok(account);
                }
                Err(StoreError::DuplicateUsername) => continue,
                // a concurrent verify for the same wallet won the insert
                Err(StoreError::WalletAlreadyLinked) => {
                    return Ok(self.accounts.find_by_wallet(address).await?);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(WalletError::Store(StoreError::DuplicateUsername))
    }

    /// Link a wallet to an authenticated account
    pub async fn link_wallet(
        &self,
        account_id: Uuid,
        address: &str,
        signature: &str,
        message: &str,
    ) -> Result<Account, WalletError> {
        let account = self.accounts.find_by_id(account_id).await?;
        self.link_signed(&account, address, signature, message).await
    }

    /// Shared by direct linking and link sessions
    pub(crate) async fn link_signed(
        &self,
        account: &Account,
        address: &str,
        signature: &str,
        message: &str,
    ) -> Result<Account, WalletError> {
        if account.is_banned {
            return Err(WalletError::AccountBanned);
        }

        let normalized = normalize_address(address).map_err(|_| WalletError::InvalidAddress)?;
        let now = Utc::now();

        check_link_message(message, &account.username, now)?;

        if let Err(e) = verify_wallet_signature(address, message, signature) {
            tracing::debug!(wallet = %normalized, error = %e, "Link signature rejected");
            return Err(WalletError::InvalidSignature);
        }

        let mut linked = self.accounts.link_wallet(account.id, &normalized, now).await?;

        let owns_nft = self.nft.owns(&normalized).await;
        if linked.has_nft != owns_nft {
            self.accounts.set_has_nft(linked.id, owns_nft).await?;
            linked.has_nft = owns_nft;
        }

        tracing::info!(account_id = %linked.id, wallet = %normalized, "Wallet linked");
        Ok(linked)
    }
}
