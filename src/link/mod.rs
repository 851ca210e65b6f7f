//! Link-session broker
//!
//! Lets a second device (typically a mobile wallet) link its wallet to an
//! account that is signed in elsewhere. The signed-in device opens a session,
//! shows its id as a link or QR code, and polls until the wallet device has
//! completed it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::auth::crypto::generate_secure_token;
use crate::auth::{normalize_address, WalletAuthenticator, WalletError};
use crate::models::{Account, LinkSession, LinkStatus};
use crate::store::{AccountStore, StoreError};

/// Lifetime of a link session
pub const LINK_SESSION_TTL_MINUTES: i64 = 10;

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Link session not found or expired")]
    SessionExpired,

    #[error("Link session already completed")]
    AlreadyCompleted,

    #[error("Link session belongs to another account")]
    Unauthorized,

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for LinkError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound => LinkError::Wallet(WalletError::AccountNotFound),
            StoreError::WalletAlreadyLinked => LinkError::Wallet(WalletError::WalletAlreadyLinked),
            other => LinkError::Store(other),
        }
    }
}

/// Storage for link sessions. Implementations drop expired sessions instead
/// of returning them.
#[async_trait]
pub trait LinkSessionStore: Send + Sync {
    async fn insert(&self, session: LinkSession) -> Result<(), StoreError>;

    /// Live session by id; an expired one is removed and reported as `None`.
    async fn get(&self, id: &str, now: DateTime<Utc>) -> Result<Option<LinkSession>, StoreError>;

    /// Flip a pending session to completed. Returns `false` when the session
    /// is gone or was already completed.
    async fn complete(
        &self,
        id: &str,
        wallet_address: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;
}

/// Process-local link sessions
#[derive(Clone, Default)]
pub struct MemoryLinkSessions {
    sessions: Arc<RwLock<HashMap<String, LinkSession>>>,
}

impl MemoryLinkSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl LinkSessionStore for MemoryLinkSessions {
    async fn insert(&self, session: LinkSession) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        // sweep on write so abandoned sessions don't accumulate
        let now = session.created_at;
        sessions.retain(|_, s| !s.is_expired(now));
        sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get(&self, id: &str, now: DateTime<Utc>) -> Result<Option<LinkSession>, StoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            Some(session) if session.is_expired(now) => {
                sessions.remove(id);
                Ok(None)
            }
            Some(session) => Ok(Some(session.clone())),
            None => Ok(None),
        }
    }

    async fn complete(
        &self,
        id: &str,
        wallet_address: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) if session.is_expired(now) => {
                sessions.remove(id);
                Ok(false)
            }
            Some(session) if session.status == LinkStatus::Pending => {
                session.status = LinkStatus::Completed;
                session.wallet_address = Some(wallet_address.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

pub struct LinkBroker {
    sessions: Arc<dyn LinkSessionStore>,
    accounts: Arc<dyn AccountStore>,
    wallets: Arc<WalletAuthenticator>,
    ttl: Duration,
}

impl LinkBroker {
    pub fn new(
        sessions: Arc<dyn LinkSessionStore>,
        accounts: Arc<dyn AccountStore>,
        wallets: Arc<WalletAuthenticator>,
    ) -> Self {
        Self {
            sessions,
            accounts,
            wallets,
            ttl: Duration::minutes(LINK_SESSION_TTL_MINUTES),
        }
    }

    /// Open a pending session for an authenticated account
    pub async fn create_session(
        &self,
        account_id: Uuid,
        username: &str,
    ) -> Result<LinkSession, LinkError> {
        let now = Utc::now();
        let session = LinkSession {
            id: generate_secure_token(),
            account_id,
            username: username.to_string(),
            created_at: now,
            expires_at: now + self.ttl,
            status: LinkStatus::Pending,
            wallet_address: None,
        };

        self.sessions.insert(session.clone()).await?;
        tracing::debug!(account_id = %account_id, "Link session created");
        Ok(session)
    }

    /// Public lookup used by the wallet device before it signs
    pub async fn check_session(&self, id: &str) -> Result<LinkSession, LinkError> {
        self.sessions
            .get(id, Utc::now())
            .await?
            .ok_or(LinkError::SessionExpired)
    }

    /// Wallet device submits its signed link message
    pub async fn complete_session(
        &self,
        id: &str,
        wallet_address: &str,
        signature: &str,
        message: &str,
    ) -> Result<Account, LinkError> {
        let session = self.check_session(id).await?;
        if session.status == LinkStatus::Completed {
            return Err(LinkError::AlreadyCompleted);
        }

        let account = self.accounts.find_by_id(session.account_id).await?;
        let linked = self
            .wallets
            .link_signed(&account, wallet_address, signature, message)
            .await?;

        let normalized =
            normalize_address(wallet_address).map_err(|_| WalletError::InvalidAddress)?;
        if !self.sessions.complete(id, &normalized, Utc::now()).await? {
            // the wallet is linked either way; only the session bookkeeping raced
            tracing::warn!(session_id = %id, "Link session closed before completion was recorded");
        }

        tracing::info!(
            account_id = %linked.id,
            wallet = %normalized,
            "Wallet linked via link session"
        );
        Ok(linked)
    }

    /// Status poll from the signed-in device; only the owner may poll.
    pub async fn poll_session(
        &self,
        id: &str,
        caller: Uuid,
    ) -> Result<LinkSession, LinkError> {
        let session = self.check_session(id).await?;
        if session.account_id != caller {
            return Err(LinkError::Unauthorized);
        }
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::crypto::{address_from_public_key, sign_personal_message};
    use crate::auth::{link_message, NftChecker};
    use crate::models::NewAccount;
    use crate::store::MemoryStore;
    use libsecp256k1::{PublicKey, SecretKey};

    async fn setup() -> (MemoryLinkSessions, LinkBroker, Account) {
        let store = MemoryStore::default();
        let shared = Arc::new(store.clone());
        let wallets = Arc::new(WalletAuthenticator::new(
            shared.clone(),
            shared.clone(),
            NftChecker::disabled(),
        ));
        let sessions = MemoryLinkSessions::new();
        let broker = LinkBroker::new(Arc::new(sessions.clone()), shared, wallets);

        let account = store
            .create_account(
                NewAccount {
                    username: "alice".into(),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();
        (sessions, broker, account)
    }

    fn wallet(seed: u8) -> (SecretKey, String) {
        let secret = SecretKey::parse(&[seed; 32]).unwrap();
        let address = address_from_public_key(&PublicKey::from_secret_key(&secret));
        (secret, address)
    }

    fn expired_session(id: &str, account_id: Uuid) -> LinkSession {
        let past = Utc::now() - Duration::minutes(20);
        LinkSession {
            id: id.to_string(),
            account_id,
            username: "alice".into(),
            created_at: past,
            expires_at: past + Duration::minutes(LINK_SESSION_TTL_MINUTES),
            status: LinkStatus::Pending,
            wallet_address: None,
        }
    }

    #[tokio::test]
    async fn test_full_link_flow() {
        let (_, broker, account) = setup().await;
        let (secret, address) = wallet(21);

        let session = broker.create_session(account.id, "alice").await.unwrap();
        assert_eq!(session.id.len(), 64);

        let public_view = broker.check_session(&session.id).await.unwrap();
        assert_eq!(public_view.username, "alice");
        assert_eq!(public_view.status, LinkStatus::Pending);

        let message = link_message("alice", Utc::now().timestamp_millis());
        let signature = sign_personal_message(&secret, &message);
        let linked = broker
            .complete_session(&session.id, &address, &signature, &message)
            .await
            .unwrap();
        assert_eq!(linked.wallet_address.as_deref(), Some(address.as_str()));

        let polled = broker.poll_session(&session.id, account.id).await.unwrap();
        assert_eq!(polled.status, LinkStatus::Completed);
        assert_eq!(polled.wallet_address.as_deref(), Some(address.as_str()));

        assert!(matches!(
            broker
                .complete_session(&session.id, &address, &signature, &message)
                .await,
            Err(LinkError::AlreadyCompleted)
        ));
    }

    #[tokio::test]
    async fn test_poll_by_other_account_is_unauthorized() {
        let (_, broker, account) = setup().await;
        let session = broker.create_session(account.id, "alice").await.unwrap();

        assert!(matches!(
            broker.poll_session(&session.id, Uuid::new_v4()).await,
            Err(LinkError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_expired_session_is_dropped_on_lookup() {
        let (sessions, broker, account) = setup().await;
        sessions
            .sessions
            .write()
            .await
            .insert("stale".into(), expired_session("stale", account.id));

        assert!(matches!(
            broker.check_session("stale").await,
            Err(LinkError::SessionExpired)
        ));
        assert_eq!(sessions.len().await, 0);
    }

    #[tokio::test]
    async fn test_insert_sweeps_expired_sessions() {
        let (sessions, broker, account) = setup().await;
        sessions
            .sessions
            .write()
            .await
            .insert("stale".into(), expired_session("stale", account.id));

        broker.create_session(account.id, "alice").await.unwrap();
        assert_eq!(sessions.len().await, 1);
    }

    #[tokio::test]
    async fn test_bad_signature_leaves_session_pending() {
        let (_, broker, account) = setup().await;
        let (_, address) = wallet(22);
        let (other_secret, _) = wallet(23);

        let session = broker.create_session(account.id, "alice").await.unwrap();
        let message = link_message("alice", Utc::now().timestamp_millis());
        let forged = sign_personal_message(&other_secret, &message);

        assert!(matches!(
            broker
                .complete_session(&session.id, &address, &forged, &message)
                .await,
            Err(LinkError::Wallet(WalletError::InvalidSignature))
        ));
        let still = broker.check_session(&session.id).await.unwrap();
        assert_eq!(still.status, LinkStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let (_, broker, _) = setup().await;
        assert!(matches!(
            broker.check_session("missing").await,
            Err(LinkError::SessionExpired)
        ));
    }
}
