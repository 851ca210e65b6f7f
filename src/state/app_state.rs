//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use chrono::Duration;

use crate::auth::{
    NftChecker, PasswordAuthenticator, PasswordError, SessionIssuer, WalletAuthenticator,
};
use crate::config::Config;
use crate::leaderboard::ScoreMirror;
use crate::link::{LinkBroker, LinkSessionStore, MemoryLinkSessions};
use crate::quota::{PlayQuota, QuotaPolicy};
use crate::store::{AccountStore, MemoryStore, NonceStore};

/// Storage and outbound clients the services are built on
pub struct Backends {
    pub accounts: Arc<dyn AccountStore>,
    pub nonces: Arc<dyn NonceStore>,
    pub link_sessions: Arc<dyn LinkSessionStore>,
    pub mirror: Option<Arc<dyn ScoreMirror>>,
    pub nft: NftChecker,
}

impl Backends {
    /// Everything in process memory; no mirror, NFT checks disabled
    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            accounts: store.clone(),
            nonces: store,
            link_sessions: Arc::new(MemoryLinkSessions::new()),
            mirror: None,
            nft: NftChecker::disabled(),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub passwords: Arc<PasswordAuthenticator>,
    pub wallets: Arc<WalletAuthenticator>,
    pub sessions: Arc<SessionIssuer>,
    pub quota: Arc<PlayQuota>,
    pub links: Arc<LinkBroker>,
    pub link_base_url: String,
}

impl AppState {
    pub async fn build(config: &Config, backends: Backends) -> Result<Self, PasswordError> {
        let Backends {
            accounts,
            nonces,
            link_sessions,
            mirror,
            nft,
        } = backends;

        let passwords =
            Arc::new(PasswordAuthenticator::new(accounts.clone(), config.bcrypt_cost).await?);
        let wallets = Arc::new(WalletAuthenticator::new(accounts.clone(), nonces, nft));
        let sessions = Arc::new(SessionIssuer::new(
            &config.jwt_secret,
            Duration::days(config.session_ttl_days),
        ));
        let quota = Arc::new(PlayQuota::new(
            accounts.clone(),
            QuotaPolicy::new(config.daily_game_limit, config.nft_holder_daily_limit),
            mirror,
        ));
        let links = Arc::new(LinkBroker::new(
            link_sessions,
            accounts.clone(),
            wallets.clone(),
        ));

        Ok(Self {
            accounts,
            passwords,
            wallets,
            sessions,
            quota,
            links,
            link_base_url: config.link_base_url.clone(),
        })
    }
}

impl FromRef<AppState> for Arc<SessionIssuer> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.sessions.clone()
    }
}

impl FromRef<AppState> for Arc<PlayQuota> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.quota.clone()
    }
}

impl FromRef<AppState> for Arc<LinkBroker> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.links.clone()
    }
}
