//! In-memory store for tests and single-process development runs
//!
//! All tables sit behind one lock, so each trait method is atomic with
//! respect to every other call.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AccountStore, NonceStore, PlayOutcome, StoreError};
use crate::models::{Account, GameSession, LeaderboardEntry, NewAccount};
use crate::quota::{rolled_over_count, QuotaPolicy};

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Account>,
    by_username: HashMap<String, Uuid>,
    by_email: HashMap<String, Uuid>,
    by_wallet: HashMap<String, Uuid>,
    sessions: Vec<GameSession>,
    nonces: HashMap<String, (String, DateTime<Utc>)>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Game sessions recorded for one account, oldest first
    pub async fn sessions_for(&self, account_id: Uuid) -> Vec<GameSession> {
        let tables = self.tables.read().await;
        tables
            .sessions
            .iter()
            .filter(|s| s.account_id == account_id)
            .cloned()
            .collect()
    }

    /// Flag an account as banned
    pub async fn ban(&self, account_id: Uuid) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let account = tables
            .accounts
            .get_mut(&account_id)
            .ok_or(StoreError::NotFound)?;
        account.is_banned = true;
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(
        &self,
        account: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        let mut tables = self.tables.write().await;

        if tables.by_username.contains_key(&account.username) {
            return Err(StoreError::DuplicateUsername);
        }
        if let Some(email) = &account.email {
            if tables.by_email.contains_key(email) {
                return Err(StoreError::DuplicateEmail);
            }
        }
        if let Some(wallet) = &account.wallet_address {
            if tables.by_wallet.contains_key(wallet) {
                return Err(StoreError::WalletAlreadyLinked);
            }
        }

        let wallet_verified = account.wallet_address.is_some();
        let created = Account {
            id: Uuid::new_v4(),
            username: account.username,
            email: account.email,
            password_hash: account.password_hash,
            wallet_address: account.wallet_address,
            wallet_verified,
            wallet_linked_at: wallet_verified.then_some(now),
            is_banned: false,
            games_today: 0,
            last_game_date: None,
            total_games: 0,
            best_score: 0,
            has_nft: account.has_nft,
            created_at: now,
        };

        tables
            .by_username
            .insert(created.username.clone(), created.id);
        if let Some(email) = &created.email {
            tables.by_email.insert(email.clone(), created.id);
        }
        if let Some(wallet) = &created.wallet_address {
            tables.by_wallet.insert(wallet.clone(), created.id);
        }
        tables.accounts.insert(created.id, created.clone());

        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        let tables = self.tables.read().await;
        tables.accounts.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<Account, StoreError> {
        let tables = self.tables.read().await;
        tables
            .by_username
            .get(username)
            .and_then(|id| tables.accounts.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_wallet(&self, address: &str) -> Result<Account, StoreError> {
        let tables = self.tables.read().await;
        tables
            .by_wallet
            .get(address)
            .and_then(|id| tables.accounts.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn link_wallet(
        &self,
        id: Uuid,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        let mut tables = self.tables.write().await;

        if !tables.accounts.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        match tables.by_wallet.get(address) {
            Some(owner) if *owner != id => return Err(StoreError::WalletAlreadyLinked),
            Some(_) => {
                return tables.accounts.get(&id).cloned().ok_or(StoreError::NotFound);
            }
            None => {}
        }

        let previous = tables
            .accounts
            .get(&id)
            .and_then(|a| a.wallet_address.clone());
        if let Some(previous) = previous {
            tables.by_wallet.remove(&previous);
        }
        tables.by_wallet.insert(address.to_string(), id);

        let account = tables.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.wallet_address = Some(address.to_string());
        account.wallet_verified = true;
        account.wallet_linked_at = Some(now);
        Ok(account.clone())
    }

    async fn set_has_nft(&self, id: Uuid, has_nft: bool) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let account = tables.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        account.has_nft = has_nft;
        Ok(())
    }

    async fn record_play(
        &self,
        id: Uuid,
        score: i64,
        level: i32,
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<PlayOutcome, StoreError> {
        let mut tables = self.tables.write().await;

        let account = tables.accounts.get_mut(&id).ok_or(StoreError::NotFound)?;
        let used = rolled_over_count(account.last_game_date, account.games_today, now);
        let limit = policy.limit_for(account);
        if used >= limit {
            return Err(StoreError::DailyLimitReached);
        }

        account.games_today = (used + 1) as i32;
        account.total_games += 1;
        account.best_score = account.best_score.max(score);
        account.last_game_date = Some(now);
        let account = account.clone();

        tables.sessions.push(GameSession {
            id: Uuid::new_v4(),
            account_id: id,
            score,
            level,
            created_at: now,
        });

        Ok(PlayOutcome {
            account,
            games_left: limit - (used + 1),
        })
    }

    async fn top_scores(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError> {
        let tables = self.tables.read().await;
        let mut entries: Vec<LeaderboardEntry> = tables
            .sessions
            .iter()
            .filter_map(|s| {
                let account = tables.accounts.get(&s.account_id)?;
                if account.is_banned {
                    return None;
                }
                Some(LeaderboardEntry {
                    name: account.username.clone(),
                    score: s.score,
                    level: s.level,
                    date: s.created_at,
                })
            })
            .collect();
        entries.sort_by(|a, b| b.score.cmp(&a.score).then(a.date.cmp(&b.date)));
        entries.truncate(limit as usize);
        Ok(entries)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl NonceStore for MemoryStore {
    async fn put_nonce(
        &self,
        address: &str,
        nonce: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        tables
            .nonces
            .insert(address.to_string(), (nonce.to_string(), expires_at));
        Ok(())
    }

    async fn take_nonce(
        &self,
        address: &str,
        nonce: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        let matches = matches!(tables.nonces.get(address), Some((stored, _)) if stored == nonce);
        if !matches {
            return Ok(false);
        }
        let (_, expires_at) = tables
            .nonces
            .remove(address)
            .ok_or(StoreError::NotFound)?;
        Ok(expires_at > now)
    }
}
