//! Play-quota authority
//!
//! Decides whether an account may record another game today and records
//! accepted games. The calendar day is the UTC day; `rolled_over_count` is the
//! only place that definition lives.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::leaderboard::{publish_in_background, ScoreMirror};
use crate::models::{Account, LeaderboardEntry};
use crate::store::{AccountStore, StoreError};

/// Highest score accepted for a single game
pub const MAX_SCORE: i64 = 1_000_000;

#[derive(Error, Debug)]
pub enum QuotaError {
    #[error("Invalid score: {0}")]
    InvalidScore(String),

    #[error("Daily limit reached")]
    DailyLimitReached,

    #[error("Account banned")]
    AccountBanned,

    #[error("Account not found")]
    AccountNotFound,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for QuotaError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::DailyLimitReached => QuotaError::DailyLimitReached,
            StoreError::NotFound => QuotaError::AccountNotFound,
            other => QuotaError::Store(other),
        }
    }
}

/// Games already played on `now`'s UTC day. A counter last touched on an
/// earlier day counts as zero; the reset is persisted by the next recorded play.
pub fn rolled_over_count(
    last_game_date: Option<DateTime<Utc>>,
    games_today: i32,
    now: DateTime<Utc>,
) -> u32 {
    match last_game_date {
        Some(last) if last.date_naive() == now.date_naive() => games_today.max(0) as u32,
        _ => 0,
    }
}

/// Daily limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaPolicy {
    daily_limit: u32,
    nft_holder_limit: Option<u32>,
}

impl QuotaPolicy {
    pub fn new(daily_limit: u32, nft_holder_limit: Option<u32>) -> Self {
        Self {
            daily_limit,
            nft_holder_limit,
        }
    }

    /// Limit for an account, honouring the NFT holder override
    pub fn limit_for(&self, account: &Account) -> u32 {
        match self.nft_holder_limit {
            Some(limit) if account.has_nft => limit,
            _ => self.daily_limit,
        }
    }
}

/// Current quota position of an account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaStatus {
    pub allowed: bool,
    pub remaining: u32,
    pub limit: u32,
}

/// Pure quota check; never persists the day rollover.
pub fn can_play(account: &Account, policy: &QuotaPolicy, now: DateTime<Utc>) -> QuotaStatus {
    let used = rolled_over_count(account.last_game_date, account.games_today, now);
    let limit = policy.limit_for(account);
    let remaining = limit.saturating_sub(used);
    QuotaStatus {
        allowed: remaining > 0,
        remaining,
        limit,
    }
}

/// Reject scores no real game can produce
pub fn validate_score(score: i64, level: i32) -> Result<(), QuotaError> {
    if !(0..=MAX_SCORE).contains(&score) {
        return Err(QuotaError::InvalidScore(format!(
            "score must be between 0 and {}",
            MAX_SCORE
        )));
    }
    if level < 1 {
        return Err(QuotaError::InvalidScore("level must be at least 1".to_string()));
    }
    Ok(())
}

/// Accepted submission
#[derive(Debug, Clone)]
pub struct PlayReceipt {
    pub account: Account,
    pub games_left: u32,
}

/// Gatekeeper for score submissions
pub struct PlayQuota {
    store: Arc<dyn AccountStore>,
    policy: QuotaPolicy,
    mirror: Option<Arc<dyn ScoreMirror>>,
}

impl PlayQuota {
    pub fn new(
        store: Arc<dyn AccountStore>,
        policy: QuotaPolicy,
        mirror: Option<Arc<dyn ScoreMirror>>,
    ) -> Self {
        Self {
            store,
            policy,
            mirror,
        }
    }

    pub fn policy(&self) -> &QuotaPolicy {
        &self.policy
    }

    /// Quota position of an account right now
    pub async fn can_play(&self, account_id: Uuid) -> Result<(Account, QuotaStatus), QuotaError> {
        let account = self.store.find_by_id(account_id).await?;
        let status = can_play(&account, &self.policy, Utc::now());
        Ok((account, status))
    }

    /// Validate and record a finished game.
    ///
    /// The limit is re-checked inside the store's atomic update; whatever the
    /// client believes about its remaining games is irrelevant. On success the
    /// score is pushed to the leaderboard mirror in the background.
    pub async fn record_play(
        &self,
        account_id: Uuid,
        score: i64,
        level: i32,
    ) -> Result<PlayReceipt, QuotaError> {
        validate_score(score, level)?;

        let account = self.store.find_by_id(account_id).await?;
        if account.is_banned {
            return Err(QuotaError::AccountBanned);
        }

        let now = Utc::now();
        let outcome = self
            .store
            .record_play(account_id, score, level, &self.policy, now)
            .await
            .map_err(|e| {
                if !matches!(e, StoreError::DailyLimitReached) {
                    tracing::error!(account_id = %account_id, error = %e, "Failed to record play");
                }
                QuotaError::from(e)
            })?;

        tracing::info!(
            account_id = %account_id,
            score,
            level,
            games_left = outcome.games_left,
            "Game recorded"
        );

        if let Some(mirror) = &self.mirror {
            publish_in_background(
                mirror.clone(),
                LeaderboardEntry {
                    name: outcome.account.username.clone(),
                    score,
                    level,
                    date: now,
                },
            );
        }

        Ok(PlayReceipt {
            account: outcome.account,
            games_left: outcome.games_left,
        })
    }
}
