//! PostgreSQL implementation of the credential and nonce stores

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{bounded, AccountStore, NonceStore, PlayOutcome, StoreError};
use crate::models::{Account, LeaderboardEntry, NewAccount};
use crate::quota::{rolled_over_count, QuotaPolicy};

const ACCOUNT_COLUMNS: &str = "id, username, email, password_hash, wallet_address, \
    wallet_verified, wallet_linked_at, is_banned, games_today, last_game_date, \
    total_games, best_score, has_nft, created_at";

/// Postgres-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Account, StoreError> {
        let query = format!(
            "SELECT {} FROM accounts WHERE {} = $1",
            ACCOUNT_COLUMNS, column
        );
        bounded(self.timeout, async {
            sqlx::query_as::<_, Account>(&query)
                .bind(value)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)
        })
        .await
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_account(
        &self,
        account: NewAccount,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        let query = format!(
            r#"
            INSERT INTO accounts (
                id, username, email, password_hash, wallet_address, wallet_verified,
                wallet_linked_at, has_nft, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );
        let wallet_verified = account.wallet_address.is_some();
        let linked_at = wallet_verified.then_some(now);

        bounded(self.timeout, async {
            let created = sqlx::query_as::<_, Account>(&query)
                .bind(Uuid::new_v4())
                .bind(&account.username)
                .bind(&account.email)
                .bind(&account.password_hash)
                .bind(&account.wallet_address)
                .bind(wallet_verified)
                .bind(linked_at)
                .bind(account.has_nft)
                .bind(now)
                .fetch_one(&self.pool)
                .await?;
            Ok(created)
        })
        .await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Account, StoreError> {
        let query = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        bounded(self.timeout, async {
            sqlx::query_as::<_, Account>(&query)
                .bind(id)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn find_by_username(&self, username: &str) -> Result<Account, StoreError> {
        self.find_one("username", username).await
    }

    async fn find_by_wallet(&self, address: &str) -> Result<Account, StoreError> {
        self.find_one("wallet_address", address).await
    }

    async fn link_wallet(
        &self,
        id: Uuid,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Account, StoreError> {
        // The UNIQUE constraint on wallet_address decides races; the
        // IS DISTINCT FROM guard keeps relinking the same wallet a no-op.
        let query = format!(
            r#"
            UPDATE accounts
            SET wallet_address = $2,
                wallet_verified = TRUE,
                wallet_linked_at = CASE
                    WHEN wallet_address IS DISTINCT FROM $2 THEN $3
                    ELSE wallet_linked_at
                END
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );
        bounded(self.timeout, async {
            sqlx::query_as::<_, Account>(&query)
                .bind(id)
                .bind(address)
                .bind(now)
                .fetch_optional(&self.pool)
                .await?
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn set_has_nft(&self, id: Uuid, has_nft: bool) -> Result<(), StoreError> {
        bounded(self.timeout, async {
            let rows = sqlx::query("UPDATE accounts SET has_nft = $2 WHERE id = $1")
                .bind(id)
                .bind(has_nft)
                .execute(&self.pool)
                .await?
                .rows_affected();
            if rows == 0 {
                return Err(StoreError::NotFound);
            }
            Ok(())
        })
        .await
    }

    async fn record_play(
        &self,
        id: Uuid,
        score: i64,
        level: i32,
        policy: &QuotaPolicy,
        now: DateTime<Utc>,
    ) -> Result<PlayOutcome, StoreError> {
        let select = format!(
            "SELECT {} FROM accounts WHERE id = $1 FOR UPDATE",
            ACCOUNT_COLUMNS
        );
        let update = format!(
            r#"
            UPDATE accounts
            SET games_today = $2,
                total_games = total_games + 1,
                best_score = GREATEST(best_score, $3),
                last_game_date = $4
            WHERE id = $1
            RETURNING {}
            "#,
            ACCOUNT_COLUMNS
        );

        bounded(self.timeout, async {
            let mut tx = self.pool.begin().await?;

            // Row lock serializes concurrent submissions for the same account
            let current = sqlx::query_as::<_, Account>(&select)
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or(StoreError::NotFound)?;

            let used = rolled_over_count(current.last_game_date, current.games_today, now);
            let limit = policy.limit_for(&current);
            if used >= limit {
                return Err(StoreError::DailyLimitReached);
            }

            sqlx::query(
                r#"
                INSERT INTO game_sessions (id, account_id, score, level, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(score)
            .bind(level)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            let account = sqlx::query_as::<_, Account>(&update)
                .bind(id)
                .bind((used + 1) as i32)
                .bind(score)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?;

            tx.commit().await?;

            Ok(PlayOutcome {
                account,
                games_left: limit - (used + 1),
            })
        })
        .await
    }

    async fn top_scores(&self, limit: u32) -> Result<Vec<LeaderboardEntry>, StoreError> {
        bounded(self.timeout, async {
            let rows = sqlx::query_as::<_, LeaderboardEntry>(
                r#"
                SELECT a.username AS name, g.score, g.level, g.created_at AS date
                FROM game_sessions g
                JOIN accounts a ON a.id = g.account_id
                WHERE a.is_banned = FALSE
                ORDER BY g.score DESC, g.created_at ASC
                LIMIT $1
                "#,
            )
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
            Ok(rows)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        bounded(self.timeout, async {
            crate::db::check_health(&self.pool)
                .await
                .map_err(|e| StoreError::Unavailable(e.to_string()))
        })
        .await
    }
}

#[async_trait]
impl NonceStore for PgStore {
    async fn put_nonce(
        &self,
        address: &str,
        nonce: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        bounded(self.timeout, async {
            sqlx::query(
                r#"
                INSERT INTO wallet_nonces (wallet_address, nonce, expires_at)
                VALUES ($1, $2, $3)
                ON CONFLICT (wallet_address)
                DO UPDATE SET nonce = EXCLUDED.nonce, expires_at = EXCLUDED.expires_at
                "#,
            )
            .bind(address)
            .bind(nonce)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn take_nonce(
        &self,
        address: &str,
        nonce: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        bounded(self.timeout, async {
            let expires_at: Option<DateTime<Utc>> = sqlx::query_scalar(
                r#"
                DELETE FROM wallet_nonces
                WHERE wallet_address = $1 AND nonce = $2
                RETURNING expires_at
                "#,
            )
            .bind(address)
            .bind(nonce)
            .fetch_optional(&self.pool)
            .await?;

            Ok(matches!(expires_at, Some(exp) if exp > now))
        })
        .await
    }
}
