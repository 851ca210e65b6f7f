//! Store guarantees against a real PostgreSQL database.
//!
//! Runs only when `DATABASE_URL` points at a disposable database; every test
//! returns early otherwise. Names and wallets are randomised per run so the
//! suite can share a database with earlier runs.

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use futures_util::future::join_all;
    use sqlx::postgres::PgPoolOptions;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    use shacker_server::models::{Account, NewAccount};
    use shacker_server::quota::{PlayQuota, QuotaError, QuotaPolicy};
    use shacker_server::store::{AccountStore, NonceStore, PgStore, StoreError};

    async fn pg_store() -> Option<PgStore> {
        let url = match std::env::var("DATABASE_URL") {
            Ok(url) if !url.trim().is_empty() => url,
            _ => {
                eprintln!("DATABASE_URL not set, skipping Postgres store test");
                return None;
            }
        };

        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await
            .expect("connect to DATABASE_URL");
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("apply migrations");

        Some(PgStore::new(pool, StdDuration::from_secs(10)))
    }

    fn random_wallet() -> String {
        format!("0x{}", hex::encode(rand::random::<[u8; 20]>()))
    }

    async fn new_account(store: &PgStore) -> Account {
        let suffix = hex::encode(rand::random::<[u8; 4]>());
        store
            .create_account(
                NewAccount {
                    username: format!("pg_{}", suffix),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_row_lock_holds_daily_limit_under_concurrency() {
        let Some(store) = pg_store().await else {
            return;
        };
        let account = new_account(&store).await;
        let quota = Arc::new(PlayQuota::new(
            Arc::new(store.clone()),
            QuotaPolicy::new(10, None),
            None,
        ));

        let handles = (1..=25i64).map(|i| {
            let quota = quota.clone();
            tokio::spawn(async move { (i, quota.record_play(account.id, i * 10, 1).await) })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let accepted: Vec<i64> = results
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(i, _)| i * 10)
            .collect();
        assert_eq!(accepted.len(), 10);
        for (_, result) in results.iter().filter(|(_, r)| r.is_err()) {
            assert!(matches!(result, Err(QuotaError::DailyLimitReached)));
        }

        let stored = store.find_by_id(account.id).await.unwrap();
        assert_eq!(stored.games_today, 10);
        assert_eq!(stored.total_games, 10);
        assert_eq!(stored.best_score, *accepted.iter().max().unwrap());

        let sessions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM game_sessions WHERE account_id = $1")
                .bind(account.id)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(sessions, 10);
    }

    #[tokio::test]
    async fn test_unique_constraint_decides_wallet_owner() {
        let Some(store) = pg_store().await else {
            return;
        };
        let alice = new_account(&store).await;
        let bob = new_account(&store).await;
        let wallet = random_wallet();

        let linked = store.link_wallet(alice.id, &wallet, Utc::now()).await.unwrap();
        assert_eq!(linked.wallet_address.as_deref(), Some(wallet.as_str()));
        assert!(linked.wallet_verified);

        assert!(matches!(
            store.link_wallet(bob.id, &wallet, Utc::now()).await,
            Err(StoreError::WalletAlreadyLinked)
        ));

        // relinking the same wallet keeps the original link time
        let relinked = store
            .link_wallet(alice.id, &wallet, Utc::now() + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(relinked.wallet_linked_at, linked.wallet_linked_at);

        let owner = store.find_by_wallet(&wallet).await.unwrap();
        assert_eq!(owner.id, alice.id);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_links_have_one_winner() {
        let Some(store) = pg_store().await else {
            return;
        };
        let store = Arc::new(store);
        let wallet = random_wallet();

        let mut contenders = Vec::new();
        for _ in 0..4 {
            contenders.push(new_account(&store).await.id);
        }

        let handles = contenders.iter().map(|&id| {
            let store = store.clone();
            let wallet = wallet.clone();
            tokio::spawn(async move { store.link_wallet(id, &wallet, Utc::now()).await })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in results.iter().filter(|r| r.is_err()) {
            assert!(matches!(result, Err(StoreError::WalletAlreadyLinked)));
        }
    }

    #[tokio::test]
    async fn test_nonce_is_deleted_on_take() {
        let Some(store) = pg_store().await else {
            return;
        };
        let wallet = random_wallet();
        let now = Utc::now();

        store
            .put_nonce(&wallet, "first", now + Duration::minutes(10))
            .await
            .unwrap();
        // a newer nonce replaces the old one
        store
            .put_nonce(&wallet, "second", now + Duration::minutes(10))
            .await
            .unwrap();

        assert!(!store.take_nonce(&wallet, "first", now).await.unwrap());
        assert!(store.take_nonce(&wallet, "second", now).await.unwrap());
        assert!(!store.take_nonce(&wallet, "second", now).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_nonce_is_rejected_and_removed() {
        let Some(store) = pg_store().await else {
            return;
        };
        let wallet = random_wallet();
        let now = Utc::now();

        store
            .put_nonce(&wallet, "stale", now - Duration::minutes(1))
            .await
            .unwrap();
        assert!(!store.take_nonce(&wallet, "stale", now).await.unwrap());

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM wallet_nonces WHERE wallet_address = $1")
                .bind(&wallet)
                .fetch_one(store.pool())
                .await
                .unwrap();
        assert_eq!(remaining, 0);
    }
}
