//! The daily limit must hold under concurrent submissions

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use futures_util::future::join_all;
    use std::sync::Arc;

    use shacker_server::models::NewAccount;
    use shacker_server::quota::{PlayQuota, QuotaError, QuotaPolicy};
    use shacker_server::store::{AccountStore, MemoryStore};

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_submissions_respect_limit() {
        let store = MemoryStore::new();
        let account = store
            .create_account(
                NewAccount {
                    username: "racer".to_string(),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let quota = Arc::new(PlayQuota::new(
            Arc::new(store.clone()),
            QuotaPolicy::new(10, None),
            None,
        ));

        let handles = (1..=25i64).map(|i| {
            let quota = quota.clone();
            tokio::spawn(async move { (i * 10, quota.record_play(account.id, i * 10, 1).await) })
        });
        let results: Vec<_> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.unwrap())
            .collect();

        let accepted: Vec<i64> = results
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(score, _)| *score)
            .collect();
        assert_eq!(accepted.len(), 10);

        for (_, result) in results.iter().filter(|(_, r)| r.is_err()) {
            assert!(matches!(result, Err(QuotaError::DailyLimitReached)));
        }

        let stored = store.find_by_id(account.id).await.unwrap();
        assert_eq!(stored.games_today, 10);
        assert_eq!(stored.total_games, 10);
        assert_eq!(stored.best_score, *accepted.iter().max().unwrap());
        assert_eq!(store.sessions_for(account.id).await.len(), 10);
    }

    #[tokio::test]
    async fn test_nft_holder_limit() {
        let store = MemoryStore::new();
        let holder = store
            .create_account(
                NewAccount {
                    username: "holder".to_string(),
                    has_nft: true,
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let quota = PlayQuota::new(Arc::new(store.clone()), QuotaPolicy::new(2, Some(4)), None);

        for expected_left in (0..4).rev() {
            let receipt = quota.record_play(holder.id, 100, 1).await.unwrap();
            assert_eq!(receipt.games_left, expected_left);
        }
        assert!(matches!(
            quota.record_play(holder.id, 100, 1).await,
            Err(QuotaError::DailyLimitReached)
        ));
    }
}
