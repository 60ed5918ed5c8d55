// src/services/coins.rs

use serde::Serialize;

use crate::{
    config::Config,
    error::AppError,
    models::{
        coin::{CoinGrant, CoinUpdate},
        result::EvaluatedResult,
        user::UserProfile,
    },
    store::Store,
};

/// Applies one grant, seeding the balance row from the user's profile.
/// Errors are returned to the caller; there is no retry here.
pub async fn apply_grant(store: &dyn Store, grant: CoinGrant) -> Result<CoinUpdate, AppError> {
    let user = store
        .find_user(grant.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    store.apply_coin_delta(grant, UserProfile::from(&user)).await
}

/// Idempotency key for rewards paid out by a live test evaluation.
pub fn live_test_reference(test_id: &str) -> String {
    format!("live-test:{}", test_id)
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RewardReport {
    /// Total coins credited in this run.
    pub coins_awarded: i64,
    pub granted: usize,
    /// Grants skipped because this test already paid the user.
    pub already_rewarded: usize,
    pub failed: usize,
}

/// Pays rank-based rewards for a ranked live test. Each grant is independent:
/// a failure is logged and counted, and the remaining users are still paid.
pub async fn reward_ranked_results(
    store: &dyn Store,
    config: &Config,
    test_id: &str,
    ranked: &[EvaluatedResult],
) -> RewardReport {
    let mut report = RewardReport::default();
    let reference = live_test_reference(test_id);

    for result in ranked {
        let Some(rank) = result.rank else { continue };
        let delta = config.coin_reward_for_rank(rank.max(0) as u32);
        if delta == 0 {
            continue;
        }

        let grant = CoinGrant {
            user_id: result.user_id,
            delta,
            reason: format!("Rank {} in live test {}", rank, test_id),
            reference: Some(reference.clone()),
        };

        match apply_grant(store, grant).await {
            Ok(CoinUpdate::Applied(entry)) => {
                tracing::info!(
                    user_id = result.user_id,
                    test_id,
                    delta,
                    balance = entry.coins,
                    "Coins awarded"
                );
                report.coins_awarded += delta;
                report.granted += 1;
            }
            Ok(CoinUpdate::AlreadyApplied) => report.already_rewarded += 1,
            Err(e) => {
                tracing::error!(user_id = result.user_id, test_id, "Coin reward failed: {}", e);
                report.failed += 1;
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::net::SocketAddr;

    use chrono::Utc;

    use super::*;
    use crate::models::user::NewUser;
    use crate::store::MemoryStore;

    fn config() -> Config {
        Config {
            database_url: String::new(),
            jwt_secret: String::new(),
            jwt_expiration: 60,
            rust_log: "error".to_string(),
            admin_username: None,
            admin_password: None,
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            rank_write_attempts: 1,
            podium_coin_rewards: vec![50, 30],
            participation_coin_reward: 5,
        }
    }

    async fn seed_user(store: &MemoryStore, username: &str) -> i64 {
        store
            .create_user(NewUser {
                username: username.to_string(),
                password_hash: "x".to_string(),
                role: "user".to_string(),
                display_name: None,
                profile_picture_url: None,
                batch: Some("B1".to_string()),
            })
            .await
            .unwrap()
            .id
    }

    fn ranked(user_id: i64, rank: i32) -> EvaluatedResult {
        EvaluatedResult {
            user_id,
            test_id: "T1".to_string(),
            total_score: 0.0,
            total_correct: 0,
            attempted: 0,
            accuracy: 0.0,
            time_taken: 0,
            category_scores: BTreeMap::new(),
            rank: Some(rank),
            percentile: Some(100),
            evaluated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_rewards_follow_rank_and_are_paid_once() {
        let store = MemoryStore::new();
        let a = seed_user(&store, "alpha").await;
        let b = seed_user(&store, "bravo").await;
        let c = seed_user(&store, "charlie").await;
        let results = vec![ranked(a, 1), ranked(b, 2), ranked(c, 3)];

        let first = reward_ranked_results(&store, &config(), "T1", &results).await;
        assert_eq!(first.coins_awarded, 85);
        assert_eq!(first.granted, 3);

        let second = reward_ranked_results(&store, &config(), "T1", &results).await;
        assert_eq!(second.coins_awarded, 0);
        assert_eq!(second.already_rewarded, 3);

        let balance = store.coin_balance(c).await.unwrap().unwrap();
        assert_eq!(balance.coins, 5);
        assert_eq!(balance.display_name, "charlie");
        assert_eq!(balance.batch.as_deref(), Some("B1"));
    }

    #[tokio::test]
    async fn test_unknown_user_is_counted_as_failure() {
        let store = MemoryStore::new();
        let a = seed_user(&store, "alpha").await;
        let results = vec![ranked(a, 1), ranked(999, 2)];

        let report = reward_ranked_results(&store, &config(), "T1", &results).await;
        assert_eq!(report.granted, 1);
        assert_eq!(report.failed, 1);
    }
}
