// src/store/memory.rs

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::{
    error::AppError,
    models::{
        coin::{CoinGrant, CoinLedgerEntry, CoinTransaction, CoinUpdate},
        leaderboard::LeaderboardCache,
        live_test::LiveTest,
        question::Question,
        result::EvaluatedResult,
        submission::Submission,
        user::{NewUser, User, UserProfile},
    },
    store::Store,
};

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    questions: HashMap<String, Question>,
    live_tests: HashMap<String, LiveTest>,
    submissions: BTreeMap<(String, i64), Submission>,
    results: BTreeMap<(String, i64), EvaluatedResult>,
    leaderboards: HashMap<String, LeaderboardCache>,
    coin_balances: HashMap<i64, CoinLedgerEntry>,
    coin_transactions: Vec<CoinTransaction>,
    coin_references: HashSet<(i64, String)>,
}

/// In-process [`Store`]. A single mutex serializes every operation, which
/// gives coin grants the same all-or-nothing behavior as the Postgres transaction.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut inner = self.inner.lock().await;
        if inner.users.values().any(|u| u.username == user.username) {
            return Err(AppError::Conflict(format!(
                "Username '{}' already exists",
                user.username
            )));
        }
        let id = inner.users.keys().next_back().map_or(1, |last| last + 1);
        let created = User {
            id,
            username: user.username,
            password: user.password_hash,
            role: user.role,
            display_name: user.display_name,
            profile_picture_url: user.profile_picture_url,
            batch: user.batch,
            created_at: Some(Utc::now()),
        };
        inner.users.insert(id, created.clone());
        Ok(created)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        Ok(self.inner.lock().await.users.get(&user_id).cloned())
    }

    async fn user_profiles(&self, user_ids: &[i64]) -> Result<HashMap<i64, UserProfile>, AppError> {
        let inner = self.inner.lock().await;
        Ok(user_ids
            .iter()
            .filter_map(|id| inner.users.get(id))
            .map(|u| (u.id, UserProfile::from(u)))
            .collect())
    }

    async fn create_question(&self, mut question: Question) -> Result<Question, AppError> {
        let mut inner = self.inner.lock().await;
        if inner.questions.contains_key(&question.id) {
            return Err(AppError::Conflict(format!(
                "Question '{}' already exists",
                question.id
            )));
        }
        question.created_at.get_or_insert_with(Utc::now);
        inner.questions.insert(question.id.clone(), question.clone());
        Ok(question)
    }

    async fn questions_by_ids(&self, ids: &[String]) -> Result<Vec<Question>, AppError> {
        let inner = self.inner.lock().await;
        Ok(ids
            .iter()
            .filter_map(|id| inner.questions.get(id))
            .cloned()
            .collect())
    }

    async fn create_live_test(&self, mut test: LiveTest) -> Result<LiveTest, AppError> {
        let mut inner = self.inner.lock().await;
        if inner.live_tests.contains_key(&test.id) {
            return Err(AppError::Conflict(format!(
                "Live test '{}' already exists",
                test.id
            )));
        }
        test.created_at.get_or_insert_with(Utc::now);
        inner.live_tests.insert(test.id.clone(), test.clone());
        Ok(test)
    }

    async fn find_live_test(&self, test_id: &str) -> Result<Option<LiveTest>, AppError> {
        Ok(self.inner.lock().await.live_tests.get(test_id).cloned())
    }

    async fn create_submission(&self, submission: Submission) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let key = (submission.test_id.clone(), submission.user_id);
        if inner.submissions.contains_key(&key) {
            return Err(AppError::Conflict(
                "You have already submitted this live test".to_string(),
            ));
        }
        inner.submissions.insert(key, submission);
        Ok(())
    }

    async fn submissions_for_test(&self, test_id: &str) -> Result<Vec<Submission>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .submissions
            .values()
            .filter(|s| s.test_id == test_id)
            .cloned()
            .collect())
    }

    async fn save_result(&self, result: &EvaluatedResult) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        inner
            .results
            .insert((result.test_id.clone(), result.user_id), result.clone());
        Ok(())
    }

    async fn set_result_rank(
        &self,
        test_id: &str,
        user_id: i64,
        rank: i32,
        percentile: i32,
    ) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let result = inner
            .results
            .get_mut(&(test_id.to_string(), user_id))
            .ok_or_else(|| AppError::NotFound(format!("Result for user {} not found", user_id)))?;
        result.rank = Some(rank);
        result.percentile = Some(percentile);
        Ok(())
    }

    async fn find_result(&self, test_id: &str, user_id: i64) -> Result<Option<EvaluatedResult>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner.results.get(&(test_id.to_string(), user_id)).cloned())
    }

    async fn latest_result(&self, user_id: i64) -> Result<Option<EvaluatedResult>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .results
            .values()
            .filter(|r| r.user_id == user_id)
            .max_by_key(|r| r.evaluated_at)
            .cloned())
    }

    async fn put_leaderboard(&self, cache: &LeaderboardCache) -> Result<(), AppError> {
        let mut inner = self.inner.lock().await;
        let mut snapshot = cache.clone();
        if let Some(previous) = inner.leaderboards.get(&cache.test_id) {
            snapshot.created_at = previous.created_at;
        }
        inner.leaderboards.insert(cache.test_id.clone(), snapshot);
        Ok(())
    }

    async fn find_leaderboard(&self, test_id: &str) -> Result<Option<LeaderboardCache>, AppError> {
        Ok(self.inner.lock().await.leaderboards.get(test_id).cloned())
    }

    async fn apply_coin_delta(&self, grant: CoinGrant, seed: UserProfile) -> Result<CoinUpdate, AppError> {
        let mut inner = self.inner.lock().await;

        if let Some(reference) = &grant.reference {
            if inner
                .coin_references
                .contains(&(grant.user_id, reference.clone()))
            {
                return Ok(CoinUpdate::AlreadyApplied);
            }
        }

        let current = inner
            .coin_balances
            .get(&grant.user_id)
            .map_or(0, |entry| entry.coins);
        let balance_after = current + grant.delta;
        if balance_after < 0 {
            return Err(AppError::BadRequest("Insufficient coins".to_string()));
        }

        let now = Utc::now();
        let entry = inner
            .coin_balances
            .entry(grant.user_id)
            .or_insert_with(|| CoinLedgerEntry {
                user_id: grant.user_id,
                coins: 0,
                display_name: seed.display_name,
                profile_picture_url: seed.profile_picture_url,
                batch: seed.batch,
                updated_at: None,
            });
        entry.coins = balance_after;
        entry.updated_at = Some(now);
        let updated = entry.clone();

        let id = inner.coin_transactions.len() as i64 + 1;
        inner.coin_transactions.push(CoinTransaction {
            id,
            user_id: grant.user_id,
            delta: grant.delta,
            balance_after,
            reason: grant.reason,
            reference: grant.reference.clone(),
            created_at: Some(now),
        });
        if let Some(reference) = grant.reference {
            inner.coin_references.insert((grant.user_id, reference));
        }

        Ok(CoinUpdate::Applied(updated))
    }

    async fn coin_balance(&self, user_id: i64) -> Result<Option<CoinLedgerEntry>, AppError> {
        Ok(self.inner.lock().await.coin_balances.get(&user_id).cloned())
    }

    async fn coin_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<CoinTransaction>, AppError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .coin_transactions
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn top_coin_balances(&self, limit: i64) -> Result<Vec<CoinLedgerEntry>, AppError> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<CoinLedgerEntry> = inner.coin_balances.values().cloned().collect();
        entries.sort_by(|a, b| b.coins.cmp(&a.coins).then(a.user_id.cmp(&b.user_id)));
        entries.truncate(limit.max(0) as usize);
        Ok(entries)
    }
}
