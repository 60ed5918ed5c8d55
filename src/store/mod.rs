// src/store/mod.rs

//! Persistence seam for the live-test services.
//!
//! Handlers and services only talk to [`Store`]; `PgStore` backs it with
//! Postgres and `MemoryStore` keeps everything in process for tests.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

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
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Shared handle used in `AppState` and spawned tasks.
pub type DynStore = Arc<dyn Store>;

#[async_trait]
pub trait Store: Send + Sync + 'static {
    // Users

    /// Inserts a user. Duplicate usernames yield `AppError::Conflict`.
    async fn create_user(&self, user: NewUser) -> Result<User, AppError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn find_user(&self, user_id: i64) -> Result<Option<User>, AppError>;

    /// Profiles for the given ids. Unknown ids are left out of the map.
    async fn user_profiles(&self, user_ids: &[i64]) -> Result<HashMap<i64, UserProfile>, AppError>;

    // Question bank

    /// Inserts a question. Duplicate ids yield `AppError::Conflict`.
    async fn create_question(&self, question: Question) -> Result<Question, AppError>;

    /// Questions for the given ids. Unknown ids are left out.
    async fn questions_by_ids(&self, ids: &[String]) -> Result<Vec<Question>, AppError>;

    // Live tests

    async fn create_live_test(&self, test: LiveTest) -> Result<LiveTest, AppError>;

    async fn find_live_test(&self, test_id: &str) -> Result<Option<LiveTest>, AppError>;

    // Submissions

    /// Stores a submission. A second submission by the same user yields `AppError::Conflict`.
    async fn create_submission(&self, submission: Submission) -> Result<(), AppError>;

    async fn submissions_for_test(&self, test_id: &str) -> Result<Vec<Submission>, AppError>;

    // Evaluated results

    /// Inserts or replaces the user's result for the test.
    async fn save_result(&self, result: &EvaluatedResult) -> Result<(), AppError>;

    /// Attaches rank and percentile to an already saved result.
    async fn set_result_rank(
        &self,
        test_id: &str,
        user_id: i64,
        rank: i32,
        percentile: i32,
    ) -> Result<(), AppError>;

    async fn find_result(&self, test_id: &str, user_id: i64) -> Result<Option<EvaluatedResult>, AppError>;

    /// The user's most recently evaluated result across all tests.
    async fn latest_result(&self, user_id: i64) -> Result<Option<EvaluatedResult>, AppError>;

    // Leaderboard cache

    /// Replaces the cached leaderboard for `cache.test_id`, keeping the original `created_at`.
    async fn put_leaderboard(&self, cache: &LeaderboardCache) -> Result<(), AppError>;

    async fn find_leaderboard(&self, test_id: &str) -> Result<Option<LeaderboardCache>, AppError>;

    // Coin ledger

    /// Applies a grant atomically. The balance row is seeded from `seed` when missing.
    /// A resulting negative balance yields `AppError::BadRequest`.
    async fn apply_coin_delta(&self, grant: CoinGrant, seed: UserProfile) -> Result<CoinUpdate, AppError>;

    async fn coin_balance(&self, user_id: i64) -> Result<Option<CoinLedgerEntry>, AppError>;

    /// Newest first.
    async fn coin_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<CoinTransaction>, AppError>;

    /// Highest balances first.
    async fn top_coin_balances(&self, limit: i64) -> Result<Vec<CoinLedgerEntry>, AppError>;
}
