// src/store/postgres.rs

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, prelude::FromRow, types::Json};

use crate::{
    error::AppError,
    models::{
        coin::{CoinGrant, CoinLedgerEntry, CoinTransaction, CoinUpdate},
        leaderboard::{LeaderboardCache, LeaderboardEntry, QuestionStat},
        live_test::LiveTest,
        question::Question,
        result::{CategoryScore, EvaluatedResult},
        submission::Submission,
        user::{NewUser, User, UserProfile},
    },
    services::scoring::recover_correct_count,
    store::Store,
};

const USER_COLUMNS: &str =
    "id, username, password, role, display_name, profile_picture_url, batch, created_at";

const QUESTION_COLUMNS: &str =
    "id, category, sub_category, content, options, correct_answer, explanation, created_at";

const RESULT_COLUMNS: &str = "test_id, user_id, total_score, total_correct, attempted, accuracy, \
     time_taken, category_scores, rank, percentile, evaluated_at";

const COIN_COLUMNS: &str = "user_id, coins, display_name, profile_picture_url, batch, updated_at";

/// Postgres-backed [`Store`].
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

/// Row shape of 'evaluated_results'. Legacy rows only carry the score and
/// attempted count, so `total_correct` is nullable.
#[derive(FromRow)]
struct ResultRow {
    test_id: String,
    user_id: i64,
    total_score: f64,
    total_correct: Option<i32>,
    attempted: i32,
    accuracy: f64,
    time_taken: i64,
    category_scores: Json<BTreeMap<String, CategoryScore>>,
    rank: Option<i32>,
    percentile: Option<i32>,
    evaluated_at: DateTime<Utc>,
}

impl From<ResultRow> for EvaluatedResult {
    fn from(row: ResultRow) -> Self {
        let total_correct = row
            .total_correct
            .unwrap_or_else(|| recover_correct_count(row.total_score, row.attempted));
        EvaluatedResult {
            user_id: row.user_id,
            test_id: row.test_id,
            total_score: row.total_score,
            total_correct,
            attempted: row.attempted,
            accuracy: row.accuracy,
            time_taken: row.time_taken,
            category_scores: row.category_scores.0,
            rank: row.rank,
            percentile: row.percentile,
            evaluated_at: row.evaluated_at,
        }
    }
}

#[derive(FromRow)]
struct LeaderboardRow {
    test_id: String,
    entries: Json<Vec<LeaderboardEntry>>,
    question_stats: Json<Vec<QuestionStat>>,
    participant_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, user: NewUser) -> Result<User, AppError> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password, role, display_name, profile_picture_url, batch)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.role)
        .bind(&user.display_name)
        .bind(&user.profile_picture_url)
        .bind(&user.batch)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Username '{}' already exists", user.username))
            } else {
                tracing::error!("Failed to create user: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn user_profiles(&self, user_ids: &[i64]) -> Result<HashMap<i64, UserProfile>, AppError> {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ANY($1)"
        ))
        .bind(user_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(users.iter().map(|u| (u.id, UserProfile::from(u))).collect())
    }

    async fn create_question(&self, question: Question) -> Result<Question, AppError> {
        sqlx::query_as::<_, Question>(&format!(
            r#"
            INSERT INTO questions (id, category, sub_category, content, options, correct_answer, explanation)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {QUESTION_COLUMNS}
            "#
        ))
        .bind(&question.id)
        .bind(&question.category)
        .bind(&question.sub_category)
        .bind(&question.content)
        .bind(&question.options)
        .bind(&question.correct_answer)
        .bind(&question.explanation)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Question '{}' already exists", question.id))
            } else {
                tracing::error!("Failed to create question: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn questions_by_ids(&self, ids: &[String]) -> Result<Vec<Question>, AppError> {
        let rows = sqlx::query_as::<_, Question>(&format!(
            "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        // Keep the caller's order, which is the paper order.
        let mut by_id: HashMap<String, Question> = rows.into_iter().map(|q| (q.id.clone(), q)).collect();
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn create_live_test(&self, test: LiveTest) -> Result<LiveTest, AppError> {
        sqlx::query_as::<_, LiveTest>(
            r#"
            INSERT INTO live_tests (id, title, question_ids, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, title, question_ids, starts_at, ends_at, created_at
            "#,
        )
        .bind(&test.id)
        .bind(&test.title)
        .bind(&test.question_ids)
        .bind(test.starts_at)
        .bind(test.ends_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict(format!("Live test '{}' already exists", test.id))
            } else {
                tracing::error!("Failed to create live test: {:?}", e);
                AppError::from(e)
            }
        })
    }

    async fn find_live_test(&self, test_id: &str) -> Result<Option<LiveTest>, AppError> {
        let test = sqlx::query_as::<_, LiveTest>(
            "SELECT id, title, question_ids, starts_at, ends_at, created_at FROM live_tests WHERE id = $1",
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(test)
    }

    async fn create_submission(&self, submission: Submission) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO submissions (test_id, user_id, answers, question_times, submitted_at, time_taken)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&submission.test_id)
        .bind(submission.user_id)
        .bind(&submission.answers)
        .bind(&submission.question_times)
        .bind(submission.submitted_at)
        .bind(submission.time_taken)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("You have already submitted this live test".to_string())
            } else {
                tracing::error!("Failed to store submission: {:?}", e);
                AppError::from(e)
            }
        })?;
        Ok(())
    }

    async fn submissions_for_test(&self, test_id: &str) -> Result<Vec<Submission>, AppError> {
        let submissions = sqlx::query_as::<_, Submission>(
            r#"
            SELECT test_id, user_id, answers, question_times, submitted_at, time_taken
            FROM submissions
            WHERE test_id = $1
            ORDER BY user_id
            "#,
        )
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(submissions)
    }

    async fn save_result(&self, result: &EvaluatedResult) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO evaluated_results
                (test_id, user_id, total_score, total_correct, attempted, accuracy,
                 time_taken, category_scores, rank, percentile, evaluated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (test_id, user_id) DO UPDATE SET
                total_score = EXCLUDED.total_score,
                total_correct = EXCLUDED.total_correct,
                attempted = EXCLUDED.attempted,
                accuracy = EXCLUDED.accuracy,
                time_taken = EXCLUDED.time_taken,
                category_scores = EXCLUDED.category_scores,
                rank = EXCLUDED.rank,
                percentile = EXCLUDED.percentile,
                evaluated_at = EXCLUDED.evaluated_at
            "#,
        )
        .bind(&result.test_id)
        .bind(result.user_id)
        .bind(result.total_score)
        .bind(result.total_correct)
        .bind(result.attempted)
        .bind(result.accuracy)
        .bind(result.time_taken)
        .bind(Json(&result.category_scores))
        .bind(result.rank)
        .bind(result.percentile)
        .bind(result.evaluated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn set_result_rank(
        &self,
        test_id: &str,
        user_id: i64,
        rank: i32,
        percentile: i32,
    ) -> Result<(), AppError> {
        let updated = sqlx::query(
            "UPDATE evaluated_results SET rank = $3, percentile = $4 WHERE test_id = $1 AND user_id = $2",
        )
        .bind(test_id)
        .bind(user_id)
        .bind(rank)
        .bind(percentile)
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Result for user {} not found", user_id)));
        }
        Ok(())
    }

    async fn find_result(&self, test_id: &str, user_id: i64) -> Result<Option<EvaluatedResult>, AppError> {
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM evaluated_results WHERE test_id = $1 AND user_id = $2"
        ))
        .bind(test_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EvaluatedResult::from))
    }

    async fn latest_result(&self, user_id: i64) -> Result<Option<EvaluatedResult>, AppError> {
        let row = sqlx::query_as::<_, ResultRow>(&format!(
            r#"
            SELECT {RESULT_COLUMNS}
            FROM evaluated_results
            WHERE user_id = $1
            ORDER BY evaluated_at DESC
            LIMIT 1
            "#
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(EvaluatedResult::from))
    }

    async fn put_leaderboard(&self, cache: &LeaderboardCache) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO leaderboard_cache
                (test_id, entries, question_stats, participant_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (test_id) DO UPDATE SET
                entries = EXCLUDED.entries,
                question_stats = EXCLUDED.question_stats,
                participant_count = EXCLUDED.participant_count,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&cache.test_id)
        .bind(Json(&cache.entries))
        .bind(Json(&cache.question_stats))
        .bind(cache.participant_count)
        .bind(cache.created_at)
        .bind(cache.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_leaderboard(&self, test_id: &str) -> Result<Option<LeaderboardCache>, AppError> {
        let row = sqlx::query_as::<_, LeaderboardRow>(
            r#"
            SELECT test_id, entries, question_stats, participant_count, created_at, updated_at
            FROM leaderboard_cache
            WHERE test_id = $1
            "#,
        )
        .bind(test_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| LeaderboardCache {
            test_id: r.test_id,
            entries: r.entries.0,
            question_stats: r.question_stats.0,
            participant_count: r.participant_count,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }))
    }

    async fn apply_coin_delta(&self, grant: CoinGrant, seed: UserProfile) -> Result<CoinUpdate, AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO coin_balances (user_id, coins, display_name, profile_picture_url, batch)
            VALUES ($1, 0, $2, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(grant.user_id)
        .bind(&seed.display_name)
        .bind(&seed.profile_picture_url)
        .bind(&seed.batch)
        .execute(&mut *tx)
        .await?;

        // Row lock serializes concurrent grants for the same user until commit.
        let current: i64 = sqlx::query_scalar("SELECT coins FROM coin_balances WHERE user_id = $1 FOR UPDATE")
            .bind(grant.user_id)
            .fetch_one(&mut *tx)
            .await?;

        if let Some(reference) = &grant.reference {
            let seen: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM coin_transactions WHERE user_id = $1 AND reference = $2",
            )
            .bind(grant.user_id)
            .bind(reference)
            .fetch_optional(&mut *tx)
            .await?;
            if seen.is_some() {
                tx.rollback().await?;
                return Ok(CoinUpdate::AlreadyApplied);
            }
        }

        let balance_after = current + grant.delta;
        if balance_after < 0 {
            tx.rollback().await?;
            return Err(AppError::BadRequest("Insufficient coins".to_string()));
        }

        let entry = sqlx::query_as::<_, CoinLedgerEntry>(&format!(
            r#"
            UPDATE coin_balances
            SET coins = $2, updated_at = CURRENT_TIMESTAMP
            WHERE user_id = $1
            RETURNING {COIN_COLUMNS}
            "#
        ))
        .bind(grant.user_id)
        .bind(balance_after)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO coin_transactions (user_id, delta, balance_after, reason, reference)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(grant.user_id)
        .bind(grant.delta)
        .bind(balance_after)
        .bind(&grant.reason)
        .bind(&grant.reference)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(CoinUpdate::Applied(entry))
    }

    async fn coin_balance(&self, user_id: i64) -> Result<Option<CoinLedgerEntry>, AppError> {
        let entry = sqlx::query_as::<_, CoinLedgerEntry>(&format!(
            "SELECT {COIN_COLUMNS} FROM coin_balances WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(entry)
    }

    async fn coin_transactions(&self, user_id: i64, limit: i64) -> Result<Vec<CoinTransaction>, AppError> {
        let rows = sqlx::query_as::<_, CoinTransaction>(
            r#"
            SELECT id, user_id, delta, balance_after, reason, reference, created_at
            FROM coin_transactions
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn top_coin_balances(&self, limit: i64) -> Result<Vec<CoinLedgerEntry>, AppError> {
        let rows = sqlx::query_as::<_, CoinLedgerEntry>(&format!(
            "SELECT {COIN_COLUMNS} FROM coin_balances ORDER BY coins DESC, user_id ASC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}
