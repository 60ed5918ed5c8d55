// src/services/leaderboard.rs

//! Ranking, percentile assignment and the cached leaderboard snapshot.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::{
    config::ACCURACY_EPSILON,
    error::AppError,
    models::{
        leaderboard::{LeaderboardCache, LeaderboardEntry, QuestionStat},
        result::EvaluatedResult,
        user::UserProfile,
    },
    store::{DynStore, Store},
};

/// Accuracy quantised to `ACCURACY_EPSILON` steps, so near-equal floats compare equal
/// while the comparison stays transitive.
fn accuracy_bucket(accuracy: f64) -> i64 {
    (accuracy / ACCURACY_EPSILON).round() as i64
}

/// Leaderboard order: score desc, correct desc, accuracy desc, time asc.
/// User id breaks any remaining tie so the order is total.
pub fn compare_results(a: &EvaluatedResult, b: &EvaluatedResult) -> Ordering {
    b.total_score
        .total_cmp(&a.total_score)
        .then_with(|| b.total_correct.cmp(&a.total_correct))
        .then_with(|| accuracy_bucket(b.accuracy).cmp(&accuracy_bucket(a.accuracy)))
        .then_with(|| a.time_taken.cmp(&b.time_taken))
        .then_with(|| a.user_id.cmp(&b.user_id))
}

/// `round((N - index) / N * 100)` for a 0-based position.
pub fn percentile(index: usize, participants: usize) -> i32 {
    if participants == 0 {
        return 0;
    }
    ((participants - index) as f64 / participants as f64 * 100.0).round() as i32
}

/// Sorts the results and attaches 1-based ranks and percentiles.
/// Ties never share a rank.
pub fn rank_results(mut results: Vec<EvaluatedResult>) -> Vec<EvaluatedResult> {
    results.sort_by(compare_results);
    let participants = results.len();
    for (index, result) in results.iter_mut().enumerate() {
        result.rank = Some(index as i32 + 1);
        result.percentile = Some(percentile(index, participants));
    }
    results
}

/// Builds the snapshot written to the leaderboard cache from already ranked results.
pub fn build_cache(
    test_id: &str,
    ranked: &[EvaluatedResult],
    profiles: &HashMap<i64, UserProfile>,
    question_stats: Vec<QuestionStat>,
    now: DateTime<Utc>,
) -> LeaderboardCache {
    let entries = ranked
        .iter()
        .enumerate()
        .map(|(index, result)| LeaderboardEntry {
            user_id: result.user_id,
            display_name: profiles
                .get(&result.user_id)
                .map(|p| p.display_name.clone())
                .unwrap_or_else(|| format!("User {}", result.user_id)),
            total_score: result.total_score,
            total_correct: result.total_correct,
            accuracy: result.accuracy,
            time_taken: result.time_taken,
            rank: result.rank.unwrap_or(index as i32 + 1),
            percentile: result
                .percentile
                .unwrap_or_else(|| percentile(index, ranked.len())),
        })
        .collect();

    LeaderboardCache {
        test_id: test_id.to_string(),
        entries,
        question_stats,
        participant_count: ranked.len() as i32,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BackWriteFailure {
    pub user_id: i64,
    pub error: String,
}

/// Per-user outcome of writing rank and percentile back onto stored results.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BackWriteReport {
    pub updated: usize,
    pub failed: Vec<BackWriteFailure>,
}

async fn write_rank_with_retry(
    store: &dyn Store,
    test_id: &str,
    user_id: i64,
    rank: i32,
    percentile: i32,
    attempts: u32,
) -> Result<(), AppError> {
    let mut attempt = 1;
    loop {
        match store.set_result_rank(test_id, user_id, rank, percentile).await {
            Ok(()) => return Ok(()),
            Err(e @ AppError::NotFound(_)) => return Err(e),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                tracing::warn!(
                    user_id,
                    test_id,
                    attempt,
                    "Rank write failed, retrying: {}",
                    e
                );
                tokio::time::sleep(Duration::from_millis(50 * attempt as u64)).await;
                attempt += 1;
            }
        }
    }
}

/// Writes every user's rank concurrently. One user's failure never blocks
/// or hides another's; each outcome lands in the report.
pub async fn write_back_ranks(
    store: DynStore,
    test_id: &str,
    ranked: &[EvaluatedResult],
    attempts: u32,
) -> BackWriteReport {
    let mut tasks = JoinSet::new();
    let mut pending: HashSet<i64> = HashSet::with_capacity(ranked.len());

    for result in ranked {
        let (Some(rank), Some(pct)) = (result.rank, result.percentile) else {
            continue;
        };
        let store = store.clone();
        let test_id = test_id.to_string();
        let user_id = result.user_id;
        pending.insert(user_id);
        tasks.spawn(async move {
            let outcome =
                write_rank_with_retry(store.as_ref(), &test_id, user_id, rank, pct, attempts).await;
            (user_id, outcome)
        });
    }

    let mut report = BackWriteReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((user_id, Ok(()))) => {
                pending.remove(&user_id);
                report.updated += 1;
            }
            Ok((user_id, Err(e))) => {
                pending.remove(&user_id);
                tracing::error!(user_id, test_id, "Failed to write rank: {}", e);
                report.failed.push(BackWriteFailure {
                    user_id,
                    error: e.message().to_string(),
                });
            }
            Err(join_error) => {
                tracing::error!(test_id, "Rank write task aborted: {}", join_error);
            }
        }
    }

    // Whatever is still pending belongs to a task that panicked.
    let mut aborted: Vec<i64> = pending.into_iter().collect();
    aborted.sort_unstable();
    report
        .failed
        .extend(aborted.into_iter().map(|user_id| BackWriteFailure {
            user_id,
            error: "rank write task aborted".to_string(),
        }));
    report.failed.sort_by_key(|f| f.user_id);
    report
}
