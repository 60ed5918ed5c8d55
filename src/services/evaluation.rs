// src/services/evaluation.rs

//! Admin-triggered batch evaluation of a live test.
//!
//! Load the paper and every submission, score each one, rank the results,
//! overwrite the leaderboard cache, write ranks back per user, then pay coins.

use std::collections::HashSet;

use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::Config,
    error::AppError,
    models::{live_test::LiveTest, question::Question},
    services::{
        coins::reward_ranked_results,
        leaderboard::{build_cache, rank_results, write_back_ranks},
        scoring::{QuestionTally, score_submission},
    },
    store::DynStore,
};

/// Response body of the evaluation trigger.
#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct EvaluationSummary {
    pub test_id: String,
    /// Submissions scored and ranked.
    pub evaluated: usize,
    /// Submissions skipped as malformed.
    pub skipped: usize,
    pub participants: usize,
    pub rank_updates_failed: Vec<i64>,
    pub coins_awarded: i64,
    pub message: String,
}

/// Loads the live test and its questions in paper order.
/// Every referenced question must exist.
pub async fn load_paper(store: &DynStore, test_id: &str) -> Result<(LiveTest, Vec<Question>), AppError> {
    let test = store
        .find_live_test(test_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Live test '{}' not found", test_id)))?;

    let questions = store.questions_by_ids(&test.question_ids).await?;
    if questions.len() != test.question_ids.len() {
        let found: HashSet<&str> = questions.iter().map(|q| q.id.as_str()).collect();
        let missing = test
            .question_ids
            .iter()
            .find(|id| !found.contains(id.as_str()))
            .cloned()
            .unwrap_or_default();
        return Err(AppError::NotFound(format!("Question '{}' not found", missing)));
    }
    if questions.is_empty() {
        return Err(AppError::NotFound(format!(
            "Question bank for live test '{}' is empty",
            test_id
        )));
    }

    Ok((test, questions))
}

pub async fn evaluate_live_test(
    store: DynStore,
    config: &Config,
    test_id: &str,
) -> Result<EvaluationSummary, AppError> {
    let (test, questions) = load_paper(&store, test_id).await?;

    let submissions = store.submissions_for_test(&test.id).await?;
    if submissions.is_empty() {
        return Err(AppError::NoData(
            "No user submissions found for this live test".to_string(),
        ));
    }

    tracing::info!(
        test_id,
        submissions = submissions.len(),
        questions = questions.len(),
        "Evaluating live test"
    );

    let evaluated_at = Utc::now();
    let mut tally = QuestionTally::new(&questions);
    let mut results = Vec::with_capacity(submissions.len());
    let mut skipped = 0;

    for submission in &submissions {
        match score_submission(submission, &questions, evaluated_at) {
            Ok(scored) => {
                tally.record(&scored.outcomes);
                results.push(scored.result);
            }
            Err(reason) => {
                tracing::warn!(
                    user_id = submission.user_id,
                    test_id,
                    "Skipping submission: {}",
                    reason
                );
                skipped += 1;
            }
        }
    }

    if results.is_empty() {
        return Err(AppError::NoData(
            "No evaluable user submissions found for this live test".to_string(),
        ));
    }

    for result in &results {
        store.save_result(result).await?;
    }

    let ranked = rank_results(results);
    let user_ids: Vec<i64> = ranked.iter().map(|r| r.user_id).collect();
    let profiles = store.user_profiles(&user_ids).await?;

    // Only written once every submission has been scored.
    let cache = build_cache(&test.id, &ranked, &profiles, tally.into_stats(), Utc::now());
    store.put_leaderboard(&cache).await?;

    let back_writes = write_back_ranks(store.clone(), &test.id, &ranked, config.rank_write_attempts).await;
    let rewards = reward_ranked_results(store.as_ref(), config, &test.id, &ranked).await;

    tracing::info!(
        test_id,
        evaluated = ranked.len(),
        skipped,
        rank_updates_failed = back_writes.failed.len(),
        coins_awarded = rewards.coins_awarded,
        "Live test evaluated"
    );

    Ok(EvaluationSummary {
        test_id: test.id.clone(),
        evaluated: ranked.len(),
        skipped,
        participants: cache.entries.len(),
        rank_updates_failed: back_writes.failed.iter().map(|f| f.user_id).collect(),
        coins_awarded: rewards.coins_awarded,
        message: format!("Evaluated {} submissions for '{}'", ranked.len(), test.title),
    })
}
