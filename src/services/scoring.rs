// src/services/scoring.rs

//! Per-submission scoring under the +1 / -0.25 marking scheme.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};

use crate::{
    config::{CORRECT_MARK, NEGATIVE_MARK},
    models::{
        leaderboard::QuestionStat,
        question::Question,
        result::{CategoryScore, EvaluatedResult},
        submission::Submission,
    },
};

/// What happened to one question of the paper in one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerOutcome {
    Unanswered,
    Correct,
    Incorrect,
}

/// Why a submission could not be scored. The batch skips it and carries on.
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The answer document is not an object of `questionId -> option` strings.
    MalformedAnswers(String),
    NegativeTime,
    /// Per-question times add up past what an `i64` can hold.
    TimeOverflow(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MalformedAnswers(detail) => write!(f, "malformed answers: {}", detail),
            SkipReason::NegativeTime => write!(f, "negative time taken"),
            SkipReason::TimeOverflow(category) => {
                write!(f, "time spent on category '{}' overflows", category)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredSubmission {
    pub result: EvaluatedResult,
    /// One outcome per question, in paper order.
    pub outcomes: Vec<AnswerOutcome>,
}

/// Reads the raw answer document. `null` and empty strings count as unanswered.
fn parse_answers(raw: &serde_json::Value) -> Result<HashMap<&str, &str>, SkipReason> {
    let object = raw
        .as_object()
        .ok_or_else(|| SkipReason::MalformedAnswers("expected an object".to_string()))?;

    let mut answers = HashMap::with_capacity(object.len());
    for (question_id, value) in object {
        match value {
            serde_json::Value::String(option) if !option.is_empty() => {
                answers.insert(question_id.as_str(), option.as_str());
            }
            serde_json::Value::String(_) | serde_json::Value::Null => {}
            other => {
                return Err(SkipReason::MalformedAnswers(format!(
                    "answer for '{}' is not a string: {}",
                    question_id, other
                )));
            }
        }
    }
    Ok(answers)
}

/// Scores one submission against the paper's questions.
///
/// Answers for question ids outside the paper are ignored.
pub fn score_submission(
    submission: &Submission,
    questions: &[Question],
    evaluated_at: DateTime<Utc>,
) -> Result<ScoredSubmission, SkipReason> {
    if submission.time_taken < 0 || submission.question_times.values().any(|t| *t < 0) {
        return Err(SkipReason::NegativeTime);
    }
    let answers = parse_answers(&submission.answers)?;

    let mut outcomes = Vec::with_capacity(questions.len());
    let mut category_scores: BTreeMap<String, CategoryScore> = BTreeMap::new();
    let mut correct = 0;
    let mut attempted = 0;

    for question in questions {
        let category = category_scores.entry(question.category.clone()).or_default();
        category.total += 1;
        let spent = submission.question_times.get(&question.id).copied().unwrap_or(0);
        category.time = category
            .time
            .checked_add(spent)
            .ok_or_else(|| SkipReason::TimeOverflow(question.category.clone()))?;

        let outcome = match answers.get(question.id.as_str()) {
            None => AnswerOutcome::Unanswered,
            Some(selected) if *selected == question.correct_answer => AnswerOutcome::Correct,
            Some(_) => AnswerOutcome::Incorrect,
        };

        if outcome != AnswerOutcome::Unanswered {
            attempted += 1;
            category.attempted += 1;
        }
        if outcome == AnswerOutcome::Correct {
            correct += 1;
            category.correct += 1;
        }
        outcomes.push(outcome);
    }

    let incorrect = attempted - correct;
    let total_score = correct as f64 * CORRECT_MARK - incorrect as f64 * NEGATIVE_MARK;
    let accuracy = if attempted == 0 {
        0.0
    } else {
        correct as f64 / attempted as f64 * 100.0
    };

    Ok(ScoredSubmission {
        result: EvaluatedResult {
            user_id: submission.user_id,
            test_id: submission.test_id.clone(),
            total_score,
            total_correct: correct,
            attempted,
            accuracy,
            time_taken: submission.time_taken,
            category_scores,
            rank: None,
            percentile: None,
            evaluated_at,
        },
        outcomes,
    })
}

/// Backs the correct-answer count out of a legacy score that only stored
/// the total and the number of attempted questions.
pub fn recover_correct_count(total_score: f64, attempted: i32) -> i32 {
    let correct = (total_score + attempted as f64 * NEGATIVE_MARK) / (CORRECT_MARK + NEGATIVE_MARK);
    (correct.round() as i32).clamp(0, attempted.max(0))
}

/// Running attempt/correct counts per question across a batch.
#[derive(Debug, Clone)]
pub struct QuestionTally {
    question_ids: Vec<String>,
    attempts: Vec<i32>,
    correct: Vec<i32>,
}

impl QuestionTally {
    pub fn new(questions: &[Question]) -> Self {
        Self {
            question_ids: questions.iter().map(|q| q.id.clone()).collect(),
            attempts: vec![0; questions.len()],
            correct: vec![0; questions.len()],
        }
    }

    pub fn record(&mut self, outcomes: &[AnswerOutcome]) {
        for (idx, outcome) in outcomes.iter().enumerate().take(self.question_ids.len()) {
            match outcome {
                AnswerOutcome::Unanswered => {}
                AnswerOutcome::Correct => {
                    self.attempts[idx] += 1;
                    self.correct[idx] += 1;
                }
                AnswerOutcome::Incorrect => self.attempts[idx] += 1,
            }
        }
    }

    pub fn into_stats(self) -> Vec<QuestionStat> {
        self.question_ids
            .into_iter()
            .zip(self.attempts)
            .zip(self.correct)
            .map(|((question_id, total_attempts), correct_count)| QuestionStat {
                question_id,
                total_attempts,
                correct_count,
                correct_percentage: if total_attempts == 0 {
                    0.0
                } else {
                    correct_count as f64 / total_attempts as f64 * 100.0
                },
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn question(id: &str, category: &str, answer: &str) -> Question {
        Question {
            id: id.to_string(),
            category: category.to_string(),
            sub_category: None,
            content: format!("Question {}", id),
            options: Json(vec!["A".into(), "B".into(), "C".into(), "D".into()]),
            correct_answer: answer.to_string(),
            explanation: None,
            created_at: None,
        }
    }

    fn submission(answers: serde_json::Value, time_taken: i64) -> Submission {
        Submission {
            test_id: "T1".to_string(),
            user_id: 1,
            answers: Json(answers),
            question_times: Json(HashMap::new()),
            submitted_at: Utc::now(),
            time_taken,
        }
    }

    fn paper() -> Vec<Question> {
        vec![
            question("q1", "Math", "A"),
            question("q2", "Math", "B"),
            question("q3", "English", "C"),
            question("q4", "English", "D"),
        ]
    }

    #[test]
    fn test_negative_marking() {
        // 2 correct, 1 wrong, 1 unanswered: 2 - 0.25 = 1.75
        let sub = submission(serde_json::json!({"q1": "A", "q2": "B", "q3": "A"}), 600);
        let scored = score_submission(&sub, &paper(), Utc::now()).unwrap();

        assert_eq!(scored.result.total_score, 1.75);
        assert_eq!(scored.result.total_correct, 2);
        assert_eq!(scored.result.attempted, 3);
        assert!((scored.result.accuracy - 66.666).abs() < 0.01);
        assert_eq!(
            scored.outcomes,
            vec![
                AnswerOutcome::Correct,
                AnswerOutcome::Correct,
                AnswerOutcome::Incorrect,
                AnswerOutcome::Unanswered
            ]
        );
    }

    #[test]
    fn test_category_subtotals() {
        let mut sub = submission(serde_json::json!({"q1": "A", "q3": "C", "q4": "A"}), 300);
        sub.question_times = Json(HashMap::from([
            ("q1".to_string(), 40),
            ("q3".to_string(), 25),
            ("q4".to_string(), 35),
        ]));
        let scored = score_submission(&sub, &paper(), Utc::now()).unwrap();

        let math = &scored.result.category_scores["Math"];
        assert_eq!(
            *math,
            CategoryScore { correct: 1, attempted: 1, total: 2, time: 40 }
        );
        let english = &scored.result.category_scores["English"];
        assert_eq!(
            *english,
            CategoryScore { correct: 1, attempted: 2, total: 2, time: 60 }
        );
    }

    #[test]
    fn test_empty_and_null_answers_are_unanswered() {
        let sub = submission(serde_json::json!({"q1": "", "q2": null, "unknown": "A"}), 10);
        let scored = score_submission(&sub, &paper(), Utc::now()).unwrap();
        assert_eq!(scored.result.attempted, 0);
        assert_eq!(scored.result.total_score, 0.0);
        assert_eq!(scored.result.accuracy, 0.0);
    }

    #[test]
    fn test_malformed_answers_are_skipped() {
        let not_object = submission(serde_json::json!(["A", "B"]), 10);
        assert!(matches!(
            score_submission(&not_object, &paper(), Utc::now()),
            Err(SkipReason::MalformedAnswers(_))
        ));

        let numeric = submission(serde_json::json!({"q1": 1}), 10);
        assert!(matches!(
            score_submission(&numeric, &paper(), Utc::now()),
            Err(SkipReason::MalformedAnswers(_))
        ));
    }

    #[test]
    fn test_negative_time_is_skipped() {
        let sub = submission(serde_json::json!({"q1": "A"}), -1);
        assert_eq!(
            score_submission(&sub, &paper(), Utc::now()).unwrap_err(),
            SkipReason::NegativeTime
        );
    }

    #[test]
    fn test_negative_question_time_is_skipped() {
        let mut sub = submission(serde_json::json!({"q1": "A"}), 60);
        sub.question_times = Json(HashMap::from([("q1".to_string(), 30), ("q2".to_string(), -5)]));
        assert_eq!(
            score_submission(&sub, &paper(), Utc::now()).unwrap_err(),
            SkipReason::NegativeTime
        );
    }

    #[test]
    fn test_category_time_overflow_is_skipped() {
        // q1 and q2 are both Math
        let mut sub = submission(serde_json::json!({"q1": "A"}), 60);
        sub.question_times = Json(HashMap::from([
            ("q1".to_string(), i64::MAX),
            ("q2".to_string(), 1),
        ]));
        assert_eq!(
            score_submission(&sub, &paper(), Utc::now()).unwrap_err(),
            SkipReason::TimeOverflow("Math".to_string())
        );
    }

    #[test]
    fn test_recover_correct_count_fixtures() {
        // 7 correct of 10 attempted: 7 - 0.75 = 6.25
        assert_eq!(recover_correct_count(6.25, 10), 7);
        // 8 correct of 10 attempted: 8 - 0.5 = 7.5
        assert_eq!(recover_correct_count(7.5, 10), 8);
        assert_eq!(recover_correct_count(7.0, 7), 7);
        assert_eq!(recover_correct_count(0.0, 0), 0);
    }

    #[test]
    fn test_recover_correct_count_matches_scoring() {
        for attempted in 0..=40 {
            for correct in 0..=attempted {
                let score = correct as f64 - (attempted - correct) as f64 * NEGATIVE_MARK;
                assert_eq!(recover_correct_count(score, attempted), correct);
            }
        }
    }

    #[test]
    fn test_question_tally() {
        let questions = paper();
        let mut tally = QuestionTally::new(&questions);
        tally.record(&[
            AnswerOutcome::Correct,
            AnswerOutcome::Incorrect,
            AnswerOutcome::Unanswered,
            AnswerOutcome::Correct,
        ]);
        tally.record(&[
            AnswerOutcome::Correct,
            AnswerOutcome::Correct,
            AnswerOutcome::Unanswered,
            AnswerOutcome::Incorrect,
        ]);

        let stats = tally.into_stats();
        assert_eq!(stats[0].total_attempts, 2);
        assert_eq!(stats[0].correct_percentage, 100.0);
        assert_eq!(stats[1].correct_count, 1);
        assert_eq!(stats[1].correct_percentage, 50.0);
        assert_eq!(stats[2].total_attempts, 0);
        assert_eq!(stats[2].correct_percentage, 0.0);
    }
}
