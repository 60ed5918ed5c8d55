// src/models/result.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Subtotal for one question category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CategoryScore {
    pub correct: i32,
    pub attempted: i32,
    pub total: i32,
    /// Seconds spent on this category's questions.
    pub time: i64,
}

/// The scored outcome of one submission.
/// `rank` and `percentile` are attached once the leaderboard has been built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EvaluatedResult {
    pub user_id: i64,
    pub test_id: String,
    pub total_score: f64,
    pub total_correct: i32,
    pub attempted: i32,
    /// Percentage of attempted questions answered correctly.
    pub accuracy: f64,
    pub time_taken: i64,
    pub category_scores: BTreeMap<String, CategoryScore>,
    pub rank: Option<i32>,
    pub percentile: Option<i32>,
    pub evaluated_at: DateTime<Utc>,
}
