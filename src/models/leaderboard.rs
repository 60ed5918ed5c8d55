// src/models/leaderboard.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One ranked row of a cached leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardEntry {
    pub user_id: i64,
    pub display_name: String,
    pub total_score: f64,
    pub total_correct: i32,
    pub accuracy: f64,
    pub time_taken: i64,
    pub rank: i32,
    pub percentile: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct QuestionStat {
    pub question_id: String,
    pub total_attempts: i32,
    pub correct_count: i32,
    pub correct_percentage: f64,
}

/// Denormalized snapshot of a live test's full ranking.
/// Rewritten wholesale on every evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LeaderboardCache {
    pub test_id: String,
    pub entries: Vec<LeaderboardEntry>,
    pub question_stats: Vec<QuestionStat>,
    pub participant_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
