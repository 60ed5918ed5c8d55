// src/models/submission.rs

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use utoipa::ToSchema;
use validator::Validate;

/// Upper bound, in seconds, for the total and per-question times a client may report.
pub const MAX_REPORTED_SECONDS: i64 = 86_400;

/// Represents the 'submissions' table. One row per user per live test.
///
/// `answers` is kept as raw JSON: documents written by older clients are not
/// guaranteed to be a `{questionId: option}` object and are checked at evaluation time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Submission {
    pub test_id: String,
    pub user_id: i64,
    pub answers: Json<serde_json::Value>,
    /// Seconds spent per question id, when the client reported it.
    pub question_times: Json<HashMap<String, i64>>,
    pub submitted_at: DateTime<Utc>,
    /// Total seconds spent on the test.
    pub time_taken: i64,
}

/// DTO for submitting answers to a live test.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct SubmitAnswersRequest {
    /// Key: Question ID. Value: the selected option.
    pub answers: HashMap<String, String>,
    #[validate(range(min = 0, max = 86_400))]
    pub time_taken: i64,
    #[serde(default)]
    pub question_times: HashMap<String, i64>,
}
