// src/models/live_test.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use utoipa::ToSchema;
use validator::Validate;

use crate::models::question::PublicQuestion;

/// Represents the 'live_tests' table: test metadata plus its answer key reference.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct LiveTest {
    pub id: String,
    pub title: String,

    /// Ordered question ids making up the paper.
    #[schema(value_type = Vec<String>)]
    pub question_ids: Json<Vec<String>>,

    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
}

impl LiveTest {
    /// Whether a submission arriving at `now` falls inside the test window.
    /// Missing bounds are open.
    pub fn accepts_submissions_at(&self, now: DateTime<Utc>) -> Result<(), &'static str> {
        if self.starts_at.is_some_and(|start| now < start) {
            return Err("Live test has not started yet");
        }
        if self.ends_at.is_some_and(|end| now > end) {
            return Err("Live test has already ended");
        }
        Ok(())
    }
}

/// DTO for creating a live test.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateLiveTestRequest {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1, max = 500))]
    pub question_ids: Vec<String>,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
}

/// The paper handed to students: metadata plus questions without answers.
#[derive(Debug, Serialize, ToSchema)]
pub struct LiveTestPaper {
    pub id: String,
    pub title: String,
    pub starts_at: Option<DateTime<Utc>>,
    pub ends_at: Option<DateTime<Utc>>,
    pub questions: Vec<PublicQuestion>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn live_test(starts_at: Option<DateTime<Utc>>, ends_at: Option<DateTime<Utc>>) -> LiveTest {
        LiveTest {
            id: "T1".to_string(),
            title: "Mock 1".to_string(),
            question_ids: Json(vec!["q1".to_string()]),
            starts_at,
            ends_at,
            created_at: None,
        }
    }

    #[test]
    fn test_open_window_accepts() {
        assert!(live_test(None, None).accepts_submissions_at(Utc::now()).is_ok());
    }

    #[test]
    fn test_window_bounds() {
        let now = Utc::now();
        let upcoming = live_test(Some(now + Duration::hours(1)), None);
        assert!(upcoming.accepts_submissions_at(now).is_err());

        let finished = live_test(None, Some(now - Duration::hours(1)));
        assert!(finished.accepts_submissions_at(now).is_err());

        let running = live_test(Some(now - Duration::hours(1)), Some(now + Duration::hours(1)));
        assert!(running.accepts_submissions_at(now).is_ok());
    }
}
