// src/models/question.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use utoipa::ToSchema;
use validator::Validate;

/// Represents the 'questions' table in the database.
/// Read-only while a live test is being evaluated.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Question {
    pub id: String,

    /// Top-level section used for category subtotals (e.g., "Math", "English").
    pub category: String,

    pub sub_category: Option<String>,

    /// The text content of the question (sanitized HTML).
    pub content: String,

    /// List of options (e.g., ["A", "B", "C", "D"]).
    /// Stored as a JSON array in the database.
    #[schema(value_type = Vec<String>)]
    pub options: Json<Vec<String>>,

    /// The option a submission must equal to be counted correct.
    pub correct_answer: String,

    pub explanation: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// DTO for sending question to client (excludes answer and explanation).
#[derive(Debug, Serialize, ToSchema)]
pub struct PublicQuestion {
    pub id: String,
    pub category: String,
    pub sub_category: Option<String>,
    pub content: String,
    pub options: Vec<String>,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            category: q.category,
            sub_category: q.sub_category,
            content: q.content,
            options: q.options.0,
        }
    }
}

/// DTO for creating a new question.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 64))]
    pub id: String,
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    #[validate(length(min = 1, max = 50))]
    pub sub_category: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub content: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub correct_answer: String,
    #[validate(length(max = 5000))]
    pub explanation: Option<String>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.len() < 2 {
        return Err(validator::ValidationError::new("at_least_two_options"));
    }
    for opt in options {
        if opt.is_empty() || opt.len() > 500 {
            return Err(validator::ValidationError::new("invalid_option_length"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(options: Vec<&str>) -> CreateQuestionRequest {
        CreateQuestionRequest {
            id: "q1".to_string(),
            category: "Math".to_string(),
            sub_category: None,
            content: "2 + 2 = ?".to_string(),
            options: options.into_iter().map(String::from).collect(),
            correct_answer: "4".to_string(),
            explanation: None,
        }
    }

    #[test]
    fn test_options_must_have_two_entries() {
        assert!(request(vec!["4"]).validate().is_err());
        assert!(request(vec!["3", "4"]).validate().is_ok());
    }

    #[test]
    fn test_empty_option_rejected() {
        assert!(request(vec!["4", ""]).validate().is_err());
    }
}
