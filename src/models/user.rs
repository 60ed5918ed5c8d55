// src/models/user.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use url::Url;
use validator::Validate;

/// Represents the 'users' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    pub id: i64,

    /// Unique username.
    pub username: String,

    /// Argon2 password hash.
    /// Skipped during serialization to prevent leaking sensitive data.
    #[serde(skip)]
    pub password: String,

    /// User role: 'user' or 'admin'.
    pub role: String,

    /// Name shown on leaderboards. Falls back to the username.
    pub display_name: Option<String>,

    pub profile_picture_url: Option<String>,

    /// Coaching batch the student belongs to (e.g., "IBA-2026-A").
    pub batch: Option<String>,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Public-facing slice of a user used by leaderboards and the coin ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: i64,
    pub display_name: String,
    pub profile_picture_url: Option<String>,
    pub batch: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        UserProfile {
            user_id: user.id,
            display_name: user
                .display_name
                .clone()
                .unwrap_or_else(|| user.username.clone()),
            profile_picture_url: user.profile_picture_url.clone(),
            batch: user.batch.clone(),
        }
    }
}

/// Fields needed to insert a user; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub role: String,
    pub display_name: Option<String>,
    pub profile_picture_url: Option<String>,
    pub batch: Option<String>,
}

/// DTO for creating a new user (Registration).
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(
        min = 3,
        max = 50,
        message = "Username length must be between 3 and 50 characters."
    ))]
    pub username: String,
    #[validate(length(
        min = 4,
        max = 128,
        message = "Password length must be between 4 and 128 characters."
    ))]
    pub password: String,
    #[validate(length(min = 1, max = 80))]
    pub display_name: Option<String>,
    #[validate(length(max = 500), custom(function = validate_url_string))]
    pub profile_picture_url: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub batch: Option<String>,
}

/// DTO for user login.
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 50))]
    pub username: String,
    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Validates that a string is a correctly formatted URL.
fn validate_url_string(url: &str) -> Result<(), validator::ValidationError> {
    if Url::parse(url).is_err() {
        return Err(validator::ValidationError::new("invalid_url"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_falls_back_to_username() {
        let user = User {
            id: 7,
            username: "rafi".to_string(),
            password: String::new(),
            role: "user".to_string(),
            display_name: None,
            profile_picture_url: None,
            batch: Some("B1".to_string()),
            created_at: None,
        };
        let profile = UserProfile::from(&user);
        assert_eq!(profile.display_name, "rafi");
        assert_eq!(profile.batch.as_deref(), Some("B1"));
    }

    #[test]
    fn test_profile_picture_must_be_url() {
        let mut req = CreateUserRequest {
            username: "student".to_string(),
            password: "password123".to_string(),
            display_name: None,
            profile_picture_url: Some("not a url".to_string()),
            batch: None,
        };
        assert!(req.validate().is_err());

        req.profile_picture_url = Some("https://cdn.example.com/p.png".to_string());
        assert!(req.validate().is_ok());
    }
}
