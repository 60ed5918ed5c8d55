// src/models/coin.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Represents the 'coin_balances' table: the current balance plus the
/// profile fields shown on the coin leaderboard.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct CoinLedgerEntry {
    pub user_id: i64,
    pub coins: i64,
    pub display_name: String,
    pub profile_picture_url: Option<String>,
    pub batch: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Append-only log row, written in the same transaction as the balance change.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, ToSchema)]
pub struct CoinTransaction {
    pub id: i64,
    pub user_id: i64,
    pub delta: i64,
    pub balance_after: i64,
    pub reason: String,
    pub reference: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A signed change to one user's balance.
///
/// Grants with the same `(user_id, reference)` are applied at most once.
#[derive(Debug, Clone)]
pub struct CoinGrant {
    pub user_id: i64,
    pub delta: i64,
    pub reason: String,
    pub reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoinUpdate {
    Applied(CoinLedgerEntry),
    AlreadyApplied,
}

/// DTO for an admin adjusting a balance by hand.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdminCoinGrantRequest {
    /// Signed change; zero is rejected by the handler.
    #[validate(range(min = -100_000, max = 100_000))]
    pub delta: i64,
    #[validate(length(min = 1, max = 200))]
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}
