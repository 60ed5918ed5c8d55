// src/handlers/coins.rs

use axum::{
    Extension, Json,
    extract::{Query, State},
};

use crate::{
    error::AppError,
    models::coin::{CoinLedgerEntry, CoinTransaction, LimitParams},
    store::DynStore,
    utils::jwt::Claims,
};

/// The caller's coin balance. Users who never earned coins get a zero balance.
pub async fn my_balance(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user_id = claims.user_id()?;
    let coins = store
        .coin_balance(user_id)
        .await?
        .map_or(0, |entry| entry.coins);

    Ok(Json(serde_json::json!({
        "user_id": user_id,
        "coins": coins,
    })))
}

/// The caller's coin history, newest first.
pub async fn my_transactions(
    State(store): State<DynStore>,
    Extension(claims): Extension<Claims>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<CoinTransaction>>, AppError> {
    let limit = params.limit.unwrap_or(50).clamp(1, 200);
    let transactions = store.coin_transactions(claims.user_id()?, limit).await?;
    Ok(Json(transactions))
}

/// Highest coin balances.
pub async fn leaderboard(
    State(store): State<DynStore>,
    Query(params): Query<LimitParams>,
) -> Result<Json<Vec<CoinLedgerEntry>>, AppError> {
    let limit = params.limit.unwrap_or(20).clamp(1, 100);
    Ok(Json(store.top_coin_balances(limit).await?))
}
