// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::types::Json as SqlJson;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::{
        coin::{AdminCoinGrantRequest, CoinGrant, CoinUpdate},
        live_test::{CreateLiveTestRequest, LiveTest},
        question::{CreateQuestionRequest, Question},
    },
    services::{
        coins::apply_grant,
        evaluation::{EvaluationSummary, evaluate_live_test},
    },
    store::DynStore,
    utils::html::clean_html,
};

/// Adds a question to the bank.
/// Admin only.
pub async fn create_question(
    State(store): State<DynStore>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if !payload.options.contains(&payload.correct_answer) {
        return Err(AppError::BadRequest(
            "Correct answer must be one of the options".to_string(),
        ));
    }

    let question = store
        .create_question(Question {
            id: payload.id,
            category: payload.category,
            sub_category: payload.sub_category,
            content: clean_html(&payload.content),
            options: SqlJson(payload.options),
            correct_answer: payload.correct_answer,
            explanation: payload.explanation.as_deref().map(clean_html),
            created_at: None,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({"id": question.id}))))
}

/// Creates a live test from existing questions.
/// Admin only.
pub async fn create_live_test(
    State(store): State<DynStore>,
    Json(payload): Json<CreateLiveTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    if let (Some(start), Some(end)) = (payload.starts_at, payload.ends_at) {
        if end <= start {
            return Err(AppError::BadRequest("ends_at must be after starts_at".to_string()));
        }
    }

    let mut question_ids = payload.question_ids;
    let mut seen = std::collections::HashSet::new();
    question_ids.retain(|id| seen.insert(id.clone()));

    let found = store.questions_by_ids(&question_ids).await?;
    if let Some(missing) = question_ids
        .iter()
        .find(|id| !found.iter().any(|q| &q.id == *id))
    {
        return Err(AppError::NotFound(format!("Question '{}' not found", missing)));
    }

    let test = store
        .create_live_test(LiveTest {
            id: payload.id,
            title: payload.title,
            question_ids: SqlJson(question_ids),
            starts_at: payload.starts_at,
            ends_at: payload.ends_at,
            created_at: None,
        })
        .await?;

    tracing::info!(test_id = %test.id, questions = test.question_ids.len(), "Live test created");
    Ok((StatusCode::CREATED, Json(test)))
}

/// Scores every submission, rebuilds the leaderboard cache and pays rewards.
/// Admin only.
#[utoipa::path(
    post,
    path = "/api/admin/live-tests/{id}/evaluate",
    params(("id" = String, Path, description = "Live test id")),
    responses(
        (status = 200, description = "Evaluation finished", body = EvaluationSummary),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Live test, question or submissions not found"),
        (status = 500, description = "Internal error")
    ),
    security(("bearer" = [])),
    tag = "admin"
)]
pub async fn evaluate(
    State(store): State<DynStore>,
    State(config): State<Config>,
    Path(test_id): Path<String>,
) -> Result<Json<EvaluationSummary>, AppError> {
    let summary = evaluate_live_test(store, &config, &test_id).await?;
    Ok(Json(summary))
}

/// Manually adjusts a user's coin balance.
/// Admin only.
pub async fn grant_coins(
    State(store): State<DynStore>,
    Path(user_id): Path<i64>,
    Json(payload): Json<AdminCoinGrantRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    if payload.delta == 0 {
        return Err(AppError::BadRequest("delta cannot be zero".to_string()));
    }

    let grant = CoinGrant {
        user_id,
        delta: payload.delta,
        reason: payload.reason,
        reference: None,
    };

    match apply_grant(store.as_ref(), grant).await? {
        CoinUpdate::Applied(entry) => Ok(Json(entry)),
        CoinUpdate::AlreadyApplied => Err(AppError::Conflict("Grant already applied".to_string())),
    }
}
