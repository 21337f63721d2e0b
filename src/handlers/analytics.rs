// src/handlers/analytics.rs

use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    response::IntoResponse,
};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        attempt::{HideQuizAttemptsRequest, HideResponse},
        quiz::Quiz,
        user::Role,
    },
    services::{AnalyticsService, AttemptService},
    store::QuizCatalog,
    utils::jwt::Claims,
};

/// Loads a quiz the caller may manage: admins any, teachers only their own.
async fn load_managed_quiz(
    quizzes: &dyn QuizCatalog,
    claims: &Claims,
    quiz_id: i64,
) -> Result<Quiz, AppError> {
    let quiz = quizzes
        .get_quiz(quiz_id)
        .await?
        .ok_or(AppError::NotFound("Quiz not found".to_string()))?;

    if claims.role()? != Role::Admin && quiz.owner_id != claims.user_id()? {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    Ok(quiz)
}

/// Attempt count and mean score per quiz.
/// Admins see every quiz, teachers their own.
pub async fn overview(
    State(service): State<AnalyticsService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let owner = match claims.role()? {
        Role::Admin => None,
        _ => Some(claims.user_id()?),
    };

    let entries = service.overview(owner).await?;

    Ok(Json(entries))
}

/// Statistics, leaderboard and result table for a single quiz.
pub async fn quiz_analytics(
    State(quizzes): State<Arc<dyn QuizCatalog>>,
    State(service): State<AnalyticsService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let quiz = load_managed_quiz(quizzes.as_ref(), &claims, quiz_id).await?;
    let report = service.quiz_report(&quiz).await?;

    Ok(Json(report))
}

/// Hides attempts of a quiz from the staff result table.
/// No body, or an empty `attempt_ids` list, hides every submitted attempt
/// of the quiz.
/// Analytics numbers are unaffected.
pub async fn hide_quiz_attempts(
    State(quizzes): State<Arc<dyn QuizCatalog>>,
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
    body: Result<Option<Json<HideQuizAttemptsRequest>>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let payload = body?.map(|Json(p)| p).unwrap_or_default();
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let quiz = load_managed_quiz(quizzes.as_ref(), &claims, quiz_id).await?;

    let ids = if payload.attempt_ids.is_empty() {
        None
    } else {
        Some(payload.attempt_ids)
    };
    let updated = service.hide_for_teacher(quiz.id, ids).await?;

    Ok(Json(HideResponse {
        success: true,
        updated,
    }))
}
