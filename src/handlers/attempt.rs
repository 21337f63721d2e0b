// src/handlers/attempt.rs

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use validator::Validate;

use crate::{
    error::{AppError, AttemptError},
    models::attempt::{
        HideAttemptsRequest, HideResponse, SubmitAttemptRequest, SubmitAttemptResponse,
    },
    services::AttemptService,
    utils::jwt::Claims,
};

/// Returns how many attempts the student has submitted for a quiz, and the cap.
pub async fn attempt_count(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let eligibility = service.eligibility(student_id, quiz_id).await?;

    Ok(Json(eligibility))
}

/// Starts a new attempt on a published quiz.
pub async fn start_attempt(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(quiz_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let attempt = service.start(student_id, quiz_id).await?;

    Ok((StatusCode::CREATED, Json(json!({ "attempt": attempt }))))
}

pub async fn submit_attempt(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
    body: Result<Json<SubmitAttemptRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(req) = body?;
    let student_id = claims.user_id()?;

    // Foreign attempts look exactly like unknown ones.
    let owned = service
        .get(attempt_id)
        .await?
        .is_some_and(|a| a.student_id == student_id);
    if !owned {
        return Err(AttemptError::InvalidAttempt.into());
    }

    let result = service.submit(attempt_id, req.answers).await?;

    Ok(Json(SubmitAttemptResponse {
        message: "Attempt submitted".to_string(),
        score: result.score,
        total: result.total,
    }))
}

/// Lists the caller's submitted attempts that they have not hidden.
pub async fn my_attempts(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let history = service.history(student_id).await?;

    Ok(Json(history))
}

/// Returns a submitted attempt for review, with the questions as they were
/// when it was submitted.
pub async fn get_attempt(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;

    let review = service
        .review(attempt_id)
        .await?
        .ok_or(AppError::NotFound("Attempt not found".to_string()))?;

    if review.student_id != student_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    Ok(Json(review))
}

/// Hides selected attempts from the caller's history. Scores are untouched.
pub async fn hide_attempts(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<HideAttemptsRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(payload) = body?;
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let student_id = claims.user_id()?;
    let updated = service
        .hide_for_student(student_id, Some(payload.ids))
        .await?;

    Ok(Json(HideResponse {
        success: true,
        updated,
    }))
}

/// Hides the caller's whole history.
pub async fn clear_history(
    State(service): State<AttemptService>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, AppError> {
    let student_id = claims.user_id()?;
    let updated = service.hide_for_student(student_id, None).await?;

    Ok(Json(HideResponse {
        success: true,
        updated,
    }))
}
