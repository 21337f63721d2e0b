// src/store/postgres.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json};

use super::{AttemptStore, NotificationEmitter, QuizCatalog};
use crate::{
    error::StoreError,
    models::{
        attempt::{Attempt, HideScope, Submission, SubmitOutcome},
        quiz::Quiz,
    },
};

const ATTEMPT_COLUMNS: &str = r#"
    id, student_id, quiz_id, questions_snapshot, answers, score,
    started_at, submitted_at, time_taken_seconds, is_submitted,
    hidden_for_student, hidden_for_teacher
"#;

#[derive(Clone)]
pub struct PgQuizCatalog {
    pool: PgPool,
}

impl PgQuizCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QuizCatalog for PgQuizCatalog {
    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, StoreError> {
        let quiz = sqlx::query_as::<_, Quiz>(
            r#"
            SELECT id, title, questions, time_limit_minutes, max_attempts,
                   published, owner_id, created_at
            FROM quizzes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(quiz)
    }

    async fn list_quizzes(&self, owner: Option<i64>) -> Result<Vec<Quiz>, StoreError> {
        let quizzes = sqlx::query_as::<_, Quiz>(
            r#"
            SELECT id, title, questions, time_limit_minutes, max_attempts,
                   published, owner_id, created_at
            FROM quizzes
            WHERE ($1::BIGINT IS NULL OR owner_id = $1)
            ORDER BY id
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?;

        Ok(quizzes)
    }
}

#[derive(Clone)]
pub struct PgAttemptStore {
    pool: PgPool,
}

impl PgAttemptStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptStore for PgAttemptStore {
    async fn create(
        &self,
        student_id: i64,
        quiz_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<Attempt, StoreError> {
        let sql = format!(
            "INSERT INTO attempts (student_id, quiz_id, started_at) VALUES ($1, $2, $3) RETURNING {}",
            ATTEMPT_COLUMNS
        );
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(student_id)
            .bind(quiz_id)
            .bind(started_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to insert attempt: {:?}", e);
                StoreError::from(e)
            })?;

        Ok(attempt)
    }

    async fn get(&self, id: i64) -> Result<Option<Attempt>, StoreError> {
        let sql = format!("SELECT {} FROM attempts WHERE id = $1", ATTEMPT_COLUMNS);
        let attempt = sqlx::query_as::<_, Attempt>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(attempt)
    }

    async fn count_submitted(&self, student_id: i64, quiz_id: i64) -> Result<i64, StoreError> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM attempts
            WHERE student_id = $1 AND quiz_id = $2 AND is_submitted = TRUE
            "#,
        )
        .bind(student_id)
        .bind(quiz_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count)
    }

    async fn conditional_submit(
        &self,
        id: i64,
        submission: Submission,
    ) -> Result<SubmitOutcome, StoreError> {
        // Single statement: the `is_submitted = FALSE` predicate is the compare,
        // the SET list is the swap.
        let sql = format!(
            r#"
            UPDATE attempts SET
                questions_snapshot = $2,
                answers = $3,
                score = $4,
                submitted_at = $5,
                time_taken_seconds = $6,
                is_submitted = TRUE
            WHERE id = $1 AND is_submitted = FALSE
            RETURNING {}
            "#,
            ATTEMPT_COLUMNS
        );

        let updated = sqlx::query_as::<_, Attempt>(&sql)
            .bind(id)
            .bind(Json(submission.questions_snapshot))
            .bind(Json(submission.answers))
            .bind(submission.score)
            .bind(submission.submitted_at)
            .bind(submission.time_taken_seconds)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to submit attempt {}: {:?}", id, e);
                StoreError::from(e)
            })?;

        Ok(match updated {
            Some(attempt) => SubmitOutcome::Submitted(attempt),
            None => SubmitOutcome::AlreadySubmitted,
        })
    }

    async fn list_submitted(&self, quiz_id: i64) -> Result<Vec<Attempt>, StoreError> {
        let sql = format!(
            "SELECT {} FROM attempts WHERE quiz_id = $1 AND is_submitted = TRUE ORDER BY id",
            ATTEMPT_COLUMNS
        );
        let attempts = sqlx::query_as::<_, Attempt>(&sql)
            .bind(quiz_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(attempts)
    }

    async fn list_history(&self, student_id: i64) -> Result<Vec<Attempt>, StoreError> {
        let sql = format!(
            r#"
            SELECT {} FROM attempts
            WHERE student_id = $1 AND is_submitted = TRUE AND hidden_for_student = FALSE
            ORDER BY submitted_at DESC, id DESC
            "#,
            ATTEMPT_COLUMNS
        );
        let attempts = sqlx::query_as::<_, Attempt>(&sql)
            .bind(student_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(attempts)
    }

    async fn set_hidden(&self, scope: HideScope) -> Result<u64, StoreError> {
        let result = match scope {
            HideScope::Student { student_id, ids } => {
                sqlx::query(
                    r#"
                    UPDATE attempts SET hidden_for_student = TRUE
                    WHERE student_id = $1
                      AND ($2::BIGINT[] IS NULL OR id = ANY($2))
                    "#,
                )
                .bind(student_id)
                .bind(ids)
                .execute(&self.pool)
                .await?
            }
            HideScope::Quiz { quiz_id, ids } => {
                sqlx::query(
                    r#"
                    UPDATE attempts SET hidden_for_teacher = TRUE
                    WHERE quiz_id = $1 AND is_submitted = TRUE
                      AND ($2::BIGINT[] IS NULL OR id = ANY($2))
                    "#,
                )
                .bind(quiz_id)
                .bind(ids)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected())
    }
}

/// Writes notifications into the inbox table read by the notification service.
#[derive(Clone)]
pub struct PgNotifier {
    pool: PgPool,
}

impl PgNotifier {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationEmitter for PgNotifier {
    async fn emit(&self, user_id: i64, message: String) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO notifications (user_id, message) VALUES ($1, $2)")
            .bind(user_id)
            .bind(message)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
