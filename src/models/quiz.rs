// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};

use super::question::Question;

/// Represents the 'quizzes' table in the database.
///
/// Owned and edited by the quiz catalog; the attempt engine only reads it.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,

    pub title: String,

    /// Ordered question list. Stored as a JSON array in the database.
    pub questions: Json<Vec<Question>>,

    /// Wall-clock budget for one attempt, in minutes (>= 1).
    pub time_limit_minutes: i32,

    /// Cap on submitted attempts per student (>= 1).
    pub max_attempts: i32,

    pub published: bool,

    /// The teacher or admin who authored the quiz.
    pub owner_id: i64,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Compact quiz header embedded in analytics responses.
#[derive(Debug, Clone, Serialize)]
pub struct QuizSummary {
    pub id: i64,
    pub title: String,
    pub time_limit_minutes: i32,
    pub max_attempts: i32,
}

impl From<&Quiz> for QuizSummary {
    fn from(quiz: &Quiz) -> Self {
        Self {
            id: quiz.id,
            title: quiz.title.clone(),
            time_limit_minutes: quiz.time_limit_minutes,
            max_attempts: quiz.max_attempts,
        }
    }
}
