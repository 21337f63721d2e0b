// src/models/attempt.rs

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use super::question::Question;

/// Sparse answer sheet.
/// Key: question position within the quiz.
/// Value: selected option index.
pub type AnswerMap = BTreeMap<u32, i64>;

/// Represents the 'attempts' table in the database.
/// One student's single pass through a quiz.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Attempt {
    pub id: i64,
    pub student_id: i64,
    pub quiz_id: i64,

    /// Questions copied from the quiz at submission time. Empty until then,
    /// frozen afterwards.
    pub questions_snapshot: Json<Vec<Question>>,

    pub answers: Json<AnswerMap>,

    pub score: i32,

    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,

    /// Seconds between start and submission.
    pub time_taken_seconds: Option<i64>,

    pub is_submitted: bool,

    pub hidden_for_student: bool,
    pub hidden_for_teacher: bool,
}

impl Attempt {
    /// A fresh, unsubmitted attempt.
    pub fn in_progress(id: i64, student_id: i64, quiz_id: i64, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            student_id,
            quiz_id,
            questions_snapshot: Json(Vec::new()),
            answers: Json(AnswerMap::new()),
            score: 0,
            started_at,
            submitted_at: None,
            time_taken_seconds: None,
            is_submitted: false,
            hidden_for_student: false,
            hidden_for_teacher: false,
        }
    }

    pub fn total_questions(&self) -> usize {
        self.questions_snapshot.len()
    }
}

/// Everything written by the one-shot submit transition.
#[derive(Debug, Clone)]
pub struct Submission {
    pub questions_snapshot: Vec<Question>,
    pub answers: AnswerMap,
    pub score: i32,
    pub submitted_at: DateTime<Utc>,
    pub time_taken_seconds: i64,
}

/// Result of the conditional (compare-and-set) submit on the store.
#[derive(Debug)]
pub enum SubmitOutcome {
    Submitted(Attempt),
    AlreadySubmitted,
}

/// Which records a hide operation touches, and for whom.
#[derive(Debug, Clone)]
pub enum HideScope {
    /// Sets `hidden_for_student` on the student's own attempts.
    Student { student_id: i64, ids: Option<Vec<i64>> },
    /// Sets `hidden_for_teacher` on submitted attempts of a quiz.
    Quiz { quiz_id: i64, ids: Option<Vec<i64>> },
}

/// DTO for submitting an attempt.
#[derive(Debug, Deserialize)]
pub struct SubmitAttemptRequest {
    #[serde(default, deserialize_with = "lenient_answers")]
    pub answers: AnswerMap,
}

/// Keeps only entries keyed by a question position with an integer option
/// index. Anything else is dropped and scores as unanswered.
fn lenient_answers<'de, D>(deserializer: D) -> Result<AnswerMap, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, serde_json::Value>> = Option::deserialize(deserializer)?;

    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(key, value)| Some((key.parse::<u32>().ok()?, value.as_i64()?)))
        .collect())
}

/// Response for a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitAttemptResponse {
    pub message: String,
    pub score: i32,
    pub total: usize,
}

/// Response for the attempt counter shown before starting a quiz.
#[derive(Debug, Serialize)]
pub struct Eligibility {
    pub count: i64,
    pub max_attempts: i32,
}

/// One row of a student's attempt history.
#[derive(Debug, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub quiz_id: i64,
    /// Absent when the quiz has since been deleted.
    pub quiz_title: Option<String>,
    pub score: i32,
    pub total: usize,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Full review of a submitted attempt, built from its snapshot only.
#[derive(Debug, Serialize)]
pub struct AttemptReview {
    pub id: i64,
    pub student_id: i64,
    pub quiz_id: i64,
    pub quiz_title: Option<String>,
    pub questions: Vec<Question>,
    pub answers: AnswerMap,
    pub score: i32,
    pub total: usize,
    pub started_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub time_taken_seconds: Option<i64>,
}

/// DTO for a student hiding selected attempts from their history.
#[derive(Debug, Deserialize, Validate)]
pub struct HideAttemptsRequest {
    #[validate(length(min = 1, max = 500, message = "Select between 1 and 500 attempts."))]
    pub ids: Vec<i64>,
}

/// DTO for a teacher hiding attempts of a quiz. An empty list hides all.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct HideQuizAttemptsRequest {
    #[serde(default)]
    #[validate(length(max = 500, message = "At most 500 attempts per request."))]
    pub attempt_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct HideResponse {
    pub success: bool,
    pub updated: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_drops_unusable_answers() {
        let req: SubmitAttemptRequest = serde_json::from_value(serde_json::json!({
            "answers": {
                "0": 1,
                "1": 0,
                "-1": 2,
                "4294967296": 0,
                "x": 1,
                "2": null,
                "3": "1",
                "4": 1.5
            }
        }))
        .unwrap();

        assert_eq!(req.answers, AnswerMap::from([(0, 1), (1, 0)]));
    }

    #[test]
    fn submit_request_accepts_missing_or_null_answers() {
        let req: SubmitAttemptRequest = serde_json::from_str("{}").unwrap();
        assert!(req.answers.is_empty());

        let req: SubmitAttemptRequest = serde_json::from_str(r#"{"answers":null}"#).unwrap();
        assert!(req.answers.is_empty());
    }
}
