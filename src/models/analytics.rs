// src/models/analytics.rs

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::quiz::QuizSummary;

/// Aggregate statistics over the submitted attempts of one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QuizStats {
    pub total_attempts: usize,
    /// Arithmetic mean rounded to 2 decimal places.
    pub average_score: f64,
    pub highest_score: i32,
    pub lowest_score: i32,
}

/// One ranked row of the leaderboard: a student's best attempt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub student_id: i64,
    pub attempt_id: i64,
    pub score: i32,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Attempt row as listed on the teacher's result table.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRow {
    pub id: i64,
    pub student_id: i64,
    pub score: i32,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Full analytics payload for a single quiz.
#[derive(Debug, Serialize)]
pub struct QuizReport {
    pub quiz: QuizSummary,
    #[serde(flatten)]
    pub stats: QuizStats,
    pub attempts: Vec<AttemptRow>,
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// Per-quiz line of the analytics overview.
#[derive(Debug, Serialize)]
pub struct OverviewEntry {
    pub quiz_id: i64,
    pub title: String,
    pub total_attempts: usize,
    pub average_score: f64,
}
