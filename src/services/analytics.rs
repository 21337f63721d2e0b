// src/services/analytics.rs

//! Per-quiz statistics and leaderboards derived from submitted attempts.
//!
//! Visibility flags are never consulted for numbers: what a teacher or a
//! student has hidden from their own listing still counts here.

use std::{collections::HashSet, sync::Arc};

use crate::{
    error::AttemptError,
    models::{
        analytics::{AttemptRow, LeaderboardEntry, OverviewEntry, QuizReport, QuizStats},
        attempt::Attempt,
        quiz::{Quiz, QuizSummary},
    },
    store::{AttemptStore, QuizCatalog},
};

/// Rounds to 2 decimal places.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Count, mean, max and min of the scores. All zero for an empty set.
pub fn summarize(attempts: &[Attempt]) -> QuizStats {
    let total_attempts = attempts.len();
    if total_attempts == 0 {
        return QuizStats {
            total_attempts: 0,
            average_score: 0.0,
            highest_score: 0,
            lowest_score: 0,
        };
    }

    let sum: i64 = attempts.iter().map(|a| i64::from(a.score)).sum();
    let highest_score = attempts.iter().map(|a| a.score).max().unwrap_or(0);
    let lowest_score = attempts.iter().map(|a| a.score).min().unwrap_or(0);

    QuizStats {
        total_attempts,
        average_score: round2(sum as f64 / total_attempts as f64),
        highest_score,
        lowest_score,
    }
}

/// One entry per student: their best attempt.
///
/// Attempts are ordered by score descending, then submission time ascending
/// (attempt id as a final tie-break), the first attempt seen for each student
/// is kept, and ranks are assigned after that dedup.
pub fn leaderboard(attempts: &[Attempt]) -> Vec<LeaderboardEntry> {
    let mut ordered: Vec<&Attempt> = attempts.iter().collect();
    ordered.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then(a.submitted_at.cmp(&b.submitted_at))
            .then(a.id.cmp(&b.id))
    });

    let mut seen = HashSet::new();
    ordered
        .into_iter()
        .filter(|a| seen.insert(a.student_id))
        .enumerate()
        .map(|(index, a)| LeaderboardEntry {
            rank: index + 1,
            student_id: a.student_id,
            attempt_id: a.id,
            score: a.score,
            submitted_at: a.submitted_at,
        })
        .collect()
}

#[derive(Clone)]
pub struct AnalyticsService {
    quizzes: Arc<dyn QuizCatalog>,
    attempts: Arc<dyn AttemptStore>,
}

impl AnalyticsService {
    pub fn new(quizzes: Arc<dyn QuizCatalog>, attempts: Arc<dyn AttemptStore>) -> Self {
        Self { quizzes, attempts }
    }

    /// Statistics, leaderboard and the staff result table for one quiz.
    ///
    /// Only the result table drops rows hidden for the teacher.
    pub async fn quiz_report(&self, quiz: &Quiz) -> Result<QuizReport, AttemptError> {
        let attempts = self.attempts.list_submitted(quiz.id).await?;

        let stats = summarize(&attempts);
        let leaderboard = leaderboard(&attempts);

        let mut rows: Vec<AttemptRow> = attempts
            .iter()
            .filter(|a| !a.hidden_for_teacher)
            .map(|a| AttemptRow {
                id: a.id,
                student_id: a.student_id,
                score: a.score,
                submitted_at: a.submitted_at,
            })
            .collect();
        rows.sort_by(|a, b| b.score.cmp(&a.score).then(a.submitted_at.cmp(&b.submitted_at)));

        Ok(QuizReport {
            quiz: QuizSummary::from(quiz),
            stats,
            attempts: rows,
            leaderboard,
        })
    }

    /// Attempt count and mean score per quiz owned by `owner` (all quizzes for `None`).
    pub async fn overview(&self, owner: Option<i64>) -> Result<Vec<OverviewEntry>, AttemptError> {
        let quizzes = self.quizzes.list_quizzes(owner).await?;

        let mut entries = Vec::with_capacity(quizzes.len());
        for quiz in quizzes {
            let attempts = self.attempts.list_submitted(quiz.id).await?;
            let stats = summarize(&attempts);
            entries.push(OverviewEntry {
                quiz_id: quiz.id,
                title: quiz.title,
                total_attempts: stats.total_attempts,
                average_score: stats.average_score,
            });
        }

        Ok(entries)
    }
}
