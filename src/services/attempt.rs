// src/services/attempt.rs

//! Attempt lifecycle: NotStarted -> InProgress -> Submitted.
//!
//! The engine holds no state of its own between calls; every transition reads
//! and writes through the collaborator ports. Ownership and role checks belong
//! to the HTTP boundary, the engine only ever receives an already authorized
//! student id.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    error::AttemptError,
    models::attempt::{
        AnswerMap, Attempt, AttemptReview, Eligibility, HideScope, HistoryEntry, Submission,
        SubmitOutcome,
    },
    services::scoring,
    store::{AttemptStore, NotificationEmitter, QuizCatalog},
};

/// Outcome of a successful submission.
#[derive(Debug)]
pub struct SubmitResult {
    pub attempt: Attempt,
    pub score: i32,
    pub total: usize,
}

#[derive(Clone)]
pub struct AttemptService {
    quizzes: Arc<dyn QuizCatalog>,
    attempts: Arc<dyn AttemptStore>,
    notifier: Arc<dyn NotificationEmitter>,
}

impl AttemptService {
    pub fn new(
        quizzes: Arc<dyn QuizCatalog>,
        attempts: Arc<dyn AttemptStore>,
        notifier: Arc<dyn NotificationEmitter>,
    ) -> Self {
        Self {
            quizzes,
            attempts,
            notifier,
        }
    }

    /// Number of submitted attempts for the pair. In-progress attempts are not counted.
    pub async fn count(&self, student_id: i64, quiz_id: i64) -> Result<i64, AttemptError> {
        Ok(self.attempts.count_submitted(student_id, quiz_id).await?)
    }

    /// Attempt counter shown before starting. Only requires the quiz to exist.
    pub async fn eligibility(
        &self,
        student_id: i64,
        quiz_id: i64,
    ) -> Result<Eligibility, AttemptError> {
        let quiz = self
            .quizzes
            .get_quiz(quiz_id)
            .await?
            .ok_or(AttemptError::NotAvailable)?;

        let count = self.count(student_id, quiz_id).await?;

        Ok(Eligibility {
            count,
            max_attempts: quiz.max_attempts,
        })
    }

    pub async fn start(&self, student_id: i64, quiz_id: i64) -> Result<Attempt, AttemptError> {
        self.start_at(student_id, quiz_id, Utc::now()).await
    }

    /// Opens a new in-progress attempt.
    ///
    /// The cap is checked against submitted attempts only, as a plain
    /// read-then-write. Concurrent starts may overshoot it slightly.
    pub async fn start_at(
        &self,
        student_id: i64,
        quiz_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Attempt, AttemptError> {
        let quiz = self
            .quizzes
            .get_quiz(quiz_id)
            .await?
            .filter(|q| q.published)
            .ok_or(AttemptError::NotAvailable)?;

        let submitted = self.count(student_id, quiz.id).await?;
        if submitted >= i64::from(quiz.max_attempts) {
            tracing::info!(
                "Student {} has used {}/{} attempts on quiz {}",
                student_id,
                submitted,
                quiz.max_attempts,
                quiz.id
            );
            return Err(AttemptError::AttemptsExhausted);
        }

        let attempt = self.attempts.create(student_id, quiz.id, now).await?;
        tracing::info!(
            "Attempt {} started by student {} on quiz {}",
            attempt.id,
            student_id,
            quiz.id
        );

        Ok(attempt)
    }

    pub async fn submit(
        &self,
        attempt_id: i64,
        answers: AnswerMap,
    ) -> Result<SubmitResult, AttemptError> {
        self.submit_at(attempt_id, answers, Utc::now()).await
    }

    /// Scores and freezes an attempt.
    ///
    /// The deadline is `started_at` plus the quiz's time limit as it is at
    /// submission time. The question list is deep-copied into the attempt and
    /// the whole record is written in one conditional update, so exactly one
    /// of several racing submits wins.
    pub async fn submit_at(
        &self,
        attempt_id: i64,
        answers: AnswerMap,
        now: DateTime<Utc>,
    ) -> Result<SubmitResult, AttemptError> {
        let attempt = self
            .attempts
            .get(attempt_id)
            .await?
            .filter(|a| !a.is_submitted)
            .ok_or(AttemptError::InvalidAttempt)?;

        let quiz = self
            .quizzes
            .get_quiz(attempt.quiz_id)
            .await?
            .ok_or(AttemptError::NotAvailable)?;

        let elapsed = now - attempt.started_at;
        if elapsed > TimeDelta::minutes(i64::from(quiz.time_limit_minutes)) {
            tracing::info!(
                "Attempt {} rejected: {}s elapsed, limit {} min",
                attempt_id,
                elapsed.num_seconds(),
                quiz.time_limit_minutes
            );
            return Err(AttemptError::TimeLimitExceeded);
        }

        let snapshot = quiz.questions.0.clone();
        let score = scoring::score(&snapshot, &answers);
        let total = snapshot.len();

        let submission = Submission {
            questions_snapshot: snapshot,
            answers,
            score,
            submitted_at: now,
            time_taken_seconds: elapsed.num_seconds(),
        };

        let attempt = match self.attempts.conditional_submit(attempt_id, submission).await? {
            SubmitOutcome::Submitted(attempt) => attempt,
            SubmitOutcome::AlreadySubmitted => {
                tracing::warn!("Attempt {} was submitted concurrently", attempt_id);
                return Err(AttemptError::InvalidAttempt);
            }
        };

        tracing::info!(
            "Attempt {} submitted by student {}: {}/{}",
            attempt.id,
            attempt.student_id,
            score,
            total
        );

        let message = format!(
            "Student {} submitted \"{}\": Score {}/{}",
            attempt.student_id, quiz.title, score, total
        );
        if let Err(e) = self.notifier.emit(quiz.owner_id, message).await {
            tracing::warn!(
                "Failed to notify owner {} of attempt {}: {}",
                quiz.owner_id,
                attempt.id,
                e
            );
        }

        Ok(SubmitResult {
            attempt,
            score,
            total,
        })
    }

    pub async fn get(&self, attempt_id: i64) -> Result<Option<Attempt>, AttemptError> {
        Ok(self.attempts.get(attempt_id).await?)
    }

    /// The student's visible history, newest first.
    pub async fn history(&self, student_id: i64) -> Result<Vec<HistoryEntry>, AttemptError> {
        let attempts = self.attempts.list_history(student_id).await?;

        let mut titles: HashMap<i64, Option<String>> = HashMap::new();
        let mut entries = Vec::with_capacity(attempts.len());
        for attempt in attempts {
            if !titles.contains_key(&attempt.quiz_id) {
                let title = self
                    .quizzes
                    .get_quiz(attempt.quiz_id)
                    .await?
                    .map(|q| q.title);
                titles.insert(attempt.quiz_id, title);
            }

            entries.push(HistoryEntry {
                id: attempt.id,
                quiz_id: attempt.quiz_id,
                quiz_title: titles.get(&attempt.quiz_id).cloned().flatten(),
                score: attempt.score,
                total: attempt.total_questions(),
                submitted_at: attempt.submitted_at,
            });
        }

        Ok(entries)
    }

    /// Review of a submitted attempt the student has not hidden.
    /// Questions come from the snapshot, never from the live quiz.
    pub async fn review(&self, attempt_id: i64) -> Result<Option<AttemptReview>, AttemptError> {
        let Some(attempt) = self
            .attempts
            .get(attempt_id)
            .await?
            .filter(|a| a.is_submitted && !a.hidden_for_student)
        else {
            return Ok(None);
        };

        let quiz_title = self
            .quizzes
            .get_quiz(attempt.quiz_id)
            .await?
            .map(|q| q.title);

        let total = attempt.total_questions();
        Ok(Some(AttemptReview {
            id: attempt.id,
            student_id: attempt.student_id,
            quiz_id: attempt.quiz_id,
            quiz_title,
            questions: attempt.questions_snapshot.0,
            answers: attempt.answers.0,
            score: attempt.score,
            total,
            started_at: attempt.started_at,
            submitted_at: attempt.submitted_at,
            time_taken_seconds: attempt.time_taken_seconds,
        }))
    }

    /// Hides the student's own attempts from their history. `None` hides all.
    pub async fn hide_for_student(
        &self,
        student_id: i64,
        ids: Option<Vec<i64>>,
    ) -> Result<u64, AttemptError> {
        let updated = self
            .attempts
            .set_hidden(HideScope::Student { student_id, ids })
            .await?;
        tracing::debug!("Student {} hid {} attempts", student_id, updated);
        Ok(updated)
    }

    /// Hides submitted attempts of a quiz from the teacher listing. `None` hides all.
    pub async fn hide_for_teacher(
        &self,
        quiz_id: i64,
        ids: Option<Vec<i64>>,
    ) -> Result<u64, AttemptError> {
        let updated = self
            .attempts
            .set_hidden(HideScope::Quiz { quiz_id, ids })
            .await?;
        tracing::debug!("Hid {} attempts of quiz {} for staff", updated, quiz_id);
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StoreError,
        models::{question::Question, quiz::Quiz},
        store::{MemoryAttemptStore, MemoryNotifier, MemoryQuizCatalog},
    };
    use async_trait::async_trait;
    use sqlx::types::Json;

    const STUDENT: i64 = 7;
    const OWNER: i64 = 100;

    fn quiz(id: i64, time_limit_minutes: i32, max_attempts: i32) -> Quiz {
        Quiz {
            id,
            title: format!("Quiz {}", id),
            questions: Json(vec![
                Question::new("2 + 2", &["3", "4"], 1),
                Question::new("Capital of France", &["Paris", "Rome", "Oslo"], 0),
                Question::new("Largest planet", &["Mars", "Venus", "Jupiter"], 2),
            ]),
            time_limit_minutes,
            max_attempts,
            published: true,
            owner_id: OWNER,
            created_at: None,
        }
    }

    struct Harness {
        catalog: MemoryQuizCatalog,
        store: MemoryAttemptStore,
        notifier: MemoryNotifier,
        service: AttemptService,
    }

    async fn harness(quizzes: Vec<Quiz>) -> Harness {
        let catalog = MemoryQuizCatalog::new();
        for q in quizzes {
            catalog.upsert(q).await;
        }
        let store = MemoryAttemptStore::new();
        let notifier = MemoryNotifier::new();
        let service = AttemptService::new(
            Arc::new(catalog.clone()),
            Arc::new(store.clone()),
            Arc::new(notifier.clone()),
        );
        Harness {
            catalog,
            store,
            notifier,
            service,
        }
    }

    fn two_of_three() -> AnswerMap {
        AnswerMap::from([(0, 1), (1, 0), (2, 0)])
    }

    #[tokio::test]
    async fn start_rejects_missing_or_unpublished_quiz() {
        let mut draft = quiz(2, 10, 1);
        draft.published = false;
        let h = harness(vec![draft]).await;

        assert!(matches!(
            h.service.start(STUDENT, 1).await,
            Err(AttemptError::NotAvailable)
        ));
        assert!(matches!(
            h.service.start(STUDENT, 2).await,
            Err(AttemptError::NotAvailable)
        ));
    }

    #[tokio::test]
    async fn submit_within_limit_scores_and_freezes() {
        let h = harness(vec![quiz(1, 1, 3)]).await;
        let t0 = Utc::now();

        let attempt = h.service.start_at(STUDENT, 1, t0).await.unwrap();
        assert!(!attempt.is_submitted);
        assert_eq!(attempt.started_at, t0);

        let result = h
            .service
            .submit_at(attempt.id, two_of_three(), t0 + TimeDelta::seconds(30))
            .await
            .unwrap();

        assert_eq!(result.score, 2);
        assert_eq!(result.total, 3);
        assert!(result.attempt.is_submitted);
        assert_eq!(result.attempt.time_taken_seconds, Some(30));
        assert_eq!(result.attempt.questions_snapshot.len(), 3);
        assert_eq!(h.service.count(STUDENT, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn submit_after_deadline_is_rejected_and_not_recorded() {
        let h = harness(vec![quiz(1, 1, 3)]).await;
        let t0 = Utc::now();
        let attempt = h.service.start_at(STUDENT, 1, t0).await.unwrap();

        let result = h
            .service
            .submit_at(attempt.id, two_of_three(), t0 + TimeDelta::seconds(90))
            .await;

        assert!(matches!(result, Err(AttemptError::TimeLimitExceeded)));
        let stored = h.store.get(attempt.id).await.unwrap().unwrap();
        assert!(!stored.is_submitted);
        assert_eq!(stored.score, 0);
        assert_eq!(h.service.count(STUDENT, 1).await.unwrap(), 0);
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn deadline_follows_the_current_time_limit() {
        let h = harness(vec![quiz(1, 1, 3)]).await;
        let t0 = Utc::now();
        let attempt = h.service.start_at(STUDENT, 1, t0).await.unwrap();

        // The owner extends the limit while the attempt is in progress.
        h.catalog.upsert(quiz(1, 5, 3)).await;

        let result = h
            .service
            .submit_at(attempt.id, two_of_three(), t0 + TimeDelta::minutes(3))
            .await
            .unwrap();
        assert_eq!(result.score, 2);
    }

    #[tokio::test]
    async fn deadline_is_inclusive_of_the_full_limit() {
        let h = harness(vec![quiz(1, 1, 3)]).await;
        let t0 = Utc::now();

        let on_time = h.service.start_at(STUDENT, 1, t0).await.unwrap();
        let result = h
            .service
            .submit_at(on_time.id, two_of_three(), t0 + TimeDelta::minutes(1))
            .await
            .unwrap();
        assert_eq!(result.attempt.time_taken_seconds, Some(60));

        let late = h.service.start_at(STUDENT, 1, t0).await.unwrap();
        let rejected = h
            .service
            .submit_at(
                late.id,
                two_of_three(),
                t0 + TimeDelta::minutes(1) + TimeDelta::seconds(1),
            )
            .await;
        assert!(matches!(rejected, Err(AttemptError::TimeLimitExceeded)));
        assert_eq!(h.service.count(STUDENT, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn submit_after_quiz_deleted_is_not_available() {
        let h = harness(vec![quiz(1, 10, 3)]).await;
        let t0 = Utc::now();
        let attempt = h.service.start_at(STUDENT, 1, t0).await.unwrap();

        h.catalog.remove(1).await;

        let result = h
            .service
            .submit_at(attempt.id, two_of_three(), t0 + TimeDelta::seconds(30))
            .await;
        assert!(matches!(result, Err(AttemptError::NotAvailable)));

        let stored = h.store.get(attempt.id).await.unwrap().unwrap();
        assert!(!stored.is_submitted);
        assert!(h.notifier.sent().await.is_empty());
    }

    #[tokio::test]
    async fn second_submit_is_invalid_and_changes_nothing() {
        let h = harness(vec![quiz(1, 10, 3)]).await;
        let t0 = Utc::now();
        let attempt = h.service.start_at(STUDENT, 1, t0).await.unwrap();

        h.service
            .submit_at(attempt.id, two_of_three(), t0 + TimeDelta::seconds(10))
            .await
            .unwrap();

        let perfect = AnswerMap::from([(0, 1), (1, 0), (2, 2)]);
        let again = h
            .service
            .submit_at(attempt.id, perfect, t0 + TimeDelta::seconds(20))
            .await;
        assert!(matches!(again, Err(AttemptError::InvalidAttempt)));

        let stored = h.store.get(attempt.id).await.unwrap().unwrap();
        assert_eq!(stored.score, 2);
        assert_eq!(stored.submitted_at, Some(t0 + TimeDelta::seconds(10)));
        assert_eq!(*stored.answers, two_of_three());
    }

    #[tokio::test]
    async fn submit_unknown_attempt_is_invalid() {
        let h = harness(vec![quiz(1, 10, 3)]).await;
        assert!(matches!(
            h.service.submit(999, AnswerMap::new()).await,
            Err(AttemptError::InvalidAttempt)
        ));
    }

    #[tokio::test]
    async fn concurrent_submits_have_exactly_one_winner() {
        let h = harness(vec![quiz(1, 10, 3)]).await;
        let attempt = h.service.start(STUDENT, 1).await.unwrap();

        let (a, b) = tokio::join!(
            h.service.submit(attempt.id, two_of_three()),
            h.service.submit(attempt.id, AnswerMap::new()),
        );

        let wins = [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count();
        assert_eq!(wins, 1);
        assert!(matches!(
            a.err().or(b.err()),
            Some(AttemptError::InvalidAttempt)
        ));
        assert_eq!(h.service.count(STUDENT, 1).await.unwrap(), 1);
        assert_eq!(h.notifier.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn cap_counts_only_submitted_attempts() {
        let h = harness(vec![quiz(1, 10, 2)]).await;

        // Abandoned attempts do not consume a slot.
        h.service.start(STUDENT, 1).await.unwrap();
        h.service.start(STUDENT, 1).await.unwrap();
        h.service.start(STUDENT, 1).await.unwrap();

        for _ in 0..2 {
            let attempt = h.service.start(STUDENT, 1).await.unwrap();
            h.service.submit(attempt.id, two_of_three()).await.unwrap();
        }

        assert!(matches!(
            h.service.start(STUDENT, 1).await,
            Err(AttemptError::AttemptsExhausted)
        ));
        // Another student is unaffected.
        assert!(h.service.start(STUDENT + 1, 1).await.is_ok());
    }

    #[tokio::test]
    async fn single_attempt_quiz_blocks_second_start() {
        let h = harness(vec![quiz(1, 10, 1)]).await;
        let attempt = h.service.start(STUDENT, 1).await.unwrap();
        h.service.submit(attempt.id, AnswerMap::new()).await.unwrap();

        assert!(matches!(
            h.service.start(STUDENT, 1).await,
            Err(AttemptError::AttemptsExhausted)
        ));

        let eligibility = h.service.eligibility(STUDENT, 1).await.unwrap();
        assert_eq!(eligibility.count, 1);
        assert_eq!(eligibility.max_attempts, 1);
    }

    #[tokio::test]
    async fn review_uses_snapshot_after_quiz_edit() {
        let h = harness(vec![quiz(1, 10, 3)]).await;
        let attempt = h.service.start(STUDENT, 1).await.unwrap();
        h.service.submit(attempt.id, two_of_three()).await.unwrap();

        let mut edited = quiz(1, 10, 3);
        edited.questions = Json(vec![Question::new("Rewritten", &["X", "Y"], 0)]);
        h.catalog.upsert(edited).await;

        let review = h.service.review(attempt.id).await.unwrap().unwrap();
        assert_eq!(review.questions, quiz(1, 10, 3).questions.0);
        assert_eq!(review.total, 3);
        assert_eq!(review.score, 2);

        // Deleting the quiz only drops the title.
        h.catalog.remove(1).await;
        let review = h.service.review(attempt.id).await.unwrap().unwrap();
        assert_eq!(review.quiz_title, None);
        assert_eq!(review.questions.len(), 3);
    }

    #[tokio::test]
    async fn review_requires_submitted_and_visible_attempt() {
        let h = harness(vec![quiz(1, 10, 3)]).await;
        let attempt = h.service.start(STUDENT, 1).await.unwrap();
        assert!(h.service.review(attempt.id).await.unwrap().is_none());

        h.service.submit(attempt.id, two_of_three()).await.unwrap();
        assert!(h.service.review(attempt.id).await.unwrap().is_some());

        h.service
            .hide_for_student(STUDENT, Some(vec![attempt.id]))
            .await
            .unwrap();
        assert!(h.service.review(attempt.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn history_is_newest_first_and_respects_student_flag_only() {
        let h = harness(vec![quiz(1, 10, 5), quiz(2, 10, 5)]).await;
        let t0 = Utc::now();

        let first = h.service.start_at(STUDENT, 1, t0).await.unwrap();
        h.service
            .submit_at(first.id, two_of_three(), t0 + TimeDelta::seconds(5))
            .await
            .unwrap();
        let second = h.service.start_at(STUDENT, 2, t0).await.unwrap();
        h.service
            .submit_at(second.id, AnswerMap::new(), t0 + TimeDelta::seconds(10))
            .await
            .unwrap();
        // In-progress attempts never show up.
        h.service.start(STUDENT, 1).await.unwrap();

        let history = h.service.history(STUDENT).await.unwrap();
        let ids: Vec<i64> = history.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
        assert_eq!(history[1].quiz_title.as_deref(), Some("Quiz 1"));
        assert_eq!(history[1].total, 3);

        h.service.hide_for_teacher(1, None).await.unwrap();
        assert_eq!(h.service.history(STUDENT).await.unwrap().len(), 2);

        h.service.hide_for_student(STUDENT, None).await.unwrap();
        assert!(h.service.history(STUDENT).await.unwrap().is_empty());

        // Hiding never affects the submitted count.
        assert_eq!(h.service.count(STUDENT, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn submission_notifies_quiz_owner() {
        let h = harness(vec![quiz(1, 10, 3)]).await;
        let attempt = h.service.start(STUDENT, 1).await.unwrap();
        h.service.submit(attempt.id, two_of_three()).await.unwrap();

        let sent = h.notifier.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, OWNER);
        assert!(sent[0].1.contains("Score 2/3"));
        assert!(sent[0].1.contains("Quiz 1"));
    }

    struct BrokenNotifier;

    #[async_trait]
    impl NotificationEmitter for BrokenNotifier {
        async fn emit(&self, _user_id: i64, _message: String) -> Result<(), StoreError> {
            Err(StoreError("inbox offline".to_string()))
        }
    }

    #[tokio::test]
    async fn notification_failure_does_not_fail_submission() {
        let catalog = MemoryQuizCatalog::new();
        catalog.upsert(quiz(1, 10, 3)).await;
        let store = MemoryAttemptStore::new();
        let service = AttemptService::new(
            Arc::new(catalog),
            Arc::new(store.clone()),
            Arc::new(BrokenNotifier),
        );

        let attempt = service.start(STUDENT, 1).await.unwrap();
        let result = service.submit(attempt.id, two_of_three()).await.unwrap();
        assert_eq!(result.score, 2);
        assert!(store.get(attempt.id).await.unwrap().unwrap().is_submitted);
    }
}
