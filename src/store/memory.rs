// src/store/memory.rs

//! In-memory collaborators. Used by the test suites and for local runs
//! without a database.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use tokio::sync::RwLock;

use super::{AttemptStore, NotificationEmitter, QuizCatalog};
use crate::{
    error::StoreError,
    models::{
        attempt::{Attempt, HideScope, Submission, SubmitOutcome},
        quiz::Quiz,
    },
};

#[derive(Clone, Default)]
pub struct MemoryQuizCatalog {
    quizzes: Arc<RwLock<HashMap<i64, Quiz>>>,
}

impl MemoryQuizCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a quiz. Stands in for the authoring side.
    pub async fn upsert(&self, quiz: Quiz) {
        self.quizzes.write().await.insert(quiz.id, quiz);
    }

    pub async fn remove(&self, id: i64) -> Option<Quiz> {
        self.quizzes.write().await.remove(&id)
    }
}

#[async_trait]
impl QuizCatalog for MemoryQuizCatalog {
    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, StoreError> {
        Ok(self.quizzes.read().await.get(&id).cloned())
    }

    async fn list_quizzes(&self, owner: Option<i64>) -> Result<Vec<Quiz>, StoreError> {
        let quizzes = self.quizzes.read().await;
        let mut list: Vec<Quiz> = quizzes
            .values()
            .filter(|q| owner.is_none_or(|o| q.owner_id == o))
            .cloned()
            .collect();
        list.sort_by_key(|q| q.id);
        Ok(list)
    }
}

#[derive(Default)]
struct AttemptTable {
    next_id: i64,
    rows: HashMap<i64, Attempt>,
}

#[derive(Clone, Default)]
pub struct MemoryAttemptStore {
    table: Arc<RwLock<AttemptTable>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn create(
        &self,
        student_id: i64,
        quiz_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<Attempt, StoreError> {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let attempt = Attempt::in_progress(table.next_id, student_id, quiz_id, started_at);
        table.rows.insert(attempt.id, attempt.clone());
        Ok(attempt)
    }

    async fn get(&self, id: i64) -> Result<Option<Attempt>, StoreError> {
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn count_submitted(&self, student_id: i64, quiz_id: i64) -> Result<i64, StoreError> {
        let table = self.table.read().await;
        let count = table
            .rows
            .values()
            .filter(|a| a.student_id == student_id && a.quiz_id == quiz_id && a.is_submitted)
            .count();
        Ok(count as i64)
    }

    async fn conditional_submit(
        &self,
        id: i64,
        submission: Submission,
    ) -> Result<SubmitOutcome, StoreError> {
        // The write guard spans both the check and the update.
        let mut table = self.table.write().await;
        let Some(attempt) = table.rows.get_mut(&id) else {
            return Ok(SubmitOutcome::AlreadySubmitted);
        };
        if attempt.is_submitted {
            return Ok(SubmitOutcome::AlreadySubmitted);
        }

        attempt.questions_snapshot = Json(submission.questions_snapshot);
        attempt.answers = Json(submission.answers);
        attempt.score = submission.score;
        attempt.submitted_at = Some(submission.submitted_at);
        attempt.time_taken_seconds = Some(submission.time_taken_seconds);
        attempt.is_submitted = true;

        Ok(SubmitOutcome::Submitted(attempt.clone()))
    }

    async fn list_submitted(&self, quiz_id: i64) -> Result<Vec<Attempt>, StoreError> {
        let table = self.table.read().await;
        let mut list: Vec<Attempt> = table
            .rows
            .values()
            .filter(|a| a.quiz_id == quiz_id && a.is_submitted)
            .cloned()
            .collect();
        list.sort_by_key(|a| a.id);
        Ok(list)
    }

    async fn list_history(&self, student_id: i64) -> Result<Vec<Attempt>, StoreError> {
        let table = self.table.read().await;
        let mut list: Vec<Attempt> = table
            .rows
            .values()
            .filter(|a| a.student_id == student_id && a.is_submitted && !a.hidden_for_student)
            .cloned()
            .collect();
        list.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at).then(b.id.cmp(&a.id)));
        Ok(list)
    }

    async fn set_hidden(&self, scope: HideScope) -> Result<u64, StoreError> {
        let mut table = self.table.write().await;
        let mut updated = 0;

        for attempt in table.rows.values_mut() {
            match &scope {
                HideScope::Student { student_id, ids } => {
                    if attempt.student_id == *student_id && is_selected(ids, attempt.id) {
                        attempt.hidden_for_student = true;
                        updated += 1;
                    }
                }
                HideScope::Quiz { quiz_id, ids } => {
                    if attempt.quiz_id == *quiz_id && attempt.is_submitted && is_selected(ids, attempt.id) {
                        attempt.hidden_for_teacher = true;
                        updated += 1;
                    }
                }
            }
        }

        Ok(updated)
    }
}

fn is_selected(ids: &Option<Vec<i64>>, id: i64) -> bool {
    ids.as_ref().is_none_or(|ids| ids.contains(&id))
}

/// Records every emitted notification.
#[derive(Clone, Default)]
pub struct MemoryNotifier {
    sent: Arc<RwLock<Vec<(i64, String)>>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(i64, String)> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationEmitter for MemoryNotifier {
    async fn emit(&self, user_id: i64, message: String) -> Result<(), StoreError> {
        self.sent.write().await.push((user_id, message));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{attempt::AnswerMap, question::Question};

    fn submission(score: i32) -> Submission {
        Submission {
            questions_snapshot: vec![Question::new("Q", &["A", "B"], 0)],
            answers: AnswerMap::from([(0, 0)]),
            score,
            submitted_at: Utc::now(),
            time_taken_seconds: 5,
        }
    }

    #[tokio::test]
    async fn conditional_submit_only_succeeds_once() {
        let store = MemoryAttemptStore::new();
        let attempt = store.create(1, 1, Utc::now()).await.unwrap();

        let first = store.conditional_submit(attempt.id, submission(1)).await.unwrap();
        let second = store.conditional_submit(attempt.id, submission(0)).await.unwrap();

        assert!(matches!(first, SubmitOutcome::Submitted(_)));
        assert!(matches!(second, SubmitOutcome::AlreadySubmitted));

        let stored = store.get(attempt.id).await.unwrap().unwrap();
        assert_eq!(stored.score, 1);
        assert_eq!(store.count_submitted(1, 1).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn conditional_submit_on_unknown_id_reports_already_submitted() {
        let store = MemoryAttemptStore::new();
        let outcome = store.conditional_submit(42, submission(1)).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::AlreadySubmitted));
    }

    #[tokio::test]
    async fn hide_scopes_touch_only_their_own_flag() {
        let store = MemoryAttemptStore::new();
        let a = store.create(1, 10, Utc::now()).await.unwrap();
        let b = store.create(2, 10, Utc::now()).await.unwrap();
        store.conditional_submit(a.id, submission(1)).await.unwrap();
        store.conditional_submit(b.id, submission(1)).await.unwrap();

        let hidden = store
            .set_hidden(HideScope::Student { student_id: 1, ids: Some(vec![a.id, b.id]) })
            .await
            .unwrap();
        assert_eq!(hidden, 1);

        let a_row = store.get(a.id).await.unwrap().unwrap();
        let b_row = store.get(b.id).await.unwrap().unwrap();
        assert!(a_row.hidden_for_student);
        assert!(!a_row.hidden_for_teacher);
        assert!(!b_row.hidden_for_student);

        store
            .set_hidden(HideScope::Quiz { quiz_id: 10, ids: None })
            .await
            .unwrap();
        assert!(store.get(b.id).await.unwrap().unwrap().hidden_for_teacher);
        assert_eq!(store.list_history(1).await.unwrap().len(), 0);
        assert_eq!(store.list_history(2).await.unwrap().len(), 1);
    }
}
