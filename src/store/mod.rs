// src/store/mod.rs

//! Collaborator ports used by the attempt engine and analytics.
//!
//! Each port is an object-safe async trait so that handlers can hold an
//! `Arc<dyn ...>` regardless of the backing store.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::StoreError,
    models::{
        attempt::{Attempt, HideScope, Submission, SubmitOutcome},
        quiz::Quiz,
    },
};

pub use memory::{MemoryAttemptStore, MemoryNotifier, MemoryQuizCatalog};
pub use postgres::{PgAttemptStore, PgNotifier, PgQuizCatalog};

/// Read-only view of quiz definitions.
#[async_trait]
pub trait QuizCatalog: Send + Sync {
    async fn get_quiz(&self, id: i64) -> Result<Option<Quiz>, StoreError>;

    /// Quizzes owned by `owner`, or every quiz when `owner` is `None`.
    async fn list_quizzes(&self, owner: Option<i64>) -> Result<Vec<Quiz>, StoreError>;
}

/// Durable attempt records.
#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn create(
        &self,
        student_id: i64,
        quiz_id: i64,
        started_at: DateTime<Utc>,
    ) -> Result<Attempt, StoreError>;

    async fn get(&self, id: i64) -> Result<Option<Attempt>, StoreError>;

    async fn count_submitted(&self, student_id: i64, quiz_id: i64) -> Result<i64, StoreError>;

    /// Applies `submission` only if the attempt is still unsubmitted.
    /// Check and write are a single atomic step.
    async fn conditional_submit(
        &self,
        id: i64,
        submission: Submission,
    ) -> Result<SubmitOutcome, StoreError>;

    /// Every submitted attempt of a quiz, regardless of visibility flags.
    async fn list_submitted(&self, quiz_id: i64) -> Result<Vec<Attempt>, StoreError>;

    /// Submitted attempts of a student not hidden by that student, newest first.
    async fn list_history(&self, student_id: i64) -> Result<Vec<Attempt>, StoreError>;

    /// Sets the visibility flag named by `scope`. Returns the number of records matched.
    async fn set_hidden(&self, scope: HideScope) -> Result<u64, StoreError>;
}

/// Outbound "something happened" messages to a user.
#[async_trait]
pub trait NotificationEmitter: Send + Sync {
    async fn emit(&self, user_id: i64, message: String) -> Result<(), StoreError>;
}
