use std::sync::Arc;

use crate::config::Config;
use crate::services::{AnalyticsService, AttemptService};
use crate::store::{
    AttemptStore, NotificationEmitter, PgAttemptStore, PgNotifier, PgQuizCatalog, QuizCatalog,
};
use axum::extract::FromRef;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub quizzes: Arc<dyn QuizCatalog>,
    pub attempts: AttemptService,
    pub analytics: AnalyticsService,
    pub config: Config,
}

impl AppState {
    /// Wires the engine and analytics over the given collaborators.
    pub fn new(
        quizzes: Arc<dyn QuizCatalog>,
        attempts: Arc<dyn AttemptStore>,
        notifier: Arc<dyn NotificationEmitter>,
        config: Config,
    ) -> Self {
        Self {
            attempts: AttemptService::new(quizzes.clone(), attempts.clone(), notifier),
            analytics: AnalyticsService::new(quizzes.clone(), attempts),
            quizzes,
            config,
        }
    }

    /// Postgres-backed state.
    pub fn postgres(pool: PgPool, config: Config) -> Self {
        Self::new(
            Arc::new(PgQuizCatalog::new(pool.clone())),
            Arc::new(PgAttemptStore::new(pool.clone())),
            Arc::new(PgNotifier::new(pool)),
            config,
        )
    }
}

impl FromRef<AppState> for Arc<dyn QuizCatalog> {
    fn from_ref(state: &AppState) -> Self {
        state.quizzes.clone()
    }
}

impl FromRef<AppState> for AttemptService {
    fn from_ref(state: &AppState) -> Self {
        state.attempts.clone()
    }
}

impl FromRef<AppState> for AnalyticsService {
    fn from_ref(state: &AppState) -> Self {
        state.analytics.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
