use std::sync::Arc;

use proctor_core::Clock;
use proctor_core::model::{QuizDefinition, QuizId, StudentId};
use storage::repository::{FallbackKey, FallbackRecord, FallbackStore, StorageError};
use tracing::info;

use super::controller::SessionEnv;
use super::runner::{SessionHandle, spawn_session};
use crate::config::SessionSettings;
use crate::error::LoadError;
use crate::host::HostEnvironment;
use crate::quiz_data::QuizDataService;

/// Loads quizzes and launches proctored sessions against shared collaborators.
#[derive(Clone)]
pub struct ProctorService {
    clock: Clock,
    quiz_data: Arc<dyn QuizDataService>,
    fallback: Arc<dyn FallbackStore>,
    host: Arc<dyn HostEnvironment>,
    settings: SessionSettings,
}

impl ProctorService {
    #[must_use]
    pub fn new(
        clock: Clock,
        quiz_data: Arc<dyn QuizDataService>,
        fallback: Arc<dyn FallbackStore>,
        host: Arc<dyn HostEnvironment>,
    ) -> Self {
        Self {
            clock,
            quiz_data,
            fallback,
            host,
            settings: SessionSettings::default(),
        }
    }

    #[must_use]
    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Fetch a quiz and check it can be attempted now.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::QuizData` when the fetch fails and `LoadError::Quiz`
    /// when the definition is malformed or outside its window.
    pub async fn load_quiz(&self, quiz_id: QuizId) -> Result<QuizDefinition, LoadError> {
        let quiz = self.quiz_data.fetch_quiz(quiz_id).await?;
        quiz.validate(self.clock.now())?;
        Ok(quiz)
    }

    /// Load `quiz_id` and launch a session for `student_id`. The session is
    /// returned `NotStarted`.
    ///
    /// # Errors
    ///
    /// Returns `LoadError` if the quiz cannot be loaded.
    pub async fn open_attempt(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<SessionHandle, LoadError> {
        let quiz = self.load_quiz(quiz_id).await?;
        Ok(self.launch(quiz, student_id))
    }

    /// Launch a session for an already-loaded quiz.
    #[must_use]
    pub fn launch(&self, quiz: QuizDefinition, student_id: StudentId) -> SessionHandle {
        let env = SessionEnv {
            host: Arc::clone(&self.host),
            quiz_data: Arc::clone(&self.quiz_data),
            fallback: Arc::clone(&self.fallback),
            settings: self.settings.clone(),
            clock: self.clock.clone(),
        };
        let quiz_id = quiz.id();
        let handle = spawn_session(Arc::new(quiz), student_id, env);
        info!(session_id = %handle.session_id(), %quiz_id, %student_id, "session launched");
        handle
    }

    /// Fallback record left by an undelivered attempt, if any.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the fallback store cannot be read.
    pub async fn recover(
        &self,
        quiz_id: QuizId,
        student_id: StudentId,
    ) -> Result<Option<FallbackRecord>, StorageError> {
        self.fallback.get(FallbackKey::new(quiz_id, student_id)).await
    }

    /// Most recent fallback records, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the fallback store cannot be read.
    pub async fn list_fallbacks(&self, limit: u32) -> Result<Vec<FallbackRecord>, StorageError> {
        self.fallback.list(limit).await
    }
}
