mod http;
mod in_memory;

use async_trait::async_trait;
use proctor_core::model::{QuizDefinition, QuizId, SubmissionOutcome, SubmissionRequest};

use crate::error::QuizDataError;

pub use http::HttpQuizDataService;
pub use in_memory::{AnswerKey, InMemoryQuizData};

/// Request/response contract with the quiz-data service.
#[async_trait]
pub trait QuizDataService: Send + Sync {
    /// Fetch a quiz definition by id.
    ///
    /// # Errors
    ///
    /// Returns `QuizDataError::NotFound` for unknown quizzes, or transport and
    /// decoding errors.
    async fn fetch_quiz(&self, id: QuizId) -> Result<QuizDefinition, QuizDataError>;

    /// Deliver the one submission of an attempt and return its grading.
    ///
    /// # Errors
    ///
    /// Returns `QuizDataError` if delivery or decoding fails.
    async fn submit(&self, request: &SubmissionRequest)
    -> Result<SubmissionOutcome, QuizDataError>;
}
