//! Shared error types for the services crate.

use thiserror::Error;

use proctor_core::model::{QuestionId, QuizError, QuizId, SessionState};
use storage::repository::StorageError;

/// Errors emitted by quiz-data service clients.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum QuizDataError {
    #[error("quiz {0} not found")]
    NotFound(QuizId),
    #[error("quiz data request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("malformed quiz data payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error(transparent)]
    Url(#[from] url::ParseError),
    #[error("quiz data unavailable: {0}")]
    Unavailable(String),
}

/// Errors that keep an attempt from ever reaching `Active`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error(transparent)]
    QuizData(#[from] QuizDataError),
    #[error(transparent)]
    Quiz(#[from] QuizError),
}

/// Rejections of session commands.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("session is {state}, not active")]
    NotActive { state: SessionState },
    #[error("{} question(s) still unanswered", missing.len())]
    Incomplete { missing: Vec<QuestionId> },
    #[error("session has been closed")]
    Closed,
}

/// Errors emitted by the submission pipeline.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PipelineError {
    #[error("submission already sent for this session")]
    AlreadySubmitted,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} is not set")]
    Missing { var: &'static str },
    #[error("invalid {var}: {value}")]
    Invalid { var: &'static str, value: String },
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
