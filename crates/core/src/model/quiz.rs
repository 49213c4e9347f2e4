use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, QuizId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons a quiz definition cannot be used for an attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuizError {
    #[error("quiz has no questions")]
    NoQuestions,

    #[error("question {0} appears more than once")]
    DuplicateQuestion(QuestionId),

    #[error("choice question {0} has no choices")]
    MissingChoices(QuestionId),

    #[error("true/false question {0} must have exactly two choices")]
    InvalidTrueFalse(QuestionId),

    #[error("max score must be > 0")]
    ZeroMaxScore,

    #[error("time limit must be at least one minute")]
    ZeroTimeLimit,

    #[error("quiz window closes before it opens")]
    InvalidWindow,

    #[error("quiz opens at {opens_at}")]
    NotYetOpen { opens_at: DateTime<Utc> },

    #[error("quiz closed at {closed_at}")]
    Closed { closed_at: DateTime<Utc> },
}

//
// ─── QUESTIONS ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuestionKind {
    SingleChoice,
    TrueFalse,
    FreeText,
}

impl QuestionKind {
    #[must_use]
    pub fn has_choices(self) -> bool {
        matches!(self, Self::SingleChoice | Self::TrueFalse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    prompt: String,
    kind: QuestionKind,
    #[serde(default)]
    choices: Vec<String>,
}

impl Question {
    #[must_use]
    pub fn single_choice<I, S>(id: QuestionId, prompt: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            prompt: prompt.into(),
            kind: QuestionKind::SingleChoice,
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn true_false(id: QuestionId, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            kind: QuestionKind::TrueFalse,
            choices: vec!["True".to_owned(), "False".to_owned()],
        }
    }

    #[must_use]
    pub fn free_text(id: QuestionId, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            kind: QuestionKind::FreeText,
            choices: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> QuestionId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn kind(&self) -> QuestionKind {
        self.kind
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }
}

//
// ─── QUIZ DEFINITION ───────────────────────────────────────────────────────────
//

/// Read-only quiz definition as served by the quiz-data service.
///
/// Deserialized values are unchecked; call [`QuizDefinition::validate`] before
/// starting an attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizDefinition {
    id: QuizId,
    title: String,
    questions: Vec<Question>,
    max_score: u32,
    #[serde(default)]
    time_limit_minutes: Option<u32>,
    #[serde(default)]
    is_proctored: bool,
    #[serde(default)]
    opens_at: Option<DateTime<Utc>>,
    #[serde(default)]
    closes_at: Option<DateTime<Utc>>,
}

impl QuizDefinition {
    /// Untimed, unproctored quiz with an always-open window.
    #[must_use]
    pub fn new(
        id: QuizId,
        title: impl Into<String>,
        questions: Vec<Question>,
        max_score: u32,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            questions,
            max_score,
            time_limit_minutes: None,
            is_proctored: false,
            opens_at: None,
            closes_at: None,
        }
    }

    #[must_use]
    pub fn with_time_limit(mut self, minutes: u32) -> Self {
        self.time_limit_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn with_proctoring(mut self, is_proctored: bool) -> Self {
        self.is_proctored = is_proctored;
        self
    }

    #[must_use]
    pub fn with_window(
        mut self,
        opens_at: Option<DateTime<Utc>>,
        closes_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.opens_at = opens_at;
        self.closes_at = closes_at;
        self
    }

    /// Check structural integrity and that the window is open at `now`.
    ///
    /// # Errors
    ///
    /// Returns the first `QuizError` found.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), QuizError> {
        if self.questions.is_empty() {
            return Err(QuizError::NoQuestions);
        }
        if self.max_score == 0 {
            return Err(QuizError::ZeroMaxScore);
        }
        if self.time_limit_minutes == Some(0) {
            return Err(QuizError::ZeroTimeLimit);
        }

        let mut seen = HashSet::with_capacity(self.questions.len());
        for question in &self.questions {
            if !seen.insert(question.id) {
                return Err(QuizError::DuplicateQuestion(question.id));
            }
            match question.kind {
                QuestionKind::TrueFalse if question.choices.len() != 2 => {
                    return Err(QuizError::InvalidTrueFalse(question.id));
                }
                QuestionKind::SingleChoice if question.choices.is_empty() => {
                    return Err(QuizError::MissingChoices(question.id));
                }
                _ => {}
            }
        }

        if let (Some(opens), Some(closes)) = (self.opens_at, self.closes_at) {
            if closes < opens {
                return Err(QuizError::InvalidWindow);
            }
        }
        if let Some(opens_at) = self.opens_at {
            if now < opens_at {
                return Err(QuizError::NotYetOpen { opens_at });
            }
        }
        if let Some(closed_at) = self.closes_at {
            if now >= closed_at {
                return Err(QuizError::Closed { closed_at });
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> QuizId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    #[must_use]
    pub fn max_score(&self) -> u32 {
        self.max_score
    }

    #[must_use]
    pub fn time_limit_minutes(&self) -> Option<u32> {
        self.time_limit_minutes
    }

    /// Countdown length in seconds, if the quiz is timed.
    #[must_use]
    pub fn time_limit_secs(&self) -> Option<u64> {
        self.time_limit_minutes.map(|m| u64::from(m) * 60)
    }

    #[must_use]
    pub fn is_proctored(&self) -> bool {
        self.is_proctored
    }

    #[must_use]
    pub fn opens_at(&self) -> Option<DateTime<Utc>> {
        self.opens_at
    }

    #[must_use]
    pub fn closes_at(&self) -> Option<DateTime<Utc>> {
        self.closes_at
    }
}
