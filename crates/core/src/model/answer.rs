use std::fmt;

use serde::{Deserialize, Serialize};

/// Captured response to a question: a choice index or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Choice(usize),
    Text(String),
}

impl AnswerValue {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn as_choice(&self) -> Option<usize> {
        match self {
            Self::Choice(index) => Some(*index),
            Self::Text(_) => None,
        }
    }
}

impl fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Choice(index) => write!(f, "#{index}"),
            Self::Text(text) => f.write_str(text),
        }
    }
}
