use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{AnswerValue, AttemptId, QuestionId, QuizId, StudentId};

/// Answer snapshot sent to the grading service.
pub type AnswerSheet = BTreeMap<QuestionId, AnswerValue>;

/// Body of the one submission call made per session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub quiz_id: QuizId,
    pub student_id: StudentId,
    pub answers: AnswerSheet,
    pub violated: bool,
}

/// Server grading of one question.
///
/// `is_correct` is `None` when the question needs manual grading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradedAnswer {
    pub student_answer: Option<AnswerValue>,
    pub is_correct: Option<bool>,
    pub correct_answer: Option<AnswerValue>,
}

/// Result returned by the grading service for a delivered submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    pub attempt_id: AttemptId,
    pub score: Option<u32>,
    pub max_score: u32,
    pub graded_answers: BTreeMap<QuestionId, GradedAnswer>,
    pub needs_manual_grading: bool,
}
