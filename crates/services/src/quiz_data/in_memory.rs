use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use proctor_core::model::{
    AttemptId, GradedAnswer, QuestionId, QuestionKind, QuizDefinition, QuizId, SubmissionOutcome,
    SubmissionRequest,
};

use super::QuizDataService;
use crate::error::QuizDataError;

/// Correct answers for the auto-gradable questions of a quiz.
pub type AnswerKey = BTreeMap<QuestionId, proctor_core::model::AnswerValue>;

#[derive(Default)]
struct Inner {
    quizzes: HashMap<QuizId, (QuizDefinition, AnswerKey)>,
    submissions: Vec<SubmissionRequest>,
}

/// Quiz-data service that grades locally. Used by tests and `simulate`.
///
/// Choice questions are compared against the answer key; free-text answers
/// are left for manual grading, which also withholds the score.
#[derive(Clone, Default)]
pub struct InMemoryQuizData {
    inner: Arc<Mutex<Inner>>,
    next_attempt: Arc<AtomicU64>,
    reject_submissions: Arc<AtomicBool>,
}

impl InMemoryQuizData {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a quiz and its answer key.
    ///
    /// # Errors
    ///
    /// Returns `QuizDataError::Unavailable` if the internal lock is poisoned.
    pub fn insert_quiz(&self, quiz: QuizDefinition, key: AnswerKey) -> Result<(), QuizDataError> {
        let mut guard = self.lock()?;
        guard.quizzes.insert(quiz.id(), (quiz, key));
        Ok(())
    }

    /// Make every following `submit` fail, as an unreachable server would.
    pub fn reject_submissions(&self, reject: bool) {
        self.reject_submissions.store(reject, Ordering::SeqCst);
    }

    /// Submissions received so far, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns `QuizDataError::Unavailable` if the internal lock is poisoned.
    pub fn submissions(&self) -> Result<Vec<SubmissionRequest>, QuizDataError> {
        Ok(self.lock()?.submissions.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, QuizDataError> {
        self.inner
            .lock()
            .map_err(|e| QuizDataError::Unavailable(e.to_string()))
    }
}

fn grade(quiz: &QuizDefinition, key: &AnswerKey, request: &SubmissionRequest) -> BTreeMap<QuestionId, GradedAnswer> {
    quiz.questions()
        .iter()
        .map(|question| {
            let student_answer = request.answers.get(&question.id()).cloned();
            let correct_answer = key.get(&question.id()).cloned();
            let is_correct = match question.kind() {
                QuestionKind::FreeText => None,
                QuestionKind::SingleChoice | QuestionKind::TrueFalse => Some(
                    student_answer.is_some() && student_answer == correct_answer,
                ),
            };
            (
                question.id(),
                GradedAnswer {
                    student_answer,
                    is_correct,
                    correct_answer,
                },
            )
        })
        .collect()
}

fn score(max_score: u32, graded: &BTreeMap<QuestionId, GradedAnswer>) -> Option<u32> {
    if graded.values().any(|g| g.is_correct.is_none()) {
        return None;
    }
    let total = u64::try_from(graded.len()).ok().filter(|n| *n > 0)?;
    let correct = graded.values().filter(|g| g.is_correct == Some(true)).count();
    let correct = u64::try_from(correct).ok()?;
    u32::try_from(u64::from(max_score) * correct / total).ok()
}

#[async_trait]
impl QuizDataService for InMemoryQuizData {
    async fn fetch_quiz(&self, id: QuizId) -> Result<QuizDefinition, QuizDataError> {
        let guard = self.lock()?;
        guard
            .quizzes
            .get(&id)
            .map(|(quiz, _)| quiz.clone())
            .ok_or(QuizDataError::NotFound(id))
    }

    async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionOutcome, QuizDataError> {
        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(QuizDataError::Unavailable("grading service offline".into()));
        }

        let mut guard = self.lock()?;
        let (quiz, key) = guard
            .quizzes
            .get(&request.quiz_id)
            .ok_or(QuizDataError::NotFound(request.quiz_id))?;

        let graded_answers = grade(quiz, key, request);
        let needs_manual_grading = graded_answers.values().any(|g| g.is_correct.is_none());
        let outcome = SubmissionOutcome {
            attempt_id: AttemptId::new(self.next_attempt.fetch_add(1, Ordering::SeqCst) + 1),
            score: score(quiz.max_score(), &graded_answers),
            max_score: quiz.max_score(),
            graded_answers,
            needs_manual_grading,
        };
        guard.submissions.push(request.clone());
        Ok(outcome)
    }
}
