use proctor_core::model::{AnswerSheet, AnswerValue, Question, QuestionId};

/// Mutable question → answer map, frozen once the submission latch fires.
#[derive(Debug, Clone, Default)]
pub struct AnswerStore {
    answers: AnswerSheet,
    frozen: bool,
}

impl AnswerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` for `question_id`, replacing any earlier answer.
    ///
    /// Returns `false` without storing anything once the store is frozen.
    pub fn set(&mut self, question_id: QuestionId, value: AnswerValue) -> bool {
        if self.frozen {
            return false;
        }
        self.answers.insert(question_id, value);
        true
    }

    #[must_use]
    pub fn get(&self, question_id: QuestionId) -> Option<&AnswerValue> {
        self.answers.get(&question_id)
    }

    #[must_use]
    pub fn all(&self) -> &AnswerSheet {
        &self.answers
    }

    /// Owned copy for the submission payload.
    #[must_use]
    pub fn snapshot(&self) -> AnswerSheet {
        self.answers.clone()
    }

    /// Ids of `questions` that have no answer yet, in quiz order.
    #[must_use]
    pub fn missing(&self, questions: &[Question]) -> Vec<QuestionId> {
        questions
            .iter()
            .map(Question::id)
            .filter(|id| !self.answers.contains_key(id))
            .collect()
    }

    /// Number of answered questions among `questions`.
    #[must_use]
    pub fn answered(&self, questions: &[Question]) -> usize {
        questions
            .iter()
            .filter(|q| self.answers.contains_key(&q.id()))
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.answers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    #[must_use]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }
}
