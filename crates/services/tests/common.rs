#![allow(dead_code)]

use std::sync::Arc;

use proctor_core::model::{AnswerValue, Question, QuestionId, QuizDefinition, QuizId, StudentId};
use proctor_core::time::fixed_now;
use services::quiz_data::AnswerKey;
use services::{Clock, InMemoryQuizData, ProctorService, SimulatedHost};
use storage::repository::InMemoryFallbackStore;

pub const QUIZ: QuizId = QuizId::new(1);
pub const STUDENT: StudentId = StudentId::new(42);

pub struct Harness {
    pub service: ProctorService,
    pub quiz_data: InMemoryQuizData,
    pub store: Arc<InMemoryFallbackStore>,
    pub host: Arc<SimulatedHost>,
}

pub fn two_question_quiz() -> QuizDefinition {
    QuizDefinition::new(
        QUIZ,
        "Rust basics",
        vec![
            Question::single_choice(QuestionId::new(1), "Which keyword moves?", ["move", "ref"]),
            Question::single_choice(QuestionId::new(2), "Borrow checker?", ["yes", "no"]),
        ],
        10,
    )
}

pub fn answer_key() -> AnswerKey {
    let mut key = AnswerKey::new();
    key.insert(QuestionId::new(1), AnswerValue::Choice(0));
    key.insert(QuestionId::new(2), AnswerValue::Choice(0));
    key
}

pub fn harness(quiz: QuizDefinition) -> Harness {
    harness_with_host(quiz, SimulatedHost::new())
}

pub fn harness_with_host(quiz: QuizDefinition, host: SimulatedHost) -> Harness {
    let quiz_data = InMemoryQuizData::new();
    quiz_data.insert_quiz(quiz, answer_key()).unwrap();
    let store = Arc::new(InMemoryFallbackStore::new());
    let host = Arc::new(host);
    let service = ProctorService::new(
        Clock::fixed(fixed_now()),
        Arc::new(quiz_data.clone()),
        store.clone(),
        host.clone(),
    );
    Harness {
        service,
        quiz_data,
        store,
        host,
    }
}
