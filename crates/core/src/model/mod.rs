mod answer;
mod ids;
mod quiz;
mod session;
mod submission;
mod violation;

pub use answer::AnswerValue;
pub use ids::{AttemptId, ParseIdError, QuestionId, QuizId, SessionId, StudentId};
pub use quiz::{Question, QuestionKind, QuizDefinition, QuizError};
pub use session::{DisplayStatus, SessionState};
pub use submission::{AnswerSheet, GradedAnswer, SubmissionOutcome, SubmissionRequest};
pub use violation::{ViolationKind, ViolationRecord};
