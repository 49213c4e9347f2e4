use proctor_core::model::{AnswerValue, DisplayStatus, QuestionId, ViolationKind};
use tokio::sync::oneshot;

use super::pipeline::PipelineResult;
use crate::error::SessionError;

/// Everything the session runner processes, one at a time.
#[derive(Debug)]
pub enum SessionEvent {
    Start,
    RecordAnswer {
        question_id: QuestionId,
        value: AnswerValue,
    },
    SubmitVoluntary {
        reply: Option<oneshot::Sender<Result<(), SessionError>>>,
    },
    Violation(ViolationKind),
    Tick,
    DisplayStatus(DisplayStatus),
    SubmissionFinished(PipelineResult),
    Close,
}
