use proctor_core::model::{
    DisplayStatus, QuizId, SessionId, SessionState, SubmissionOutcome, ViolationKind,
};
use serde::Serialize;

use super::pipeline::PipelineResult;

/// Where the session's single submission stands.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum SubmissionStatus {
    #[default]
    NotSubmitted,
    InFlight,
    Graded(SubmissionOutcome),
    /// Shown to the student as "answers saved".
    SavedLocally { reason: String, persisted: bool },
}

impl SubmissionStatus {
    /// The pipeline has reported back.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Graded(_) | Self::SavedLocally { .. })
    }
}

impl From<PipelineResult> for SubmissionStatus {
    fn from(result: PipelineResult) -> Self {
        match result {
            PipelineResult::Graded(outcome) => Self::Graded(outcome),
            PipelineResult::SavedLocally { reason, persisted } => {
                Self::SavedLocally { reason, persisted }
            }
        }
    }
}

/// Read-only view of a session for the presentation layer.
///
/// Presentation never mutates session state; it only renders the latest
/// snapshot published after each processed event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub quiz_id: QuizId,
    pub state: SessionState,
    pub remaining_secs: Option<u64>,
    pub display: DisplayStatus,
    pub violation_count: usize,
    pub last_violation: Option<ViolationKind>,
    pub answered: usize,
    pub total_questions: usize,
    pub submission: SubmissionStatus,
    pub read_only: bool,
    pub redirect_after_secs: Option<u64>,
}

impl SessionSnapshot {
    /// Message explaining why the attempt was suspended.
    #[must_use]
    pub fn violation_reason(&self) -> Option<&'static str> {
        if self.state.has_latched() {
            self.last_violation.map(ViolationKind::reason)
        } else {
            None
        }
    }

    /// Graded outcome, available once the session is submitted.
    #[must_use]
    pub fn outcome(&self) -> Option<&SubmissionOutcome> {
        match (&self.state, &self.submission) {
            (SessionState::Submitted, SubmissionStatus::Graded(outcome)) => Some(outcome),
            _ => None,
        }
    }

    /// Submitted and the pipeline has reported back.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state.is_terminal() && self.submission.is_finished()
    }
}
