//! Scripted sessions for `app simulate`.

use std::time::Duration;

use proctor_core::model::{AnswerValue, QuestionId, QuizDefinition, SessionState};
use serde::Deserialize;
use services::quiz_data::AnswerKey;
use services::{SessionError, SessionHandle, SimulatedHost};
use tracing::{info, warn};

/// Quiz file: the definition plus the key used for local grading.
#[derive(Debug, Deserialize)]
pub struct QuizFile {
    pub quiz: QuizDefinition,
    #[serde(default)]
    pub answer_key: AnswerKey,
}

/// One scripted student or host action.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    Start,
    Answer {
        question_id: QuestionId,
        value: AnswerValue,
    },
    Submit,
    Wait {
        ms: u64,
    },
    ExitFullscreen,
    HideTab,
    ShowTab,
    Blur,
    Focus,
}

/// Play `steps` against a running session.
///
/// # Errors
///
/// Returns `SessionError::Closed` if the session goes away mid-script.
pub async fn play(
    steps: &[Step],
    session: &SessionHandle,
    host: &SimulatedHost,
) -> Result<(), SessionError> {
    for step in steps {
        match step {
            Step::Start => {
                session.start()?;
                // Watchers subscribe while `Start` is handled.
                session
                    .wait_for(|s| s.state != SessionState::NotStarted)
                    .await?;
            }
            Step::Answer { question_id, value } => {
                session.record_answer(*question_id, value.clone())?;
            }
            Step::Submit => match session.submit_voluntary().await {
                Ok(()) => info!("voluntary submit accepted"),
                Err(SessionError::Closed) => return Err(SessionError::Closed),
                Err(err) => warn!(error = %err, "voluntary submit rejected"),
            },
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::ExitFullscreen => host.exit_exclusive_display(),
            Step::HideTab => host.hide_tab(),
            Step::ShowTab => host.show_tab(),
            Step::Blur => host.blur(),
            Step::Focus => host.focus(),
        }
    }
    Ok(())
}
