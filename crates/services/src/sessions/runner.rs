use std::sync::Arc;

use proctor_core::model::{AnswerValue, QuestionId, QuizDefinition, SessionId, StudentId, ViolationKind};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::debug;

use super::controller::{SessionController, SessionEnv};
use super::events::SessionEvent;
use super::snapshot::SessionSnapshot;
use crate::error::SessionError;

//
// ─── RUNNER ────────────────────────────────────────────────────────────────────
//

/// Drains the session inbox one event at a time.
///
/// Owning the controller here is what serializes every transition: watchers,
/// the ticker, the pipeline and the presentation layer all go through the
/// same queue.
pub struct SessionRunner {
    controller: SessionController,
    inbox: UnboundedReceiver<SessionEvent>,
    snapshots: watch::Sender<SessionSnapshot>,
}

impl SessionRunner {
    /// Process events until `Close` arrives.
    ///
    /// The controller keeps a sender for its own producers, so the inbox never
    /// drains on its own; `SessionHandle` sends `Close` when dropped.
    pub async fn run(mut self) -> SessionSnapshot {
        while let Some(event) = self.inbox.recv().await {
            let closing = matches!(event, SessionEvent::Close);
            self.controller.handle(event);
            self.snapshots.send_replace(self.controller.snapshot());
            if closing {
                break;
            }
        }
        self.controller.shutdown();
        debug!(session_id = %self.controller.session_id(), "session runner finished");
        self.controller.snapshot()
    }
}

/// Build a controller for `quiz` and spawn its runner.
#[must_use]
pub fn spawn_session(
    quiz: Arc<QuizDefinition>,
    student_id: StudentId,
    env: SessionEnv,
) -> SessionHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let controller = SessionController::new(quiz, student_id, env, tx.clone());
    let session_id = controller.session_id();
    let (snapshots, snapshot_rx) = watch::channel(controller.snapshot());

    let runner = SessionRunner {
        controller,
        inbox: rx,
        snapshots,
    };
    let task = tokio::spawn(runner.run());

    SessionHandle {
        session_id,
        inbox: tx,
        snapshots: snapshot_rx,
        task: Some(task),
    }
}

//
// ─── HANDLE ────────────────────────────────────────────────────────────────────
//

/// Presentation-side handle to a running session.
///
/// Dropping the handle closes the session and stops its watchers.
pub struct SessionHandle {
    session_id: SessionId,
    inbox: UnboundedSender<SessionEvent>,
    snapshots: watch::Receiver<SessionSnapshot>,
    task: Option<JoinHandle<SessionSnapshot>>,
}

impl SessionHandle {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session has shut down.
    pub fn start(&self) -> Result<(), SessionError> {
        self.send(SessionEvent::Start)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session has shut down.
    pub fn record_answer(
        &self,
        question_id: QuestionId,
        value: AnswerValue,
    ) -> Result<(), SessionError> {
        self.send(SessionEvent::RecordAnswer { question_id, value })
    }

    /// Report a violation detected outside the built-in watchers.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session has shut down.
    pub fn report_violation(&self, kind: ViolationKind) -> Result<(), SessionError> {
        self.send(SessionEvent::Violation(kind))
    }

    /// Ask for a voluntary submit and wait for the controller's verdict.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Incomplete` or `SessionError::NotActive` when the
    /// submit is rejected, `SessionError::Closed` if the session has shut down.
    pub async fn submit_voluntary(&self) -> Result<(), SessionError> {
        let (reply, verdict) = oneshot::channel();
        self.send(SessionEvent::SubmitVoluntary { reply: Some(reply) })?;
        verdict.await.map_err(|_| SessionError::Closed)?
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session ends first.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionError> {
        let mut rx = self.snapshots.clone();
        let snapshot = rx
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| SessionError::Closed)?;
        Ok(snapshot.clone())
    }

    /// Wait until the session is submitted and the pipeline has reported back.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` if the session ends first.
    pub async fn settled(&self) -> Result<SessionSnapshot, SessionError> {
        self.wait_for(SessionSnapshot::is_settled).await
    }

    /// Close the session and return its final snapshot.
    pub async fn close(mut self) -> SessionSnapshot {
        let _ = self.inbox.send(SessionEvent::Close);
        match self.task.take() {
            Some(task) => match task.await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    debug!(session_id = %self.session_id, error = %err, "session runner aborted");
                    self.snapshot()
                }
            },
            None => self.snapshot(),
        }
    }

    fn send(&self, event: SessionEvent) -> Result<(), SessionError> {
        self.inbox.send(event).map_err(|_| SessionError::Closed)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if self.task.is_some() {
            let _ = self.inbox.send(SessionEvent::Close);
        }
    }
}
