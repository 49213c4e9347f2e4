use std::fmt;
use std::sync::Arc;

use proctor_core::Clock;
use proctor_core::model::{
    AnswerValue, DisplayStatus, QuestionId, QuizDefinition, SessionId, SessionState, StudentId,
    SubmissionRequest, ViolationKind, ViolationRecord,
};
use storage::repository::{FallbackKey, FallbackStore};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use super::answers::AnswerStore;
use super::events::SessionEvent;
use super::monitor::Producers;
use super::pipeline::{PipelineResult, SubmissionPipeline};
use super::snapshot::{SessionSnapshot, SubmissionStatus};
use super::timer::Countdown;
use super::violations::ViolationLog;
use crate::config::SessionSettings;
use crate::error::SessionError;
use crate::host::HostEnvironment;
use crate::quiz_data::QuizDataService;

/// Collaborators a controller needs besides its quiz.
///
/// Shareable between sessions; each controller builds its own
/// [`SubmissionPipeline`] from `quiz_data` and `fallback`.
#[derive(Clone)]
pub struct SessionEnv {
    pub host: Arc<dyn HostEnvironment>,
    pub quiz_data: Arc<dyn QuizDataService>,
    pub fallback: Arc<dyn FallbackStore>,
    pub settings: SessionSettings,
    pub clock: Clock,
}

/// Owner of one attempt's state. Every transition goes through here.
///
/// The submission latch is the state itself: the pipeline is invoked only on
/// the transition out of `Active`, which can happen once.
pub struct SessionController {
    session_id: SessionId,
    quiz: Arc<QuizDefinition>,
    student_id: StudentId,
    state: SessionState,
    answers: AnswerStore,
    violations: ViolationLog,
    countdown: Option<Countdown>,
    display: DisplayStatus,
    submission: SubmissionStatus,
    // Violations seen after the latch, waiting for a fallback record to attach to.
    late: Vec<ViolationRecord>,
    producers: Producers,
    pipeline: Arc<SubmissionPipeline>,
    env: SessionEnv,
    inbox: UnboundedSender<SessionEvent>,
}

impl SessionController {
    #[must_use]
    pub fn new(
        quiz: Arc<QuizDefinition>,
        student_id: StudentId,
        env: SessionEnv,
        inbox: UnboundedSender<SessionEvent>,
    ) -> Self {
        let pipeline = SubmissionPipeline::new(
            Arc::clone(&env.quiz_data),
            Arc::clone(&env.fallback),
            env.clock.clone(),
        );
        Self {
            session_id: SessionId::random(),
            quiz,
            student_id,
            state: SessionState::NotStarted,
            answers: AnswerStore::new(),
            violations: ViolationLog::new(),
            countdown: None,
            display: DisplayStatus::NotRequested,
            submission: SubmissionStatus::NotSubmitted,
            late: Vec::new(),
            producers: Producers::default(),
            pipeline: Arc::new(pipeline),
            env,
            inbox,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    #[must_use]
    pub fn violations(&self) -> &ViolationLog {
        &self.violations
    }

    #[must_use]
    pub fn submission(&self) -> &SubmissionStatus {
        &self.submission
    }

    /// Dispatch one inbox event.
    pub fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Start => self.start(),
            SessionEvent::RecordAnswer { question_id, value } => {
                self.record_answer(question_id, value);
            }
            SessionEvent::SubmitVoluntary { reply } => {
                let result = self.submit_voluntary();
                match reply {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => {
                        if let Err(err) = result {
                            debug!(session_id = %self.session_id, error = %err, "voluntary submit rejected");
                        }
                    }
                }
            }
            SessionEvent::Violation(kind) => self.on_violation(kind),
            SessionEvent::Tick => self.on_tick(),
            SessionEvent::DisplayStatus(status) => self.on_display_status(status),
            SessionEvent::SubmissionFinished(result) => self.on_submission_finished(result),
            SessionEvent::Close => self.shutdown(),
        }
    }

    /// `NotStarted → Active`, arming monitors and timer as the quiz requires.
    pub fn start(&mut self) {
        if self.state != SessionState::NotStarted {
            debug!(session_id = %self.session_id, state = %self.state, "start ignored");
            return;
        }

        self.state = SessionState::Active;
        self.countdown = self.quiz.time_limit_secs().map(Countdown::new);

        if self.quiz.is_proctored() {
            self.producers.arm_monitors(
                &self.env.host,
                &self.inbox,
                self.env.settings.display_poll(),
            );
        }
        if self.countdown.is_some() {
            self.producers
                .arm_timer(&self.inbox, self.env.settings.tick_period());
        }

        info!(
            session_id = %self.session_id,
            quiz_id = %self.quiz.id(),
            proctored = self.quiz.is_proctored(),
            time_limit_secs = ?self.quiz.time_limit_secs(),
            "session started"
        );
    }

    /// Store an answer while `Active`; a no-op in every other state.
    pub fn record_answer(&mut self, question_id: QuestionId, value: AnswerValue) {
        if !self.state.is_active() {
            debug!(session_id = %self.session_id, %question_id, state = %self.state, "answer ignored");
            return;
        }
        self.answers.set(question_id, value);
    }

    /// Submit without a violation. Requires every question to be answered.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside `Active` and
    /// `SessionError::Incomplete` while questions are unanswered.
    pub fn submit_voluntary(&mut self) -> Result<(), SessionError> {
        if !self.state.is_active() {
            return Err(SessionError::NotActive { state: self.state });
        }
        let missing = self.answers.missing(self.quiz.questions());
        if !missing.is_empty() {
            return Err(SessionError::Incomplete { missing });
        }

        self.stop_producers();
        self.state = SessionState::Submitted;
        info!(session_id = %self.session_id, "session submitted voluntarily");
        self.fire_pipeline(false);
        Ok(())
    }

    /// Record a violation. The first one while `Active` suspends the session
    /// and submits; later ones are logged only.
    pub fn on_violation(&mut self, kind: ViolationKind) {
        if self.state == SessionState::NotStarted {
            debug!(session_id = %self.session_id, %kind, "violation before start ignored");
            return;
        }

        let record = self.violations.append(kind, self.env.clock.now());

        if self.state.is_active() {
            warn!(session_id = %self.session_id, %kind, "violation detected, suspending");
            self.stop_producers();
            self.state = SessionState::Suspended;
            self.fire_pipeline(true);
            return;
        }

        debug!(session_id = %self.session_id, %kind, state = %self.state, "late violation logged");
        match self.submission {
            SubmissionStatus::Graded(_) | SubmissionStatus::SavedLocally { persisted: false, .. } => {}
            SubmissionStatus::SavedLocally { persisted: true, .. } => {
                self.late.push(record);
                self.flush_late_violations();
            }
            SubmissionStatus::NotSubmitted | SubmissionStatus::InFlight => self.late.push(record),
        }
    }

    /// Time ran out: a `time-expired` violation with the same latch.
    pub fn on_expiry(&mut self) {
        self.on_violation(ViolationKind::TimeExpired);
    }

    /// One timer period elapsed.
    pub fn on_tick(&mut self) {
        if !self.state.is_active() {
            return;
        }
        let expired = self.countdown.as_mut().is_some_and(Countdown::tick);
        if expired {
            self.on_expiry();
        }
    }

    pub fn on_display_status(&mut self, status: DisplayStatus) {
        if !self.state.is_active() {
            return;
        }
        if status == DisplayStatus::Denied {
            info!(session_id = %self.session_id, "exclusive display denied by host");
        }
        self.display = status;
    }

    pub fn on_submission_finished(&mut self, result: PipelineResult) {
        let keeps_fallback = matches!(result, PipelineResult::SavedLocally { persisted: true, .. });
        self.submission = result.into();

        if self.state == SessionState::Suspended {
            self.state = SessionState::Submitted;
        }
        info!(session_id = %self.session_id, graded = matches!(self.submission, SubmissionStatus::Graded(_)), "submission finished");

        if keeps_fallback {
            self.flush_late_violations();
        } else {
            self.late.clear();
        }
    }

    /// Presentation detached; stop everything still running.
    pub fn shutdown(&mut self) {
        if self.producers.is_armed() {
            debug!(session_id = %self.session_id, state = %self.state, "shutting down armed session");
        }
        self.stop_producers();
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let latched = self.state.has_latched();
        SessionSnapshot {
            session_id: self.session_id,
            quiz_id: self.quiz.id(),
            state: self.state,
            remaining_secs: self.countdown.map(|c| c.remaining()),
            display: self.display,
            violation_count: self.violations.len(),
            last_violation: self.violations.last().map(ViolationRecord::kind),
            answered: self.answers.answered(self.quiz.questions()),
            total_questions: self.quiz.questions().len(),
            submission: self.submission.clone(),
            read_only: !self.state.is_active(),
            redirect_after_secs: latched.then(|| self.env.settings.redirect_delay().as_secs()),
        }
    }

    // Runs to completion before the transition that called it continues.
    fn stop_producers(&mut self) {
        self.producers.stop_all();
        if self.display == DisplayStatus::Exclusive {
            self.display = DisplayStatus::NotRequested;
        }
        self.answers.freeze();
    }

    fn fire_pipeline(&mut self, violated: bool) {
        self.submission = SubmissionStatus::InFlight;

        let request = SubmissionRequest {
            quiz_id: self.quiz.id(),
            student_id: self.student_id,
            answers: self.answers.snapshot(),
            violated,
        };
        let violations = self.violations.all().to_vec();
        let pipeline = Arc::clone(&self.pipeline);
        let inbox = self.inbox.clone();
        let session_id = self.session_id;

        tokio::spawn(async move {
            let result = match pipeline.submit(session_id, request, violations).await {
                Ok(result) => result,
                Err(err) => {
                    warn!(%session_id, error = %err, "submission pipeline refused");
                    PipelineResult::SavedLocally {
                        reason: format!("submission refused: {err}"),
                        persisted: false,
                    }
                }
            };
            let _ = inbox.send(SessionEvent::SubmissionFinished(result));
        });
    }

    fn flush_late_violations(&mut self) {
        if self.late.is_empty() {
            return;
        }
        let late = std::mem::take(&mut self.late);
        let key = FallbackKey::new(self.quiz.id(), self.student_id);
        let pipeline = Arc::clone(&self.pipeline);
        let session_id = self.session_id;

        tokio::spawn(async move {
            if let Err(err) = pipeline.annotate(key, &late).await {
                warn!(%session_id, error = %err, "could not attach late violations");
            }
        });
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("session_id", &self.session_id)
            .field("quiz_id", &self.quiz.id())
            .field("state", &self.state)
            .field("answers_len", &self.answers.len())
            .field("violations_len", &self.violations.len())
            .field("countdown", &self.countdown)
            .field("submission", &self.submission)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proctor_core::model::Question;
    use proctor_core::time::fixed_clock;
    use proctor_core::model::QuizId;
    use storage::repository::{FallbackStore, InMemoryFallbackStore};
    use tokio::sync::mpsc::{self, UnboundedReceiver};

    use crate::host::SimulatedHost;
    use crate::quiz_data::{AnswerKey, InMemoryQuizData};

    struct Fixture {
        controller: SessionController,
        inbox: UnboundedReceiver<SessionEvent>,
        quiz_data: InMemoryQuizData,
        store: Arc<InMemoryFallbackStore>,
        host: Arc<SimulatedHost>,
    }

    fn quiz(proctored: bool) -> QuizDefinition {
        QuizDefinition::new(
            QuizId::new(7),
            "Two questions",
            vec![
                Question::single_choice(QuestionId::new(1), "First", ["a", "b"]),
                Question::single_choice(QuestionId::new(2), "Second", ["a", "b"]),
            ],
            10,
        )
        .with_proctoring(proctored)
    }

    fn fixture(quiz: QuizDefinition) -> Fixture {
        let quiz_data = InMemoryQuizData::new();
        let mut key = AnswerKey::new();
        key.insert(QuestionId::new(1), AnswerValue::Choice(0));
        key.insert(QuestionId::new(2), AnswerValue::Choice(1));
        quiz_data.insert_quiz(quiz.clone(), key).unwrap();

        let store = Arc::new(InMemoryFallbackStore::new());
        let host = Arc::new(SimulatedHost::new());
        let env = SessionEnv {
            host: host.clone(),
            quiz_data: Arc::new(quiz_data.clone()),
            fallback: store.clone(),
            settings: SessionSettings::default(),
            clock: fixed_clock(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        Fixture {
            controller: SessionController::new(Arc::new(quiz), StudentId::new(3), env, tx),
            inbox: rx,
            quiz_data,
            store,
            host,
        }
    }

    /// Feed inbox events back into the controller until the submission settles.
    async fn settle(f: &mut Fixture) {
        while !f.controller.submission().is_finished() {
            let event = f.inbox.recv().await.expect("inbox open");
            f.controller.handle(event);
        }
    }

    fn key() -> FallbackKey {
        FallbackKey::new(QuizId::new(7), StudentId::new(3))
    }

    #[tokio::test]
    async fn answers_before_start_are_ignored() {
        let mut f = fixture(quiz(false));
        f.controller
            .record_answer(QuestionId::new(1), AnswerValue::Choice(0));
        assert!(f.controller.answers().is_empty());

        f.controller.start();
        f.controller
            .record_answer(QuestionId::new(1), AnswerValue::Choice(0));
        f.controller
            .record_answer(QuestionId::new(1), AnswerValue::Choice(1));
        assert_eq!(
            f.controller.answers().get(QuestionId::new(1)),
            Some(&AnswerValue::Choice(1))
        );
    }

    #[tokio::test]
    async fn incomplete_submit_is_rejected_without_side_effects() {
        let mut f = fixture(quiz(false));
        f.controller.start();
        f.controller
            .record_answer(QuestionId::new(1), AnswerValue::Choice(0));

        let err = f.controller.submit_voluntary().unwrap_err();
        assert_eq!(
            err,
            SessionError::Incomplete {
                missing: vec![QuestionId::new(2)]
            }
        );
        assert_eq!(f.controller.state(), SessionState::Active);
        assert_eq!(f.controller.submission(), &SubmissionStatus::NotSubmitted);
    }

    #[tokio::test]
    async fn voluntary_submit_grades_once() {
        let mut f = fixture(quiz(false));
        f.controller.start();
        f.controller
            .record_answer(QuestionId::new(1), AnswerValue::Choice(0));
        f.controller
            .record_answer(QuestionId::new(2), AnswerValue::Choice(1));

        f.controller.submit_voluntary().unwrap();
        assert_eq!(f.controller.state(), SessionState::Submitted);
        assert_eq!(f.controller.submission(), &SubmissionStatus::InFlight);

        let again = f.controller.submit_voluntary().unwrap_err();
        assert_eq!(
            again,
            SessionError::NotActive {
                state: SessionState::Submitted
            }
        );

        settle(&mut f).await;
        let snapshot = f.controller.snapshot();
        let outcome = snapshot.outcome().expect("graded");
        assert_eq!(outcome.score, Some(10));
        assert!(snapshot.read_only);
        assert_eq!(snapshot.redirect_after_secs, Some(5));

        let submissions = f.quiz_data.submissions().unwrap();
        assert_eq!(submissions.len(), 1);
        assert!(!submissions[0].violated);
    }

    #[tokio::test]
    async fn first_violation_latches_and_later_ones_are_only_logged() {
        let mut f = fixture(quiz(true));
        f.controller.start();
        f.controller
            .record_answer(QuestionId::new(1), AnswerValue::Choice(1));

        f.controller.on_violation(ViolationKind::TabHidden);
        assert_eq!(f.controller.state(), SessionState::Suspended);
        f.controller.on_violation(ViolationKind::FocusLost);
        f.controller
            .record_answer(QuestionId::new(2), AnswerValue::Choice(1));

        settle(&mut f).await;
        assert_eq!(f.controller.state(), SessionState::Submitted);
        assert_eq!(f.controller.violations().len(), 2);
        assert_eq!(f.controller.answers().len(), 1);

        let submissions = f.quiz_data.submissions().unwrap();
        assert_eq!(submissions.len(), 1);
        assert!(submissions[0].violated);
        assert_eq!(submissions[0].answers.len(), 1);

        let snapshot = f.controller.snapshot();
        assert_eq!(snapshot.last_violation, Some(ViolationKind::FocusLost));
        assert_eq!(snapshot.redirect_after_secs, Some(5));
        assert!(f.host.display_releases() >= 1);
    }

    #[tokio::test]
    async fn violation_before_start_is_ignored() {
        let mut f = fixture(quiz(true));
        f.controller.on_violation(ViolationKind::FullscreenExit);
        assert_eq!(f.controller.state(), SessionState::NotStarted);
        assert!(f.controller.violations().is_empty());
    }

    #[tokio::test]
    async fn failed_delivery_keeps_fallback_with_late_violations() {
        let mut f = fixture(quiz(false));
        f.quiz_data.reject_submissions(true);
        f.controller.start();
        f.controller
            .record_answer(QuestionId::new(1), AnswerValue::Choice(1));
        f.controller.on_violation(ViolationKind::FullscreenExit);
        f.controller.on_violation(ViolationKind::FocusLost);

        settle(&mut f).await;
        assert!(matches!(
            f.controller.submission(),
            SubmissionStatus::SavedLocally { persisted: true, .. }
        ));

        // The annotate task runs on its own; give it a turn.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        let record = f.store.get(key()).await.unwrap().expect("fallback kept");
        assert_eq!(record.answers, f.controller.answers().snapshot());
        let kinds: Vec<_> = record.violations.iter().map(ViolationRecord::kind).collect();
        assert_eq!(
            kinds,
            vec![ViolationKind::FullscreenExit, ViolationKind::FocusLost]
        );
        assert!(f.quiz_data.submissions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ticks_count_down_only_while_active() {
        let mut f = fixture(quiz(false).with_time_limit(1));
        f.controller.on_tick();
        assert_eq!(f.controller.snapshot().remaining_secs, None);

        f.controller.start();
        for _ in 0..59 {
            f.controller.on_tick();
        }
        assert_eq!(f.controller.snapshot().remaining_secs, Some(1));
        assert_eq!(f.controller.state(), SessionState::Active);

        f.controller.on_tick();
        assert_eq!(f.controller.state(), SessionState::Suspended);
        assert_eq!(
            f.controller.violations().last().map(ViolationRecord::kind),
            Some(ViolationKind::TimeExpired)
        );

        f.controller.on_tick();
        assert_eq!(f.controller.violations().len(), 1);
    }

    #[tokio::test]
    async fn sessions_sharing_an_env_each_submit_once() {
        let f = fixture(quiz(false));
        let env = SessionEnv {
            host: f.host.clone(),
            quiz_data: Arc::new(f.quiz_data.clone()),
            fallback: f.store.clone(),
            settings: SessionSettings::default(),
            clock: fixed_clock(),
        };

        let mut finished = Vec::new();
        for student in [3, 4] {
            let (tx, mut rx) = mpsc::unbounded_channel();
            let mut controller = SessionController::new(
                Arc::new(quiz(false)),
                StudentId::new(student),
                env.clone(),
                tx,
            );
            controller.start();
            controller.on_violation(ViolationKind::TabHidden);
            while !controller.submission().is_finished() {
                let event = rx.recv().await.expect("inbox open");
                controller.handle(event);
            }
            finished.push((controller.state(), controller.submission().clone()));
        }

        for (state, submission) in &finished {
            assert_eq!(*state, SessionState::Submitted);
            assert!(matches!(submission, SubmissionStatus::Graded(_)));
        }
        let submissions = f.quiz_data.submissions().unwrap();
        assert_eq!(submissions.len(), 2);
        assert!(submissions.iter().all(|s| s.violated));
    }

    #[tokio::test]
    async fn display_denial_is_recorded_but_not_fatal() {
        let mut f = fixture(quiz(true));
        f.controller.start();
        f.controller.on_display_status(DisplayStatus::Denied);
        let snapshot = f.controller.snapshot();
        assert_eq!(snapshot.display, DisplayStatus::Denied);
        assert_eq!(snapshot.state, SessionState::Active);
    }
}
