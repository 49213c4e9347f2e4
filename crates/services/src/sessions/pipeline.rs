use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use proctor_core::Clock;
use proctor_core::model::{SessionId, SubmissionOutcome, SubmissionRequest, ViolationRecord};
use serde::Serialize;
use storage::repository::{FallbackKey, FallbackRecord, FallbackStore};
use tracing::{debug, info, warn};

use crate::error::PipelineError;
use crate::quiz_data::QuizDataService;

/// Terminal result of the one submission a session makes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum PipelineResult {
    /// Delivered and graded by the server.
    Graded(SubmissionOutcome),
    /// Delivery failed; `persisted` tells whether the fallback record exists.
    SavedLocally { reason: String, persisted: bool },
}

/// Delivers a session's answers exactly once, writing a local fallback
/// record before the remote attempt.
pub struct SubmissionPipeline {
    quiz_data: Arc<dyn QuizDataService>,
    fallback: Arc<dyn FallbackStore>,
    clock: Clock,
    fired: AtomicBool,
}

impl SubmissionPipeline {
    #[must_use]
    pub fn new(
        quiz_data: Arc<dyn QuizDataService>,
        fallback: Arc<dyn FallbackStore>,
        clock: Clock,
    ) -> Self {
        Self {
            quiz_data,
            fallback,
            clock,
            fired: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Persist the fallback record, then attempt delivery.
    ///
    /// Delivery failures are folded into `PipelineResult::SavedLocally`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::AlreadySubmitted` on every call after the first.
    pub async fn submit(
        &self,
        session_id: SessionId,
        request: SubmissionRequest,
        violations: Vec<ViolationRecord>,
    ) -> Result<PipelineResult, PipelineError> {
        if self.fired.swap(true, Ordering::SeqCst) {
            return Err(PipelineError::AlreadySubmitted);
        }

        let record = FallbackRecord {
            session_id,
            quiz_id: request.quiz_id,
            student_id: request.student_id,
            answers: request.answers.clone(),
            violations,
            violated: request.violated,
            saved_at: self.clock.now(),
        };
        let persisted = match self.fallback.save(&record).await {
            Ok(()) => {
                debug!(%session_id, "fallback record written");
                true
            }
            Err(err) => {
                warn!(%session_id, error = %err, "fallback write failed, delivering anyway");
                false
            }
        };

        match self.quiz_data.submit(&request).await {
            Ok(outcome) => {
                info!(
                    %session_id,
                    attempt_id = %outcome.attempt_id,
                    violated = request.violated,
                    "submission delivered"
                );
                if persisted {
                    if let Err(err) = self.fallback.clear(record.key()).await {
                        warn!(%session_id, error = %err, "could not clear fallback record");
                    }
                }
                Ok(PipelineResult::Graded(outcome))
            }
            Err(err) => {
                warn!(%session_id, error = %err, persisted, "submission delivery failed");
                let reason = if persisted {
                    format!("delivery failed: {err}")
                } else {
                    format!("delivery failed and local save failed: {err}")
                };
                Ok(PipelineResult::SavedLocally { reason, persisted })
            }
        }
    }

    /// Attach violations recorded after the submission to the fallback record.
    ///
    /// Never contacts the quiz-data service.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Storage` if no record exists or the write fails.
    pub async fn annotate(
        &self,
        key: FallbackKey,
        late: &[ViolationRecord],
    ) -> Result<(), PipelineError> {
        self.fallback.append_violations(key, late).await?;
        Ok(())
    }
}
