mod answers;
mod controller;
mod events;
mod monitor;
mod pipeline;
mod runner;
mod snapshot;
mod timer;
mod violations;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use answers::AnswerStore;
pub use controller::{SessionController, SessionEnv};
pub use events::SessionEvent;
pub use pipeline::{PipelineResult, SubmissionPipeline};
pub use runner::{SessionHandle, SessionRunner, spawn_session};
pub use snapshot::{SessionSnapshot, SubmissionStatus};
pub use timer::Countdown;
pub use violations::ViolationLog;
pub use workflow::ProctorService;
