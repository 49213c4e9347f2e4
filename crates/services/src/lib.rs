#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod host;
pub mod quiz_data;
pub mod sessions;

pub use proctor_core::Clock;
pub use sessions as session;

pub use config::{GradingConfig, SessionSettings};
pub use error::{ConfigError, LoadError, PipelineError, QuizDataError, SessionError};
pub use host::{HostEnvironment, SimulatedHost};
pub use quiz_data::{HttpQuizDataService, InMemoryQuizData, QuizDataService};

pub use sessions::{
    PipelineResult, ProctorService, SessionHandle, SessionSnapshot, SubmissionPipeline,
    SubmissionStatus,
};
