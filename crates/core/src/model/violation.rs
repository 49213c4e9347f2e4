use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of proctoring breach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ViolationKind {
    FullscreenExit,
    FocusLost,
    TabHidden,
    TimeExpired,
}

impl ViolationKind {
    /// Stable wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FullscreenExit => "fullscreen-exit",
            Self::FocusLost => "focus-lost",
            Self::TabHidden => "tab-hidden",
            Self::TimeExpired => "time-expired",
        }
    }

    /// Sentence shown to the student once the attempt is suspended.
    #[must_use]
    pub fn reason(self) -> &'static str {
        match self {
            Self::FullscreenExit => "You exited fullscreen mode.",
            Self::FocusLost => "The quiz window lost focus.",
            Self::TabHidden => "You switched to another tab or window.",
            Self::TimeExpired => "The time limit was reached.",
        }
    }
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected incident. Immutable once written to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationRecord {
    kind: ViolationKind,
    at: DateTime<Utc>,
}

impl ViolationRecord {
    #[must_use]
    pub fn new(kind: ViolationKind, at: DateTime<Utc>) -> Self {
        Self { kind, at }
    }

    #[must_use]
    pub fn kind(&self) -> ViolationKind {
        self.kind
    }

    #[must_use]
    pub fn at(&self) -> DateTime<Utc> {
        self.at
    }
}
