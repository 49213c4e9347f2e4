use std::fmt;

use serde::{Deserialize, Serialize};

/// Lifecycle of a single attempt.
///
/// `NotStarted → Active → (Suspended →) Submitted`. `Submitted` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    #[default]
    NotStarted,
    Active,
    Suspended,
    Submitted,
}

impl SessionState {
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }

    /// The submission latch has fired once the session is past `Active`.
    #[must_use]
    pub fn has_latched(self) -> bool {
        matches!(self, Self::Suspended | Self::Submitted)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not-started",
            Self::Active => "active",
            Self::Suspended => "suspended",
            Self::Submitted => "submitted",
        };
        f.write_str(label)
    }
}

/// Exclusive-display indicator shown to the student. Never fatal by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DisplayStatus {
    #[default]
    NotRequested,
    Exclusive,
    Denied,
    Lost,
}
