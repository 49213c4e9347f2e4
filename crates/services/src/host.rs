//! Seam between the session engine and the environment it runs in.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::broadcast;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum HostError {
    #[error("exclusive display request was refused")]
    Refused,
    #[error("exclusive display is not supported")]
    Unsupported,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Notification pushed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostSignal {
    VisibilityChanged(Visibility),
    FocusLost,
    FocusGained,
}

/// Host capabilities the monitors rely on.
///
/// `release_exclusive_display` runs during synchronous teardown, so none of
/// these methods may block.
pub trait HostEnvironment: Send + Sync {
    /// Ask the host for exclusive full-display presentation.
    ///
    /// # Errors
    ///
    /// Returns `HostError` if the host refuses or cannot provide the mode.
    fn request_exclusive_display(&self) -> Result<(), HostError>;

    fn release_exclusive_display(&self);

    fn is_exclusive_display(&self) -> bool;

    /// Receiver for visibility and focus notifications sent after this call.
    fn subscribe(&self) -> broadcast::Receiver<HostSignal>;
}

const SIGNAL_CAPACITY: usize = 64;

/// Scriptable host used by tests and the `simulate` command.
#[derive(Debug)]
pub struct SimulatedHost {
    exclusive: AtomicBool,
    refuse_display: AtomicBool,
    requests: AtomicUsize,
    releases: AtomicUsize,
    signals: broadcast::Sender<HostSignal>,
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHost {
    #[must_use]
    pub fn new() -> Self {
        let (signals, _) = broadcast::channel(SIGNAL_CAPACITY);
        Self {
            exclusive: AtomicBool::new(false),
            refuse_display: AtomicBool::new(false),
            requests: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            signals,
        }
    }

    /// A host that turns down every exclusive display request.
    #[must_use]
    pub fn refusing_display() -> Self {
        let host = Self::new();
        host.refuse_display.store(true, Ordering::SeqCst);
        host
    }

    /// The student leaves exclusive display mode (e.g. presses Esc).
    pub fn exit_exclusive_display(&self) {
        self.exclusive.store(false, Ordering::SeqCst);
    }

    pub fn hide_tab(&self) {
        self.emit(HostSignal::VisibilityChanged(Visibility::Hidden));
    }

    pub fn show_tab(&self) {
        self.emit(HostSignal::VisibilityChanged(Visibility::Visible));
    }

    pub fn blur(&self) {
        self.emit(HostSignal::FocusLost);
    }

    pub fn focus(&self) {
        self.emit(HostSignal::FocusGained);
    }

    #[must_use]
    pub fn display_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn display_releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    fn emit(&self, signal: HostSignal) {
        // No subscribers just means nothing is armed.
        let _ = self.signals.send(signal);
    }
}

impl HostEnvironment for SimulatedHost {
    fn request_exclusive_display(&self) -> Result<(), HostError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        if self.refuse_display.load(Ordering::SeqCst) {
            return Err(HostError::Refused);
        }
        self.exclusive.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn release_exclusive_display(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
        self.exclusive.store(false, Ordering::SeqCst);
    }

    fn is_exclusive_display(&self) -> bool {
        self.exclusive.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> broadcast::Receiver<HostSignal> {
        self.signals.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusing_host_never_enters_exclusive_mode() {
        let host = SimulatedHost::refusing_display();
        assert_eq!(host.request_exclusive_display(), Err(HostError::Refused));
        assert!(!host.is_exclusive_display());
        assert_eq!(host.display_requests(), 1);
    }

    #[tokio::test]
    async fn subscribers_receive_signals_sent_after_subscribing() {
        let host = SimulatedHost::new();
        host.blur();
        let mut rx = host.subscribe();
        host.hide_tab();
        assert_eq!(
            rx.recv().await.unwrap(),
            HostSignal::VisibilityChanged(Visibility::Hidden)
        );
    }
}
