use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

use super::events::SessionEvent;

/// Seconds left on a timed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    remaining: u64,
    expired: bool,
}

impl Countdown {
    #[must_use]
    pub fn new(total_secs: u64) -> Self {
        Self {
            remaining: total_secs,
            expired: total_secs == 0,
        }
    }

    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Remove one second. Returns `true` exactly once, on the tick that
    /// reaches zero.
    pub fn tick(&mut self) -> bool {
        if self.expired {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(1);
        if self.remaining == 0 {
            self.expired = true;
            return true;
        }
        false
    }
}

/// Spawn the ticker that feeds `SessionEvent::Tick` into the inbox.
///
/// The first tick arrives one `period` after arming. The task ends when the
/// inbox closes or the handle is aborted.
pub(crate) fn spawn_ticker(
    inbox: UnboundedSender<SessionEvent>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            if inbox.send(SessionEvent::Tick).is_err() {
                return;
            }
        }
    })
}
