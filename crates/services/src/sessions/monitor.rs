//! Environment watchers. Each one only reports into the session inbox.

use std::sync::Arc;
use std::time::Duration;

use proctor_core::model::{DisplayStatus, ViolationKind};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

use super::events::SessionEvent;
use super::timer::spawn_ticker;
use crate::host::{HostEnvironment, HostSignal, Visibility};

/// Running producer tasks of one session.
///
/// `stop_all` aborts every task and releases exclusive display before it
/// returns; dropping the set does the same.
#[derive(Default)]
pub(crate) struct Producers {
    tasks: Vec<JoinHandle<()>>,
    display_host: Option<Arc<dyn HostEnvironment>>,
}

impl Producers {
    /// Start the display, visibility and focus watchers.
    pub(crate) fn arm_monitors(
        &mut self,
        host: &Arc<dyn HostEnvironment>,
        inbox: &UnboundedSender<SessionEvent>,
        display_poll: Duration,
    ) {
        // Subscribe before spawning so a signal sent right after arming is seen.
        let visibility = host.subscribe();
        let focus = host.subscribe();

        self.tasks.push(tokio::spawn(watch_display(
            Arc::clone(host),
            inbox.clone(),
            display_poll,
        )));
        self.tasks
            .push(tokio::spawn(watch_visibility(visibility, inbox.clone())));
        self.tasks.push(tokio::spawn(watch_focus(focus, inbox.clone())));
        self.display_host = Some(Arc::clone(host));
    }

    pub(crate) fn arm_timer(&mut self, inbox: &UnboundedSender<SessionEvent>, period: Duration) {
        self.tasks.push(spawn_ticker(inbox.clone(), period));
    }

    pub(crate) fn is_armed(&self) -> bool {
        !self.tasks.is_empty()
    }

    pub(crate) fn stop_all(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(host) = self.display_host.take() {
            host.release_exclusive_display();
        }
    }
}

impl Drop for Producers {
    fn drop(&mut self) {
        self.stop_all();
    }
}

async fn watch_display(
    host: Arc<dyn HostEnvironment>,
    inbox: UnboundedSender<SessionEvent>,
    poll: Duration,
) {
    let status = match host.request_exclusive_display() {
        Ok(()) => DisplayStatus::Exclusive,
        Err(err) => {
            debug!(error = %err, "exclusive display request refused");
            DisplayStatus::Denied
        }
    };
    if inbox.send(SessionEvent::DisplayStatus(status)).is_err() {
        return;
    }

    let mut polls = interval_at(Instant::now() + poll, poll);
    polls.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        polls.tick().await;
        if !host.is_exclusive_display() {
            let _ = inbox.send(SessionEvent::DisplayStatus(DisplayStatus::Lost));
            let _ = inbox.send(SessionEvent::Violation(ViolationKind::FullscreenExit));
            return;
        }
    }
}

async fn watch_visibility(
    mut signals: broadcast::Receiver<HostSignal>,
    inbox: UnboundedSender<SessionEvent>,
) {
    loop {
        match signals.recv().await {
            Ok(HostSignal::VisibilityChanged(Visibility::Hidden)) => {
                if inbox
                    .send(SessionEvent::Violation(ViolationKind::TabHidden))
                    .is_err()
                {
                    return;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "visibility watcher lagged");
            }
            Err(RecvError::Closed) => return,
        }
    }
}

async fn watch_focus(
    mut signals: broadcast::Receiver<HostSignal>,
    inbox: UnboundedSender<SessionEvent>,
) {
    loop {
        match signals.recv().await {
            Ok(HostSignal::FocusLost) => {
                if inbox
                    .send(SessionEvent::Violation(ViolationKind::FocusLost))
                    .is_err()
                {
                    return;
                }
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "focus watcher lagged");
            }
            Err(RecvError::Closed) => return,
        }
    }
}
