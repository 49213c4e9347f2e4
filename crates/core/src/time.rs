use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, Utc};

/// Time source for session timestamps.
///
/// `Manual` clocks share their instant between clones, so a test can hold one
/// copy and advance the time seen by a controller that owns another.
#[derive(Debug, Clone, Default)]
pub enum Clock {
    #[default]
    System,
    Fixed(DateTime<Utc>),
    Manual(Arc<AtomicI64>),
}

impl Clock {
    #[must_use]
    pub fn system() -> Self {
        Self::System
    }

    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns a shared, manually advanced clock starting at `start`.
    #[must_use]
    pub fn manual(start: DateTime<Utc>) -> Self {
        Self::Manual(Arc::new(AtomicI64::new(start.timestamp_millis())))
    }

    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
            Clock::Manual(millis) => {
                DateTime::<Utc>::from_timestamp_millis(millis.load(Ordering::SeqCst))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC)
            }
        }
    }

    /// Moves a manual or fixed clock forward. No effect on `Clock::System`.
    pub fn advance(&mut self, delta: Duration) {
        match self {
            Clock::System => {}
            Clock::Fixed(t) => *t += delta,
            Clock::Manual(millis) => {
                millis.fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
            }
        }
    }

    #[must_use]
    pub fn is_system(&self) -> bool {
        matches!(self, Clock::System)
    }
}

/// Deterministic timestamp for tests (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0).unwrap_or(DateTime::UNIX_EPOCH)
}

#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let mut driver = Clock::manual(fixed_now());
        let observer = driver.clone();

        driver.advance(Duration::seconds(90));

        assert_eq!(observer.now(), fixed_now() + Duration::seconds(90));
    }

    #[test]
    fn fixed_clock_advances_only_its_own_copy() {
        let mut a = fixed_clock();
        let b = a.clone();
        a.advance(Duration::seconds(1));
        assert_eq!(b.now(), fixed_now());
        assert_eq!(a.now(), fixed_now() + Duration::seconds(1));
    }
}
