use std::ops::Add;
use std::{
    sync::RwLock,
    time::{Duration, SystemTime},
};

use crate::util::to_millis;

/// Source of wall-clock time.
///
/// Components that weight values by elapsed time take a `Clock` so that tests
/// can drive time explicitly with [`MockClock`].
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;

    /// Current time in milliseconds since the UNIX epoch.
    fn now_ms(&self) -> i64 {
        to_millis(self.now())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

#[derive(Debug)]
pub struct MockClock {
    now: RwLock<SystemTime>,
}

impl Clock for MockClock {
    fn now(&self) -> SystemTime {
        *self.now.read().expect("lock poisoned")
    }
}

impl MockClock {
    pub fn with_time(time: SystemTime) -> Self {
        Self {
            now: RwLock::new(time),
        }
    }

    /// Creates a clock frozen at `ms` milliseconds after the UNIX epoch.
    pub fn with_millis(ms: u64) -> Self {
        Self::with_time(SystemTime::UNIX_EPOCH + Duration::from_millis(ms))
    }

    pub fn new() -> Self {
        Self::with_time(SystemTime::now())
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write().expect("lock poisoned");
        *now = now.add(duration);
    }

    pub fn set_time(&self, time: SystemTime) {
        *self.now.write().expect("lock poisoned") = time;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_advance_mock_clock() {
        // given
        let clock = MockClock::with_millis(1_000);

        // when
        clock.advance(Duration::from_millis(2_500));

        // then
        assert_eq!(clock.now_ms(), 3_500);
    }

    #[test]
    fn should_set_mock_clock_time() {
        // given
        let clock = MockClock::with_millis(1_000);

        // when
        clock.set_time(SystemTime::UNIX_EPOCH + Duration::from_secs(60));

        // then
        assert_eq!(clock.now_ms(), 60_000);
    }

    #[test]
    fn should_report_system_time_after_epoch() {
        assert!(SystemClock.now_ms() > 0);
    }
}
