use std::thread;
use std::time::{Duration, Instant};

/// Time source for the polling loop.
///
/// - now(): monotonic Instant
/// - sleep(): block between polls (test implementations only advance time)
/// - elapsed_since(): saturating elapsed time from an earlier Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    fn elapsed_since(&self, start: Instant) -> Duration {
        self.now().saturating_duration_since(start)
    }
}

/// Real-time clock backed by `std::time::Instant` and `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic clock: `sleep(d)` advances virtual time by `d` and
    /// returns immediately. Clones share the same timeline.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        inner: Arc<Mutex<Timeline>>,
    }

    #[derive(Debug, Default)]
    struct Timeline {
        offset: Duration,
        sleeps: usize,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                inner: Arc::new(Mutex::new(Timeline::default())),
            }
        }

        /// Advance virtual time without counting a sleep.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut t) = self.inner.lock() {
                t.offset = t.offset.saturating_add(d);
            }
        }

        /// Total virtual time elapsed since construction.
        pub fn elapsed(&self) -> Duration {
            self.inner.lock().map(|t| t.offset).unwrap_or_default()
        }

        /// Number of `sleep` calls observed so far.
        pub fn sleeps(&self) -> usize {
            self.inner.lock().map(|t| t.sleeps).unwrap_or(0)
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            if let Ok(mut t) = self.inner.lock() {
                t.offset = t.offset.saturating_add(d);
                t.sleeps += 1;
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn sleep_advances_shared_timeline() {
            let clock = TestClock::new();
            let other = clock.clone();
            let t0 = clock.now();
            other.sleep(Duration::from_millis(250));
            clock.advance(Duration::from_millis(50));
            assert_eq!(clock.elapsed_since(t0), Duration::from_millis(300));
            assert_eq!(clock.sleeps(), 1);
        }
    }
}
