//! Deterministic clock abstraction for testable time-dependent logic.
//!
//! Expiry and grace-period decisions are pure functions of `(state, now)`,
//! so every call site takes its notion of "now" from a [`Clock`].

use chrono::{DateTime, Utc};

/// Clock trait for deterministic time in tests.
pub trait Clock: Send + Sync {
    /// Get the current UTC time.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock using actual wall time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Controllable clock for deterministic testing.
///
/// Internally shared: clones observe the same instant, so a test can hand
/// one handle to the engine and keep another to advance time mid-scenario.
#[cfg(any(test, feature = "test-seams"))]
#[derive(Debug, Clone)]
pub struct MockClock {
    now: std::sync::Arc<std::sync::Mutex<DateTime<Utc>>>,
}

#[cfg(any(test, feature = "test-seams"))]
impl MockClock {
    /// Create a mock clock frozen at the given time.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: std::sync::Arc::new(std::sync::Mutex::new(now)),
        }
    }

    /// Create a mock clock from an RFC 3339 string.
    pub fn from_rfc3339(s: &str) -> Self {
        Self::new(
            DateTime::parse_from_rfc3339(s)
                .expect("valid RFC 3339")
                .with_timezone(&Utc),
        )
    }

    /// Advance the clock by a duration, visible to every clone.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut guard = self.now.lock().expect("clock lock");
        *guard = *guard + duration;
    }
}

#[cfg(any(test, feature = "test-seams"))]
impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.lock().expect("clock lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn system_clock_returns_time() {
        let clock = SystemClock;
        let now = clock.now_utc();
        assert!(now.year() >= 2025);
    }

    #[test]
    fn mock_clock_is_deterministic() {
        let clock = MockClock::from_rfc3339("2026-03-01T09:30:00Z");
        assert_eq!(clock.now_utc().to_rfc3339(), "2026-03-01T09:30:00+00:00");
        assert_eq!(clock.now_utc().to_rfc3339(), "2026-03-01T09:30:00+00:00");
    }

    #[test]
    fn mock_clock_advances_across_clones() {
        let clock = MockClock::from_rfc3339("2026-03-01T09:30:00Z");
        let handle = clock.clone();
        handle.advance(chrono::Duration::days(2));
        assert_eq!(clock.now_utc().to_rfc3339(), "2026-03-03T09:30:00+00:00");
    }
}
