//! Write-time timestamps.

use chrono::{DateTime, Duration, Utc};
use std::sync::Mutex;

/// Hands out strictly increasing UTC timestamps.
///
/// When the wall clock has not moved past the previous value (or moved
/// backwards), the previous value plus one microsecond is returned instead.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.next_after(Utc::now())
    }

    fn next_after(&self, wall: DateTime<Utc>) -> DateTime<Utc> {
        let mut last = self.last.lock().unwrap_or_else(|poisoned| poisoned.into_inner());

        let next = match *last {
            Some(previous) if wall <= previous => previous + Duration::microseconds(1),
            _ => wall,
        };

        *last = Some(next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_is_strictly_increasing() {
        let clock = MonotonicClock::new();
        let mut previous = clock.now();
        for _ in 0..10_000 {
            let next = clock.now();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_wall_clock_regression_is_bumped() {
        let clock = MonotonicClock::new();
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        assert_eq!(clock.next_after(t), t);
        assert_eq!(clock.next_after(t), t + Duration::microseconds(1));
        assert_eq!(
            clock.next_after(t - Duration::seconds(5)),
            t + Duration::microseconds(2)
        );
        let later = t + Duration::seconds(1);
        assert_eq!(clock.next_after(later), later);
    }
}
