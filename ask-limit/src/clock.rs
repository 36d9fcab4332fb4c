use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;

/// Monotonic wall-clock time.
///
/// The wall clock is read once, at construction. After that, time advances by
/// the monotonic TSC-backed `quanta` clock, so `now()` never goes backwards even
/// if the system clock is adjusted.
#[derive(Debug, Clone)]
pub struct Clock {
    clock: quanta::Clock,
    /// The TSC tick that corresponds to `epoch`.
    anchor: quanta::Instant,
    epoch: DateTime<Utc>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self::with_clock(quanta::Clock::new(), Utc::now())
    }

    /// Builds a clock from an explicit `quanta` clock and starting wall time.
    ///
    /// Pass `quanta::Clock::mock()` to drive time by hand in tests.
    pub fn with_clock(clock: quanta::Clock, epoch: DateTime<Utc>) -> Self {
        let anchor = clock.now();
        Self {
            clock,
            anchor,
            epoch,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        let elapsed = self.clock.now().duration_since(self.anchor);
        TimeDelta::from_std(elapsed)
            .ok()
            .and_then(|delta| self.epoch.checked_add_signed(delta))
            .unwrap_or(self.epoch)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::TimeZone;

    use super::*;

    #[test]
    fn mock_clock_advances_from_epoch() {
        let (clock, mock) = quanta::Clock::mock();
        let epoch = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let clock = Clock::with_clock(clock, epoch);

        assert_eq!(clock.now(), epoch);

        mock.increment(Duration::from_secs(86_400));
        assert_eq!(clock.now(), epoch + TimeDelta::days(1));
    }

    #[test]
    fn real_clock_is_non_decreasing() {
        let clock = Clock::new();
        let mut last = clock.now();
        for _ in 0..1_000 {
            let now = clock.now();
            assert!(now >= last);
            last = now;
        }
    }
}
