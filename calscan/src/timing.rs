//! Counter timing: integration period, sharing factor and read deadlines.
//!
//! Pure arithmetic over values queried from the hardware; nothing here
//! touches the adapter.

use caltools::COUNT_MAX;
use std::time::{Duration, Instant};

/// Margin added to every read deadline
pub const READ_MARGIN: Duration = Duration::from_millis(1);

/// Time for a counter to run from 0 to full scale: COUNT_MAX / f_clk
pub fn integration_period(clock_hz: f64) -> Duration {
    Duration::from_secs_f64(COUNT_MAX as f64 / clock_hz)
}

/// Chips of subtype "2B" share a physical counter resource between 8 chips;
/// any of them present stretches every settling window accordingly.
pub fn counter_sharing<S: AsRef<str>>(subtypes: impl IntoIterator<Item = S>) -> u32 {
    if subtypes.into_iter().any(|s| s.as_ref() == "2B") {
        8
    } else {
        1
    }
}

/// Read pacing for one run: integration period and sharing factor
#[derive(Clone, Copy, Debug)]
pub struct Timing {
    period: Duration,
    sharing: u32,
}

impl Timing {
    pub fn new(clock_hz: f64, sharing: u32) -> Self {
        Timing {
            period: integration_period(clock_hz),
            sharing,
        }
    }

    /// One integration period
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Integration period in seconds, the dark-count rate denominator
    pub fn period_secs(&self) -> f64 {
        self.period.as_secs_f64()
    }

    /// Window after which every shared counter has seen a full period
    pub fn settle(&self) -> Duration {
        self.period * self.sharing
    }

    /// Earliest instant the next counter read observes a window that has
    /// not wrapped relative to the previous read
    pub fn next_deadline(&self, now: Instant) -> Instant {
        now + self.settle() + READ_MARGIN
    }
}

/// Block until `deadline`; if it has already passed, return immediately
pub fn sleep_until(deadline: Instant) {
    let timeout = deadline
        .checked_duration_since(Instant::now())
        .unwrap_or_else(|| Duration::from_secs(0));
    std::thread::sleep(timeout);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integration_period_at_100mhz() {
        // 2^22 / 1e8
        let t = integration_period(1e8);
        assert_eq!(Duration::from_secs_f64(0.04194304), t);
    }

    #[test]
    fn sharing_factor() {
        assert_eq!(1, counter_sharing(Vec::<String>::new()));
        assert_eq!(1, counter_sharing(["2C", "2C"]));
        assert_eq!(8, counter_sharing(["2C", "2B"]));
        assert_eq!(8, counter_sharing(["2B"]));
    }

    #[test]
    fn deadline_without_sharing() {
        let timing = Timing::new(1e8, 1);
        let now = Instant::now();
        let deadline = timing.next_deadline(now);
        assert_eq!(
            Duration::from_secs_f64(0.04194304) + READ_MARGIN,
            deadline - now
        );
    }

    #[test]
    fn deadline_with_sharing() {
        let timing = Timing::new(1e8, 8);
        let now = Instant::now();
        let deadline = timing.next_deadline(now);
        assert_eq!(
            8 * Duration::from_secs_f64(0.04194304) + READ_MARGIN,
            deadline - now
        );
    }

    #[test]
    fn no_negative_sleep() {
        // an expired deadline returns without blocking
        let past = Instant::now() - Duration::from_secs(1);
        let t0 = Instant::now();
        sleep_until(past);
        assert!(t0.elapsed() < Duration::from_millis(50));
    }
}
