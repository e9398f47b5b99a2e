use market_pulse_core::MIN_INTERVAL;
use std::time::Duration;

/// Exponential reconnect delay, doubling per failed attempt up to a cap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// A zero `base` is raised to [`MIN_INTERVAL`] so the delay can grow.
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        let base = base.max(MIN_INTERVAL);
        let max = max.max(base);
        Self {
            base,
            max,
            current: base,
        }
    }

    /// Returns the delay for this failure and doubles the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_mul(2).min(self.max);
        delay
    }

    /// Back to the base delay after a successful connect.
    pub fn reset(&mut self) {
        self.current = self.base;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_doubles_then_resets() {
        let mut backoff = Backoff::new(secs(1), secs(60));

        let observed: Vec<Duration> = (0..3).map(|_| backoff.next_delay()).collect();
        assert_eq!(observed, vec![secs(1), secs(2), secs(4)]);

        backoff.reset();
        assert_eq!(backoff.next_delay(), secs(1));
    }

    #[test]
    fn test_capped_at_max() {
        let mut backoff = Backoff::new(secs(1), secs(60));

        let observed: Vec<Duration> = (0..9).map(|_| backoff.next_delay()).collect();

        assert_eq!(observed[5], secs(32));
        assert_eq!(observed[6], secs(60));
        assert_eq!(observed[8], secs(60));
    }

    #[test]
    fn test_zero_base_still_grows() {
        let mut backoff = Backoff::new(Duration::ZERO, secs(60));

        let observed: Vec<Duration> = (0..4).map(|_| backoff.next_delay()).collect();

        assert_eq!(observed[0], MIN_INTERVAL);
        assert!(observed.windows(2).all(|pair| pair[1] == pair[0] * 2));
    }

    #[test]
    fn test_max_below_base() {
        let mut backoff = Backoff::new(secs(5), secs(1));
        assert_eq!(backoff.next_delay(), secs(5));
        assert_eq!(backoff.next_delay(), secs(5));
    }
}
