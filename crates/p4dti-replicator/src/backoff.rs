//! Exponential poll-period back-off: doubles on each consecutive poll
//! failure, clamped to a configured ceiling, and resets to the base on
//! the next successful poll.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PollBackoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl PollBackoff {
    pub fn new(base_secs: u64, max_secs: u64) -> Self {
        let base = Duration::from_secs(base_secs.max(1));
        let max = Duration::from_secs(max_secs.max(base_secs.max(1)));
        Self { base, max, current: base }
    }

    /// The period to sleep before the next poll.
    pub fn period(&self) -> Duration {
        self.current
    }

    /// Doubles the current period, clamped to the configured ceiling,
    /// and returns the new value.
    pub fn on_failure(&mut self) -> Duration {
        let doubled = self.current.checked_mul(2).unwrap_or(self.max);
        self.current = doubled.min(self.max);
        self.current
    }

    /// Resets the period to its configured base.
    pub fn on_success(&mut self) {
        self.current = self.base;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_on_each_failure() {
        let mut b = PollBackoff::new(30, 3600);
        assert_eq!(b.on_failure(), Duration::from_secs(60));
        assert_eq!(b.on_failure(), Duration::from_secs(120));
    }

    #[test]
    fn clamps_to_ceiling() {
        let mut b = PollBackoff::new(2000, 3600);
        assert_eq!(b.on_failure(), Duration::from_secs(3600));
        assert_eq!(b.on_failure(), Duration::from_secs(3600));
    }

    #[test]
    fn success_resets_to_base() {
        let mut b = PollBackoff::new(30, 3600);
        b.on_failure();
        b.on_failure();
        b.on_success();
        assert_eq!(b.period(), Duration::from_secs(30));
    }
}
