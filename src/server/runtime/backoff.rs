//! Back-off applied between failed `accept` calls.

use std::time::Duration;

/// Exponential back-off timing for the accept loop.
///
/// After a failed `accept()` the loop sleeps for `initial_delay`, doubling
/// the pause on each consecutive failure up to `max_delay`. A successful
/// accept resets the pause to `initial_delay`.
///
/// Defaults: 10 milliseconds initial, 1 second maximum. Both delays are at
/// least 1 millisecond and `initial_delay <= max_delay` once
/// [`normalized`](Self::normalized).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BackoffConfig {
    /// Pause after the first failure.
    pub initial_delay: Duration,
    /// Upper bound on the pause.
    pub max_delay: Duration,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
        }
    }
}

impl BackoffConfig {
    /// Clamp both delays to at least 1 ms and order them.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use parley::server::BackoffConfig;
    ///
    /// let cfg = BackoffConfig {
    ///     initial_delay: Duration::from_millis(5),
    ///     max_delay: Duration::ZERO,
    /// };
    ///
    /// let normalized = cfg.normalized();
    /// assert_eq!(normalized.initial_delay, Duration::from_millis(1));
    /// assert_eq!(normalized.max_delay, Duration::from_millis(5));
    /// ```
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.initial_delay = self.initial_delay.max(Duration::from_millis(1));
        self.max_delay = self.max_delay.max(Duration::from_millis(1));
        if self.initial_delay > self.max_delay {
            std::mem::swap(&mut self.initial_delay, &mut self.max_delay);
        }
        self
    }

    /// The pause following `current` when another failure occurs.
    #[must_use]
    pub fn next_delay(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(10, 20)]
    #[case(600, 1000)]
    #[case(1000, 1000)]
    fn delay_doubles_up_to_cap(#[case] current_ms: u64, #[case] expected_ms: u64) {
        let cfg = BackoffConfig::default();
        assert_eq!(
            cfg.next_delay(Duration::from_millis(current_ms)),
            Duration::from_millis(expected_ms)
        );
    }

    #[test]
    fn normalized_keeps_valid_config() {
        let cfg = BackoffConfig::default();
        assert_eq!(cfg.normalized(), cfg);
    }
}
