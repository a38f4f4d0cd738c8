use std::time::Duration;

/// Bounded exponential backoff.
///
/// After failed attempt `n` the controller waits
/// `initial_backoff * backoff_base^(n-1)` before attempt `n + 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub backoff_base: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(1000),
            backoff_base: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_initial_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn with_backoff_base(mut self, backoff_base: f64) -> Self {
        self.backoff_base = backoff_base;
        self
    }

    /// Delay after the failed attempt numbered `attempt` (1-based).
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let factor = self.backoff_base.max(1.0).powi(exponent);
        let millis = self.initial_backoff.as_millis() as f64 * factor;
        if millis.is_finite() {
            Duration::from_millis(millis.min(u64::MAX as f64) as u64)
        } else {
            Duration::from_millis(u64::MAX)
        }
    }
}

/// Status polling schedule for the synchronous wrapper.
///
/// Poll `k` (0-based) waits `min(initial_interval + k * step, max_interval)`.
/// After `max_polls` waits without a terminal state the wait fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub step: Duration,
    pub max_interval: Duration,
    pub max_polls: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(250),
            step: Duration::from_millis(250),
            max_interval: Duration::from_millis(2000),
            max_polls: 60,
        }
    }
}

impl PollPolicy {
    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_step(mut self, step: Duration) -> Self {
        self.step = step;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn interval_for(&self, poll: u32) -> Duration {
        let grown = self.initial_interval.saturating_add(self.step.saturating_mul(poll));
        grown.min(self.max_interval)
    }

    /// Longest a wait can last before timing out.
    pub fn total_budget(&self) -> Duration {
        (0..self.max_polls).fold(Duration::ZERO, |acc, poll| {
            acc.saturating_add(self.interval_for(poll))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(4000));
    }

    #[test]
    fn test_backoff_base_one_is_constant() {
        let policy = RetryPolicy::default()
            .with_initial_backoff(Duration::from_millis(5))
            .with_backoff_base(1.0);
        assert_eq!(policy.backoff_after(1), policy.backoff_after(7));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::default().with_backoff_base(10.0);
        assert!(policy.backoff_after(400) >= Duration::from_secs(1_000_000));
    }

    #[test]
    fn test_poll_schedule_grows_linearly_and_caps() {
        let policy = PollPolicy::default();
        assert_eq!(policy.interval_for(0), Duration::from_millis(250));
        assert_eq!(policy.interval_for(1), Duration::from_millis(500));
        assert_eq!(policy.interval_for(6), Duration::from_millis(1750));
        assert_eq!(policy.interval_for(7), Duration::from_millis(2000));
        assert_eq!(policy.interval_for(59), Duration::from_millis(2000));
    }

    #[test]
    fn test_poll_budget_is_finite() {
        let policy = PollPolicy::default();
        // 250 + 500 + ... + 2000 for the first eight polls, then 2000 each
        let expected = Duration::from_millis(9000 + 52 * 2000);
        assert_eq!(policy.total_budget(), expected);
    }
}
