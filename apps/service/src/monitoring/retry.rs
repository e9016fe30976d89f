use std::time::Duration;

/// Attempt ceiling and exponential backoff for the retrying prober.
///
/// The delay after attempt `n` (zero based) is `initial_backoff << n`, so with the
/// defaults a target that never answers is tried at 0s, 1s, 3s, 7s and 15s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, initial_backoff: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_backoff: Duration) -> Self {
        Self { max_attempts: max_attempts.max(1), initial_backoff }
    }

    /// A policy that makes exactly one attempt.
    pub fn single() -> Self {
        Self { max_attempts: 1, initial_backoff: Duration::ZERO }
    }

    pub fn is_retrying(&self) -> bool {
        self.max_attempts > 1
    }

    /// Delay to wait after the failed attempt `attempt` (zero based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(factor)
    }

    /// Delays slept between attempts, in order. One shorter than the attempt count.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.max_attempts.saturating_sub(1)).map(|n| self.backoff(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_from_initial() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(8));
    }

    #[test]
    fn test_delays_strictly_double_and_respect_ceiling() {
        let policy = RetryPolicy::new(5, Duration::from_millis(250));
        let delays: Vec<_> = policy.delays().collect();
        assert_eq!(delays.len(), 4);
        assert_eq!(delays[0], Duration::from_millis(250));
        for pair in delays.windows(2) {
            assert_eq!(pair[1], pair[0] * 2);
        }
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy::new(64, Duration::from_secs(1));
        assert!(policy.backoff(40) >= policy.backoff(31));
    }

    #[test]
    fn test_zero_attempts_clamped_to_one() {
        let policy = RetryPolicy::new(0, Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.is_retrying());
        assert_eq!(policy.delays().count(), 0);
    }
}
