/// Bounded exponential backoff for failed generation jobs, counted in control ticks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts before a region is marked permanently failed.
    pub max_attempts: u32,
    /// Delay after the first failure.
    pub base_delay: u64,
    /// Upper bound on any delay.
    pub max_delay: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: 1,
            max_delay: 32,
        }
    }
}

impl RetryPolicy {
    /// Ticks to wait after the `attempt`-th consecutive failure (1-based).
    pub fn delay(&self, attempt: u32) -> u64 {
        let doublings = attempt.saturating_sub(1);
        self.base_delay
            .checked_shl(doublings)
            .filter(|&d| d >> doublings == self.base_delay)
            .unwrap_or(u64::MAX)
            .min(self.max_delay)
    }

    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 10,
            base_delay: 2,
            max_delay: 20,
        };
        let delays: Vec<u64> = (1..=6).map(|a| policy.delay(a)).collect();
        assert_eq!(delays, vec![2, 4, 8, 16, 20, 20]);
    }

    /// Huge attempt counts saturate at the cap instead of wrapping.
    #[test]
    fn test_delay_never_overflows() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay(200), policy.max_delay);
        assert_eq!(policy.delay(64), policy.max_delay);
    }

    #[test]
    fn test_exhaustion() {
        let policy = RetryPolicy::default();
        assert!(!policy.is_exhausted(2));
        assert!(policy.is_exhausted(3));
    }
}
