//! Retry policy as an explicit finite-state machine.
//!
//! A request gets `max_retries + 1` attempts. After failed attempt `k`
//! (0-indexed) the caller waits `base_delay * 2^k` before the next one:
//! with the defaults that is 300ms, then 600ms, then the failure is final.
//!
//! The policy knows nothing about transports or cancellation; the caller
//! feeds it failures and acts on the returned [`RetryStep`].

use std::time::Duration;

pub const DEFAULT_MAX_RETRIES: u32 = 2;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(300);

/// Upper bound on the backoff exponent.
const MAX_SHIFT: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay to wait after failed attempt `attempt` (0-indexed).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.min(MAX_SHIFT))
    }

    pub fn start(&self) -> RetryState {
        RetryState {
            policy: *self,
            attempt: 0,
        }
    }
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    /// Wait this long, then make the next attempt.
    Backoff(Duration),
    /// No attempts left; the last failure is final.
    Exhausted,
}

/// Progress of one request through its retry budget.
#[derive(Debug, Clone)]
pub struct RetryState {
    policy: RetryPolicy,
    attempt: u32,
}

impl RetryState {
    /// 0-indexed number of the attempt currently being made.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Attempts made so far, counting the current one.
    pub fn attempts_made(&self) -> u32 {
        self.attempt + 1
    }

    /// Record a failure of the current attempt.
    pub fn on_failure(&mut self) -> RetryStep {
        if self.attempt >= self.policy.max_retries {
            return RetryStep::Exhausted;
        }
        let delay = self.policy.delay_after(self.attempt);
        self.attempt += 1;
        RetryStep::Backoff(delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let mut state = RetryPolicy::default().start();
        assert_eq!(state.attempts_made(), 1);
        assert_eq!(state.on_failure(), RetryStep::Backoff(Duration::from_millis(300)));
        assert_eq!(state.on_failure(), RetryStep::Backoff(Duration::from_millis(600)));
        assert_eq!(state.on_failure(), RetryStep::Exhausted);
        assert_eq!(state.attempts_made(), 3);
    }

    #[test]
    fn test_exhausted_is_sticky() {
        let mut state = RetryPolicy::new(0, Duration::from_millis(10)).start();
        assert_eq!(state.on_failure(), RetryStep::Exhausted);
        assert_eq!(state.on_failure(), RetryStep::Exhausted);
        assert_eq!(state.attempts_made(), 1);
    }

    #[test]
    fn test_total_attempts() {
        assert_eq!(RetryPolicy::default().total_attempts(), 3);
        assert_eq!(RetryPolicy::new(5, Duration::ZERO).total_attempts(), 6);
    }

    #[test]
    fn test_delay_doubles() {
        let p = RetryPolicy::new(10, Duration::from_millis(100));
        assert_eq!(p.delay_after(0), Duration::from_millis(100));
        assert_eq!(p.delay_after(1), Duration::from_millis(200));
        assert_eq!(p.delay_after(4), Duration::from_millis(1600));
    }

    #[test]
    fn test_delay_exponent_capped() {
        let p = RetryPolicy::new(100, Duration::from_millis(1));
        assert_eq!(p.delay_after(40), p.delay_after(MAX_SHIFT));
    }
}
