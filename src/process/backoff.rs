//! Linear restart backoff.
//!
//! Every attempt waits the current delay and then raises it by a fixed
//! increment, up to a ceiling. A clean exit, or a run that lasted at least
//! `reset_after`, puts the delay back at the floor.

use std::time::Duration;

use crate::config::SupervisorConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
    min: Duration,
    max: Duration,
    increment: Duration,
    reset_after: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(&SupervisorConfig::default())
    }
}

impl Backoff {
    pub fn new(cfg: &SupervisorConfig) -> Self {
        let max = cfg.max_delay();
        let min = cfg.min_delay().min(max);
        Self {
            current: min,
            min,
            max,
            increment: cfg.increment(),
            reset_after: cfg.reset_after(),
        }
    }

    /// The delay the next attempt will wait.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Take the delay for this attempt and escalate the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = self.current.saturating_add(self.increment).min(self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.min;
    }

    /// Account for a finished run. Returns `true` when the delay was reset.
    pub fn record_exit(&mut self, success: bool, ran_for: Duration) -> bool {
        if success || ran_for >= self.reset_after {
            self.reset();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_default_sequence() {
        let mut backoff = Backoff::default();
        assert_eq!(backoff.next_delay(), ms(1_000));
        assert_eq!(backoff.next_delay(), ms(1_500));
        assert_eq!(backoff.next_delay(), ms(2_000));
        assert_eq!(backoff.current(), ms(2_500));
    }

    #[test]
    fn test_capped_at_max() {
        let mut backoff = Backoff::default();
        for _ in 0..200 {
            assert!(backoff.next_delay() <= ms(30_000));
        }
        assert_eq!(backoff.next_delay(), ms(30_000));
    }

    #[test]
    fn test_clean_exit_resets() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        backoff.next_delay();
        assert!(backoff.record_exit(true, ms(10)));
        assert_eq!(backoff.next_delay(), ms(1_000));
    }

    #[test]
    fn test_failure_keeps_escalation() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        assert!(!backoff.record_exit(false, ms(500)));
        assert_eq!(backoff.next_delay(), ms(1_500));
    }

    #[test]
    fn test_long_failing_run_resets() {
        let mut backoff = Backoff::default();
        for _ in 0..10 {
            backoff.next_delay();
        }
        assert!(backoff.record_exit(false, Duration::from_secs(120)));
        assert_eq!(backoff.current(), ms(1_000));
    }

    #[test]
    fn test_reset_boundary_inclusive() {
        let mut backoff = Backoff::default();
        backoff.next_delay();
        assert!(backoff.record_exit(false, Duration::from_secs(60)));
    }

    #[test]
    fn test_min_above_max_clamped() {
        let cfg = SupervisorConfig {
            min_delay_ms: 5_000,
            max_delay_ms: 2_000,
            ..SupervisorConfig::default()
        };
        let mut backoff = Backoff::new(&cfg);
        assert_eq!(backoff.next_delay(), ms(2_000));
        assert_eq!(backoff.next_delay(), ms(2_000));
    }
}
