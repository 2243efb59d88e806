//! Retransmission timing for find requests.

use std::time::Duration;

use rand::Rng;

/// Randomized delay window preceding the first find transmission.
///
/// The window runs from `delay_max_ms` up to `delay_min_ms`: the
/// configured *minimum* bounds the drawn delay from above, and
/// configuration validation rejects `min < max`. The naming is
/// preserved from the governing configuration surface.
#[derive(Debug, Clone)]
pub(crate) struct InitialWaitSchedule {
    delay_min_ms: u64,
    delay_max_ms: u64,
}

impl InitialWaitSchedule {
    /// Create a schedule from validated delay bounds (`min >= max`).
    pub(crate) fn new(delay_min_ms: u64, delay_max_ms: u64) -> Self {
        Self {
            delay_min_ms,
            delay_max_ms,
        }
    }

    /// Draw one delay uniformly at random from the window.
    pub(crate) fn random_delay(&self) -> Duration {
        let millis = rand::thread_rng().gen_range(self.delay_max_ms..=self.delay_min_ms);
        Duration::from_millis(millis)
    }
}

/// Exponential backoff schedule for repeated find transmissions.
///
/// The delay before the `n`-th transmission (0-based) is
/// `base * 2^n`; after `max_repetitions` transmissions the schedule is
/// exhausted and no further delay is produced.
#[derive(Debug, Clone)]
pub(crate) struct RepetitionSchedule {
    base_delay_ms: u64,
    max_repetitions: u32,
    counter: u32,
}

impl RepetitionSchedule {
    pub(crate) fn new(base_delay_ms: u64, max_repetitions: u32) -> Self {
        Self {
            base_delay_ms,
            max_repetitions,
            counter: 0,
        }
    }

    /// Reset the counter on (re-)entry into the repetition phase.
    pub(crate) fn restart(&mut self) {
        self.counter = 0;
    }

    /// Whether another transmission may still be scheduled.
    pub(crate) fn has_budget(&self) -> bool {
        self.counter < self.max_repetitions
    }

    /// Delay before the next transmission.
    pub(crate) fn current_delay(&self) -> Duration {
        let factor = 1u64.checked_shl(self.counter).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    /// Record one transmission; returns `true` when the schedule is now
    /// exhausted.
    pub(crate) fn record_send(&mut self) -> bool {
        self.counter += 1;
        self.counter >= self.max_repetitions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_delay_within_window() {
        let schedule = InitialWaitSchedule::new(100, 10);

        for _ in 0..50 {
            let delay = schedule.random_delay();
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(100));
        }
    }

    #[test]
    fn test_initial_delay_degenerate_window() {
        let schedule = InitialWaitSchedule::new(50, 50);
        assert_eq!(schedule.random_delay(), Duration::from_millis(50));

        let schedule = InitialWaitSchedule::new(0, 0);
        assert_eq!(schedule.random_delay(), Duration::ZERO);
    }

    #[test]
    fn test_repetition_delays_double() {
        let mut schedule = RepetitionSchedule::new(100, 3);

        assert_eq!(schedule.current_delay(), Duration::from_millis(100));
        assert!(!schedule.record_send());
        assert_eq!(schedule.current_delay(), Duration::from_millis(200));
        assert!(!schedule.record_send());
        assert_eq!(schedule.current_delay(), Duration::from_millis(400));
        assert!(schedule.record_send());
    }

    #[test]
    fn test_restart_resets_counter() {
        let mut schedule = RepetitionSchedule::new(100, 2);
        schedule.record_send();
        schedule.record_send();
        assert!(!schedule.has_budget());

        schedule.restart();
        assert!(schedule.has_budget());
        assert_eq!(schedule.current_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_zero_budget_is_exhausted_immediately() {
        let schedule = RepetitionSchedule::new(100, 0);
        assert!(!schedule.has_budget());
    }

    #[test]
    fn test_large_counter_saturates() {
        let mut schedule = RepetitionSchedule::new(u64::MAX / 2, 80);
        for _ in 0..70 {
            schedule.record_send();
        }
        // No overflow; the delay just pins at the maximum.
        assert_eq!(
            schedule.current_delay(),
            Duration::from_millis(u64::MAX)
        );
    }
}
