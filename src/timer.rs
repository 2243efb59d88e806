//! One-shot countdown timer with cancellation.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Token identifying one armed schedule of a [`CountdownTimer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerToken(u64);

/// A one-shot countdown timer with last-arm-wins semantics.
///
/// Arming schedules a single expiry callback; re-arming before expiry
/// replaces the previous schedule, and cancelling invalidates it. Each
/// arm hands out a [`TimerToken`]; the expiry callback must confirm its
/// token with [`is_current`](Self::is_current) while holding the lock
/// that guards this timer before acting. Arm and cancel happen under
/// that same lock, so a schedule that was cancelled or superseded can
/// never act afterward, no matter how the expiry task is interleaved.
///
/// Must be used within a tokio runtime.
#[derive(Debug, Default)]
pub struct CountdownTimer {
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl CountdownTimer {
    /// Create a disarmed timer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the timer, superseding any pending schedule.
    ///
    /// The callback receives the token of the schedule that fired.
    pub fn arm<F>(&mut self, delay: Duration, on_expiry: F) -> TimerToken
    where
        F: FnOnce(TimerToken) + Send + 'static,
    {
        self.generation += 1;
        let token = TimerToken(self.generation);

        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.task = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_expiry(token);
        }));

        token
    }

    /// Cancel any pending schedule.
    pub fn cancel(&mut self) {
        self.generation += 1;
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Check whether a token still belongs to the latest schedule.
    pub fn is_current(&self, token: TimerToken) -> bool {
        self.generation == token.0
    }
}

impl Drop for CountdownTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
