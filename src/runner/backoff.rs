//! Delay between reconnection attempts.

use std::time::Duration;

/// Back-off timing for [`SessionRunner`](crate::SessionRunner) reconnects.
///
/// The first wait after a session ends is `initial_delay`. Each further
/// failed connection attempt doubles the wait, capped at `max_delay`. A
/// session that connects resets the sequence.
///
/// # Default Values
/// - `initial_delay`: 10 seconds
/// - `max_delay`: 10 seconds
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReconnectBackoff {
    /// Wait after a session ends or the first attempt fails.
    pub initial_delay: Duration,
    /// Upper bound once failures have doubled the wait.
    pub max_delay: Duration,
}

impl Default for ReconnectBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ReconnectBackoff {
    /// Clamp delays to at least one millisecond and ensure
    /// `initial_delay <= max_delay`.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use chatnet::ReconnectBackoff;
    ///
    /// let backoff = ReconnectBackoff {
    ///     initial_delay: Duration::from_secs(30),
    ///     max_delay: Duration::ZERO,
    /// }
    /// .normalized();
    /// assert_eq!(backoff.initial_delay, Duration::from_millis(1));
    /// assert_eq!(backoff.max_delay, Duration::from_secs(30));
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

    /// Wait before attempt `failures + 1`, where `failures` counts the
    /// consecutive failed attempts so far.
    #[must_use]
    pub fn delay(&self, failures: u32) -> Duration {
        let factor = 1_u32.checked_shl(failures).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}
