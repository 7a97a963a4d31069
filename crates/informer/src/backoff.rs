//! # Fibonacci Backoff
//!
//! Provides a Fibonacci-based backoff for watch reconnects and initial-list retries.
//! The delay grows more slowly than exponential backoff, so a flapping API server
//! connection is retried promptly without hammering it.
//!
//! Sequence with a 1s minimum and 30s maximum: 1s, 1s, 2s, 3s, 5s, 8s, 13s, 21s, 30s (max).

use std::time::Duration;

/// Fibonacci backoff calculator
///
/// Each delay is the sum of the previous two, starting from `min` and capped at `max`.
#[derive(Debug, Clone)]
pub struct FibonacciBackoff {
    /// Minimum delay (for reset)
    min: Duration,
    /// Previous delay
    prev: Duration,
    /// Current delay
    current: Duration,
    /// Maximum delay
    max: Duration,
}

impl FibonacciBackoff {
    /// Create a new Fibonacci backoff between `min` and `max`.
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            min,
            prev: Duration::ZERO,
            current: min,
            max: max.max(min),
        }
    }

    /// Get the next delay and advance the sequence
    pub fn next_backoff(&mut self) -> Duration {
        let result = self.current;

        let next = self.prev.saturating_add(self.current);
        self.prev = self.current;
        self.current = std::cmp::min(next, self.max);

        result
    }

    /// Reset the backoff to the initial state after a success
    pub fn reset(&mut self) {
        self.prev = Duration::ZERO;
        self.current = self.min;
    }
}

impl Default for FibonacciBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(30))
    }
}
