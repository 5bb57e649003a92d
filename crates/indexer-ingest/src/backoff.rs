//! Attempt-counted exponential backoff for the subscription worker.

use std::time::Duration;

/// Exponential backoff with a cap: `min(base * 2^attempt, max)`.
///
/// Unlike the transport-level retry policy, the worker state machine
/// needs to observe its own attempt count to decide when the inner
/// retry budget is spent, so the delay schedule is explicit here.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
	base: Duration,
	max: Duration,
	attempt: u32,
}

impl RetryBackoff {
	pub fn new(base: Duration, max: Duration) -> Self {
		Self {
			base,
			max,
			attempt: 0,
		}
	}

	/// Delay for the current attempt; increments the attempt counter.
	pub fn next_delay(&mut self) -> Duration {
		let exp = self.attempt.min(32);
		let delay = self
			.base
			.checked_mul(1u32 << exp.min(31))
			.unwrap_or(self.max)
			.min(self.max);
		self.attempt = self.attempt.saturating_add(1);
		delay
	}

	pub fn attempt(&self) -> u32 {
		self.attempt
	}

	/// Resets the schedule after a successful attempt.
	pub fn reset(&mut self) {
		self.attempt = 0;
	}
}

impl Default for RetryBackoff {
	fn default() -> Self {
		Self::new(Duration::from_secs(1), Duration::from_secs(300))
	}
}
