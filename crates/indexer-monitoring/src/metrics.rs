//! Per-chain service metrics.
//!
//! One `ServiceMetrics` is shared between a chain's workers and the
//! public metrics surface. Counters are atomics; the timestamps and the
//! polling health flag share a single mutex.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug)]
struct TimeState {
	started_at: Instant,
	last_event_time: Option<SystemTime>,
	last_health_check: Option<Instant>,
	last_polling_check: Option<Instant>,
	polling_healthy: bool,
}

/// Counters and liveness timestamps for one chain service.
#[derive(Debug)]
pub struct ServiceMetrics {
	events_processed: AtomicU64,
	events_skipped: AtomicU64,
	processing_errors: AtomicU64,
	reconnections: AtomicU64,
	active_tasks: AtomicU64,
	time: Mutex<TimeState>,
}

impl ServiceMetrics {
	pub fn new() -> Self {
		Self {
			events_processed: AtomicU64::new(0),
			events_skipped: AtomicU64::new(0),
			processing_errors: AtomicU64::new(0),
			reconnections: AtomicU64::new(0),
			active_tasks: AtomicU64::new(0),
			time: Mutex::new(TimeState {
				started_at: Instant::now(),
				last_event_time: None,
				last_health_check: None,
				last_polling_check: None,
				polling_healthy: false,
			}),
		}
	}

	pub fn record_processed(&self) {
		self.events_processed.fetch_add(1, Ordering::Relaxed);
		self.lock_time().last_event_time = Some(SystemTime::now());
	}

	pub fn record_skipped(&self) {
		self.events_skipped.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_processing_error(&self) {
		self.processing_errors.fetch_add(1, Ordering::Relaxed);
	}

	pub fn record_reconnection(&self) {
		self.reconnections.fetch_add(1, Ordering::Relaxed);
	}

	pub fn task_started(&self) {
		self.active_tasks.fetch_add(1, Ordering::SeqCst);
	}

	pub fn task_finished(&self) {
		// saturating: a double decrement must not wrap
		let _ = self
			.active_tasks
			.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
	}

	pub fn active_tasks(&self) -> u64 {
		self.active_tasks.load(Ordering::SeqCst)
	}

	pub fn events_processed(&self) -> u64 {
		self.events_processed.load(Ordering::Relaxed)
	}

	pub fn events_skipped(&self) -> u64 {
		self.events_skipped.load(Ordering::Relaxed)
	}

	pub fn processing_errors(&self) -> u64 {
		self.processing_errors.load(Ordering::Relaxed)
	}

	pub fn reconnections(&self) -> u64 {
		self.reconnections.load(Ordering::Relaxed)
	}

	/// Stamps the worker heartbeat consumed by the health policy.
	pub fn touch_health_check(&self) {
		self.lock_time().last_health_check = Some(Instant::now());
	}

	/// Reports a catchup poll outcome.
	pub fn touch_polling_check(&self, healthy: bool) {
		let mut time = self.lock_time();
		time.last_polling_check = Some(Instant::now());
		time.polling_healthy = healthy;
	}

	pub fn uptime(&self) -> Duration {
		self.lock_time().started_at.elapsed()
	}

	pub fn polling_healthy(&self) -> bool {
		self.lock_time().polling_healthy
	}

	/// Age of the last successful poll report, if any.
	pub fn polling_check_age(&self) -> Option<Duration> {
		self.lock_time().last_polling_check.map(|t| t.elapsed())
	}

	pub fn snapshot(&self) -> MetricsSnapshot {
		let time = self.lock_time();
		MetricsSnapshot {
			events_processed: self.events_processed.load(Ordering::Relaxed),
			events_skipped: self.events_skipped.load(Ordering::Relaxed),
			processing_errors: self.processing_errors.load(Ordering::Relaxed),
			reconnections: self.reconnections.load(Ordering::Relaxed),
			active_tasks: self.active_tasks.load(Ordering::SeqCst),
			subscriptions: 0,
			uptime_seconds: time.started_at.elapsed().as_secs(),
			last_event_unix: time.last_event_time.and_then(|t| {
				t.duration_since(UNIX_EPOCH).ok().map(|d| d.as_secs())
			}),
			polling_healthy: time.polling_healthy,
		}
	}

	fn lock_time(&self) -> std::sync::MutexGuard<'_, TimeState> {
		// a poisoned metrics mutex only ever holds plain values
		self.time.lock().unwrap_or_else(|e| e.into_inner())
	}
}

impl Default for ServiceMetrics {
	fn default() -> Self {
		Self::new()
	}
}

/// Serializable point-in-time view of a service's metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
	pub events_processed: u64,
	pub events_skipped: u64,
	pub processing_errors: u64,
	pub reconnections: u64,
	pub active_tasks: u64,
	/// Live subscription count; zero until the owning service fills it.
	pub subscriptions: u64,
	pub uptime_seconds: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub last_event_unix: Option<u64>,
	pub polling_healthy: bool,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_counters_accumulate() {
		let metrics = ServiceMetrics::new();
		metrics.record_processed();
		metrics.record_processed();
		metrics.record_skipped();
		metrics.record_processing_error();
		metrics.record_reconnection();

		assert_eq!(metrics.events_processed(), 2);
		assert_eq!(metrics.events_skipped(), 1);
		assert_eq!(metrics.processing_errors(), 1);
		assert_eq!(metrics.reconnections(), 1);
	}

	#[test]
	fn test_task_accounting_saturates_at_zero() {
		let metrics = ServiceMetrics::new();
		metrics.task_started();
		metrics.task_started();
		assert_eq!(metrics.active_tasks(), 2);

		metrics.task_finished();
		metrics.task_finished();
		metrics.task_finished();
		assert_eq!(metrics.active_tasks(), 0);
	}

	#[test]
	fn test_polling_state() {
		let metrics = ServiceMetrics::new();
		assert!(!metrics.polling_healthy());
		assert!(metrics.polling_check_age().is_none());

		metrics.touch_polling_check(true);
		assert!(metrics.polling_healthy());
		assert!(metrics.polling_check_age().is_some());

		metrics.touch_polling_check(false);
		assert!(!metrics.polling_healthy());
	}

	#[test]
	fn test_snapshot_reflects_state() {
		let metrics = ServiceMetrics::new();
		metrics.record_processed();
		metrics.touch_polling_check(true);

		let snapshot = metrics.snapshot();
		assert_eq!(snapshot.events_processed, 1);
		assert!(snapshot.polling_healthy);
		assert!(snapshot.last_event_unix.is_some());
	}
}
