//! Shared table of live subscriptions.

use std::collections::HashMap;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Mutex-guarded map of live subscription cancel handles, shared
/// between workers (which register and unregister) and the supervisor
/// (which counts for health and cancels all on shutdown). The lock is
/// never held across an await point.
#[derive(Default)]
pub struct SubscriptionTable {
	inner: Mutex<HashMap<String, CancellationToken>>,
}

impl SubscriptionTable {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn register(&self, name: impl Into<String>, handle: CancellationToken) {
		let name = name.into();
		debug!(subscription = %name, "registering subscription");
		self.lock().insert(name, handle);
	}

	pub fn unregister(&self, name: &str) {
		debug!(subscription = %name, "unregistering subscription");
		self.lock().remove(name);
	}

	pub fn count(&self) -> usize {
		self.lock().len()
	}

	/// Cancels every live subscription; part of the shutdown protocol.
	pub fn cancel_all(&self) {
		let mut inner = self.lock();
		for (name, handle) in inner.drain() {
			debug!(subscription = %name, "cancelling subscription");
			handle.cancel();
		}
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CancellationToken>> {
		self.inner.lock().unwrap_or_else(|e| e.into_inner())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_register_count_unregister() {
		let table = SubscriptionTable::new();
		assert_eq!(table.count(), 0);

		table.register("1:0xabc", CancellationToken::new());
		table.register("2:0xdef", CancellationToken::new());
		assert_eq!(table.count(), 2);

		table.unregister("1:0xabc");
		assert_eq!(table.count(), 1);
	}

	#[test]
	fn test_cancel_all_cancels_and_clears() {
		let table = SubscriptionTable::new();
		let token = CancellationToken::new();
		table.register("1:0xabc", token.clone());

		table.cancel_all();
		assert!(token.is_cancelled());
		assert_eq!(table.count(), 0);
	}
}
