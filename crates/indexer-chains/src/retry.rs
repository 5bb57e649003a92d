//! Retrying JSON-RPC transport.
//!
//! Only transient failures are worth repeating: network-level errors
//! and the reserved JSON-RPC server-error range that endpoints use for
//! conditions like rate limits or lagging state. Protocol errors
//! (unknown method, invalid params, undecodable payloads) surface
//! immediately — they map to the non-retriable side of the indexer's
//! error taxonomy and repeating them only burns the endpoint's rate
//! budget.

use backoff::{backoff::Backoff, ExponentialBackoffBuilder};
use ethers::providers::{Http, HttpClientError, JsonRpcClient};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Reserved JSON-RPC server-error range (`-32099..=-32000`); endpoints
/// report transient conditions here.
const SERVER_ERROR_CODES: std::ops::RangeInclusive<i64> = -32099..=-32000;

/// Retry schedule for one transport.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	/// Attempts per request before the error surfaces.
	pub max_attempts: u32,
	pub initial_delay: Duration,
	pub max_delay: Duration,
	/// Wall-clock budget across one request's retries.
	pub total_budget: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			initial_delay: Duration::from_millis(250),
			max_delay: Duration::from_secs(5),
			total_budget: Duration::from_secs(20),
		}
	}
}

/// JSON-RPC transport that repeats transient failures under a
/// [`RetryPolicy`] and counts every repeated call, so the chain client
/// can expose how flaky its endpoint is.
#[derive(Debug)]
pub struct RetryTransport<T> {
	inner: T,
	policy: RetryPolicy,
	retries: AtomicU64,
}

impl<T> RetryTransport<T> {
	pub fn new(inner: T) -> Self {
		Self {
			inner,
			policy: RetryPolicy::default(),
			retries: AtomicU64::new(0),
		}
	}

	pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
		self.policy = policy;
		self
	}

	/// Total repeated calls over this transport's lifetime.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}
}

impl RetryTransport<Http> {
	/// Whether an error class can succeed on a later attempt.
	fn should_retry(error: &HttpClientError) -> bool {
		match error {
			HttpClientError::ReqwestError(_) => true,
			HttpClientError::JsonRpcError(e) => SERVER_ERROR_CODES.contains(&e.code),
			// undecodable responses will not decode better next time
			_ => false,
		}
	}
}

#[async_trait::async_trait]
impl JsonRpcClient for RetryTransport<Http> {
	type Error = HttpClientError;

	async fn request<T, R>(&self, method: &str, params: T) -> Result<R, Self::Error>
	where
		T: Serialize + Send + Sync + std::fmt::Debug,
		R: DeserializeOwned + Send,
	{
		let mut schedule = ExponentialBackoffBuilder::new()
			.with_initial_interval(self.policy.initial_delay)
			.with_max_interval(self.policy.max_delay)
			.with_max_elapsed_time(Some(self.policy.total_budget))
			.build();
		let mut attempt = 0u32;

		loop {
			match self.inner.request(method, &params).await {
				Ok(value) => {
					if attempt > 0 {
						debug!(method, attempt, "rpc call recovered after retry");
					}
					return Ok(value);
				}
				Err(e) if !Self::should_retry(&e) => {
					debug!(method, "rpc error is not transient: {}", e);
					return Err(e);
				}
				Err(e) => {
					attempt += 1;
					self.retries.fetch_add(1, Ordering::Relaxed);

					if attempt >= self.policy.max_attempts {
						warn!(
							method,
							attempt, "transient rpc failure, attempts spent: {}", e
						);
						return Err(e);
					}
					let Some(delay) = schedule.next_backoff() else {
						warn!(method, attempt, "transient rpc failure, time budget spent: {}", e);
						return Err(e);
					};
					warn!(
						method,
						attempt,
						"transient rpc failure, retrying in {:?}: {}",
						delay,
						e
					);
					tokio::time::sleep(delay).await;
				}
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use ethers::providers::JsonRpcError;

	#[test]
	fn test_default_policy() {
		struct MockInner;
		let transport = RetryTransport::new(MockInner);

		assert_eq!(transport.policy.max_attempts, 3);
		assert_eq!(transport.policy.initial_delay, Duration::from_millis(250));
		assert_eq!(transport.policy.total_budget, Duration::from_secs(20));
		assert_eq!(transport.retries(), 0);

		let transport = transport.with_policy(RetryPolicy {
			max_attempts: 7,
			..Default::default()
		});
		assert_eq!(transport.policy.max_attempts, 7);
	}

	#[test]
	fn test_server_error_range_is_retriable() {
		for code in [-32000, -32005, -32099] {
			let error = HttpClientError::JsonRpcError(JsonRpcError {
				code,
				message: "server busy".to_string(),
				data: None,
			});
			assert!(RetryTransport::<Http>::should_retry(&error), "code {}", code);
		}
	}

	#[test]
	fn test_protocol_errors_are_not_retriable() {
		// method not found, invalid params
		for code in [-32601, -32602] {
			let error = HttpClientError::JsonRpcError(JsonRpcError {
				code,
				message: "bad request".to_string(),
				data: None,
			});
			assert!(
				!RetryTransport::<Http>::should_retry(&error),
				"code {}",
				code
			);
		}
	}
}
