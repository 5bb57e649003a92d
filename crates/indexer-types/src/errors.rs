//! Error types for the indexer.

use crate::common::ChainId;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
	/// A raw log failed decoding or validation. Logged and skipped,
	/// never fatal to a worker.
	#[error("malformed log: {0}")]
	MalformedLog(String),

	/// A network-level failure. Retriable with backoff.
	#[error("transport error: {0}")]
	Transport(String),

	/// An individual call exceeded its deadline. Treated as transport.
	#[error("timeout: {0}")]
	Timeout(String),

	/// A requested record or chain resource does not exist.
	#[error("not found: {0}")]
	NotFound(String),

	/// A response could not be interpreted. Not retriable.
	#[error("decoding error: {0}")]
	Decoding(String),

	/// A fulfillment arrived before its intent. Transient; the catchup
	/// poller re-delivers the log later.
	#[error("missing intent {0}")]
	MissingIntent(String),

	/// A write collided with an existing record of the same id.
	#[error("duplicate record: {0}")]
	Duplicate(String),

	/// A request field failed validation.
	#[error("validation failed on {field}: {message}")]
	Validation { field: String, message: String },

	/// A subscription exhausted its inner retry budget.
	#[error("subscription failed on chain {chain}: {reason}")]
	SubscriptionFailed { chain: ChainId, reason: String },

	/// The endpoint only serves logs by polling.
	#[error("chain {0} does not support log subscriptions")]
	SubscriptionUnsupported(ChainId),

	/// A worker panicked; recovered by the supervisor's spawner.
	#[error("task {task} panicked: {message}")]
	TaskPanicked { task: String, message: String },

	/// Shutdown did not complete within its deadline.
	#[error("shutdown timed out after {0:?}")]
	ShutdownTimedOut(Duration),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl IndexerError {
	/// Transport-class errors are retried with backoff; everything else
	/// surfaces to the caller.
	pub fn is_retriable(&self) -> bool {
		matches!(self, IndexerError::Transport(_) | IndexerError::Timeout(_))
	}

	pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
		IndexerError::Validation {
			field: field.into(),
			message: message.into(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_retriable_classification() {
		assert!(IndexerError::Transport("reset".into()).is_retriable());
		assert!(IndexerError::Timeout("rpc".into()).is_retriable());
		assert!(!IndexerError::NotFound("intent".into()).is_retriable());
		assert!(!IndexerError::Decoding("abi".into()).is_retriable());
		assert!(!IndexerError::MalformedLog("topics".into()).is_retriable());
	}

	#[test]
	fn test_validation_constructor() {
		let err = IndexerError::validation("page_size", "must be at most 100");
		assert_eq!(
			err.to_string(),
			"validation failed on page_size: must be at most 100"
		);
	}
}
