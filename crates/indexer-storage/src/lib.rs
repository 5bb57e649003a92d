//! Persistence surface required by the indexer core.
//!
//! This crate defines the store contract the processors and the catchup
//! poller write through, plus an in-memory reference backend. A
//! relational backend lives outside the core and implements the same
//! trait. Cancellation follows Rust async semantics: dropping a pending
//! store future abandons the operation.

use async_trait::async_trait;
use indexer_types::{BlockNumber, ChainId, Fulfillment, Intent, IntentStatus};
use thiserror::Error;

pub mod memory;

pub use memory::MemoryStore;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The requested record does not exist.
	#[error("not found")]
	NotFound,

	/// A write collided with an existing record of the same id.
	/// Processors absorb this; HTTP write paths surface it as 400.
	#[error("duplicate id {0}")]
	Duplicate(String),

	/// A status update violated the monotone intent lifecycle.
	#[error("illegal status transition {from} -> {to}")]
	InvalidTransition {
		from: IntentStatus,
		to: IntentStatus,
	},

	/// Backend-specific failure.
	#[error("backend error: {0}")]
	Backend(String),
}

/// 1-based pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
	pub number: u64,
	pub size: u64,
}

impl Page {
	pub fn new(number: u64, size: u64) -> Self {
		Self { number, size }
	}

	pub fn offset(&self) -> u64 {
		self.number.saturating_sub(1).saturating_mul(self.size)
	}
}

/// The persistence operations the core requires.
///
/// Uniqueness is enforced on record ids; a violation surfaces as
/// `StoreError::Duplicate`. Listing operations return the requested page
/// in insertion order together with the total matching count.
#[async_trait]
pub trait IntentStore: Send + Sync {
	async fn create_intent(&self, intent: Intent) -> Result<(), StoreError>;

	async fn get_intent(&self, id: &str) -> Result<Intent, StoreError>;

	/// Applies a monotone status transition and refreshes `updated_at`.
	async fn update_intent_status(&self, id: &str, status: IntentStatus)
		-> Result<(), StoreError>;

	async fn list_intents(
		&self,
		page: Page,
		status: Option<IntentStatus>,
	) -> Result<(Vec<Intent>, u64), StoreError>;

	async fn list_intents_by_sender(
		&self,
		sender: &str,
		page: Page,
	) -> Result<(Vec<Intent>, u64), StoreError>;

	async fn list_intents_by_recipient(
		&self,
		recipient: &str,
		page: Page,
	) -> Result<(Vec<Intent>, u64), StoreError>;

	async fn create_fulfillment(&self, fulfillment: Fulfillment) -> Result<(), StoreError>;

	async fn get_fulfillment(&self, id: &str) -> Result<Fulfillment, StoreError>;

	async fn list_fulfillments(&self, page: Page) -> Result<(Vec<Fulfillment>, u64), StoreError>;

	/// Resume point of the catchup poller for one chain.
	async fn get_last_processed_block(
		&self,
		chain: ChainId,
	) -> Result<Option<BlockNumber>, StoreError>;

	/// Commits a new resume point after a window's records are written.
	async fn set_last_processed_block(
		&self,
		chain: ChainId,
		block: BlockNumber,
	) -> Result<(), StoreError>;
}
