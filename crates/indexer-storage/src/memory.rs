//! In-memory store backend.
//!
//! Reference implementation of [`IntentStore`] used by tests and local
//! runs. Records live in maps guarded by one `RwLock`; insertion order
//! is tracked separately so listings page deterministically.

use crate::{IntentStore, Page, StoreError};
use async_trait::async_trait;
use chrono::Utc;
use indexer_types::{BlockNumber, ChainId, Fulfillment, Intent, IntentStatus};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
struct Inner {
	intents: HashMap<String, Intent>,
	intent_order: Vec<String>,
	fulfillments: HashMap<String, Fulfillment>,
	fulfillment_order: Vec<String>,
	last_blocks: HashMap<u64, BlockNumber>,
}

/// Thread-safe in-memory [`IntentStore`].
#[derive(Default)]
pub struct MemoryStore {
	inner: RwLock<Inner>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}
}

fn paginate<T: Clone>(matching: Vec<&T>, page: Page) -> (Vec<T>, u64) {
	let total = matching.len() as u64;
	let items = matching
		.into_iter()
		.skip(page.offset() as usize)
		.take(page.size as usize)
		.cloned()
		.collect();
	(items, total)
}

#[async_trait]
impl IntentStore for MemoryStore {
	async fn create_intent(&self, intent: Intent) -> Result<(), StoreError> {
		let mut inner = self.inner.write().await;
		if inner.intents.contains_key(&intent.id) {
			return Err(StoreError::Duplicate(intent.id));
		}
		inner.intent_order.push(intent.id.clone());
		inner.intents.insert(intent.id.clone(), intent);
		Ok(())
	}

	async fn get_intent(&self, id: &str) -> Result<Intent, StoreError> {
		let inner = self.inner.read().await;
		inner.intents.get(id).cloned().ok_or(StoreError::NotFound)
	}

	async fn update_intent_status(
		&self,
		id: &str,
		status: IntentStatus,
	) -> Result<(), StoreError> {
		let mut inner = self.inner.write().await;
		let intent = inner.intents.get_mut(id).ok_or(StoreError::NotFound)?;
		if !intent.status.can_transition_to(status) {
			return Err(StoreError::InvalidTransition {
				from: intent.status,
				to: status,
			});
		}
		intent.status = status;
		intent.updated_at = Utc::now();
		Ok(())
	}

	async fn list_intents(
		&self,
		page: Page,
		status: Option<IntentStatus>,
	) -> Result<(Vec<Intent>, u64), StoreError> {
		let inner = self.inner.read().await;
		let matching: Vec<&Intent> = inner
			.intent_order
			.iter()
			.filter_map(|id| inner.intents.get(id))
			.filter(|intent| status.map_or(true, |s| intent.status == s))
			.collect();
		Ok(paginate(matching, page))
	}

	async fn list_intents_by_sender(
		&self,
		sender: &str,
		page: Page,
	) -> Result<(Vec<Intent>, u64), StoreError> {
		let needle = sender.to_lowercase();
		let inner = self.inner.read().await;
		let matching: Vec<&Intent> = inner
			.intent_order
			.iter()
			.filter_map(|id| inner.intents.get(id))
			.filter(|intent| intent.sender.to_lowercase() == needle)
			.collect();
		Ok(paginate(matching, page))
	}

	async fn list_intents_by_recipient(
		&self,
		recipient: &str,
		page: Page,
	) -> Result<(Vec<Intent>, u64), StoreError> {
		let needle = recipient.to_lowercase();
		let inner = self.inner.read().await;
		let matching: Vec<&Intent> = inner
			.intent_order
			.iter()
			.filter_map(|id| inner.intents.get(id))
			.filter(|intent| intent.recipient.to_lowercase() == needle)
			.collect();
		Ok(paginate(matching, page))
	}

	async fn create_fulfillment(&self, fulfillment: Fulfillment) -> Result<(), StoreError> {
		let mut inner = self.inner.write().await;
		if inner.fulfillments.contains_key(&fulfillment.id) {
			return Err(StoreError::Duplicate(fulfillment.id));
		}
		inner.fulfillment_order.push(fulfillment.id.clone());
		inner
			.fulfillments
			.insert(fulfillment.id.clone(), fulfillment);
		Ok(())
	}

	async fn get_fulfillment(&self, id: &str) -> Result<Fulfillment, StoreError> {
		let inner = self.inner.read().await;
		inner
			.fulfillments
			.get(id)
			.cloned()
			.ok_or(StoreError::NotFound)
	}

	async fn list_fulfillments(&self, page: Page) -> Result<(Vec<Fulfillment>, u64), StoreError> {
		let inner = self.inner.read().await;
		let matching: Vec<&Fulfillment> = inner
			.fulfillment_order
			.iter()
			.filter_map(|id| inner.fulfillments.get(id))
			.collect();
		Ok(paginate(matching, page))
	}

	async fn get_last_processed_block(
		&self,
		chain: ChainId,
	) -> Result<Option<BlockNumber>, StoreError> {
		let inner = self.inner.read().await;
		Ok(inner.last_blocks.get(&chain.0).copied())
	}

	async fn set_last_processed_block(
		&self,
		chain: ChainId,
		block: BlockNumber,
	) -> Result<(), StoreError> {
		let mut inner = self.inner.write().await;
		inner.last_blocks.insert(chain.0, block);
		Ok(())
	}
}
