//! Intent event processing.

use super::{chain_time, render_call_data};
use chrono::Utc;
use indexer_monitoring::ServiceMetrics;
use indexer_storage::{IntentStore, StoreError};
use indexer_types::{
	common::{canonical_address, format_address, format_intent_id, receiver_address},
	Bytes32, ChainClient, Intent, IntentStatus, IndexerError, RawEvent, Result,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persists intents from `IntentInitiated` events, idempotently on the
/// intent id.
pub struct IntentProcessor {
	client: Arc<dyn ChainClient>,
	store: Arc<dyn IntentStore>,
	metrics: Arc<ServiceMetrics>,
}

impl IntentProcessor {
	pub fn new(
		client: Arc<dyn ChainClient>,
		store: Arc<dyn IntentStore>,
		metrics: Arc<ServiceMetrics>,
	) -> Self {
		Self {
			client,
			store,
			metrics,
		}
	}

	/// Processes one initiation event. Re-applying the same event only
	/// grows the skipped counter.
	pub async fn process(&self, event: &RawEvent) -> Result<()> {
		if !event.kind.is_initiation() {
			return Err(IndexerError::Internal(format!(
				"intent processor received {:?}",
				event.kind
			)));
		}
		if event.intent_id == Bytes32::zero() {
			return Err(IndexerError::MalformedLog(
				"initiation event without intent id".to_string(),
			));
		}

		let id = format_intent_id(&event.intent_id);

		// sender attribution; the transaction that emitted the event
		let sender = match self.client.transaction_by_hash(event.tx_hash).await {
			Ok((Some(tx), _)) => format_address(&tx.from),
			Ok((None, _)) => {
				warn!(intent = %id, tx = %event.tx_hash, "emitting transaction not found, sender unknown");
				String::new()
			}
			Err(e) if e.is_retriable() => return Err(e),
			Err(e) => {
				warn!(intent = %id, "sender lookup failed: {}", e);
				String::new()
			}
		};

		let created_at = match self.client.block_timestamp(event.block_number).await {
			Ok(ts) => chain_time(ts),
			Err(e) => {
				warn!(
					intent = %id,
					block = event.block_number,
					"block timestamp unavailable, using wall clock: {}",
					e
				);
				Utc::now()
			}
		};

		if self.store.get_intent(&id).await.is_ok() {
			debug!(intent = %id, "intent already recorded, skipping");
			self.metrics.record_skipped();
			return Ok(());
		}

		let intent = Intent {
			id: id.clone(),
			source_chain: event.chain_id.0,
			destination_chain: event.target_chain,
			asset: canonical_address(&format_address(&event.asset)),
			amount: event.amount.to_string(),
			recipient: canonical_address(&receiver_address(&event.receiver)),
			sender,
			intent_fee: event.tip.to_string(),
			status: IntentStatus::Pending,
			is_call: event.is_call,
			call_data: render_call_data(event.call_data.as_ref()),
			created_at,
			updated_at: created_at,
		};

		match self.store.create_intent(intent).await {
			Ok(()) => {
				debug!(intent = %id, destination = event.target_chain, "intent recorded");
				self.metrics.record_processed();
				Ok(())
			}
			Err(StoreError::Duplicate(_)) => {
				// lost the race against another worker; same outcome
				self.metrics.record_skipped();
				Ok(())
			}
			Err(e) => Err(IndexerError::Internal(format!(
				"persisting intent {}: {}",
				id, e
			))),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use indexer_storage::MemoryStore;
	use indexer_types::{
		Address, BlockNumber, ChainId, EndpointKind, EventKind, Log, LogFilter,
		LogSubscription, Receipt, Timestamp, TransactionInfo, TxHash, U256,
	};

	struct StubClient {
		chain_id: ChainId,
		sender: Option<Address>,
		timestamp: Result<Timestamp>,
	}

	impl StubClient {
		fn healthy(chain_id: ChainId) -> Self {
			Self {
				chain_id,
				sender: Some(Address::from([0x11u8; 20])),
				timestamp: Ok(1_700_000_000),
			}
		}
	}

	#[async_trait]
	impl ChainClient for StubClient {
		fn chain_id(&self) -> ChainId {
			self.chain_id
		}

		fn kind(&self) -> EndpointKind {
			EndpointKind::Push
		}

		async fn head_block(&self) -> Result<BlockNumber> {
			Ok(100)
		}

		async fn transaction_by_hash(
			&self,
			hash: TxHash,
		) -> Result<(Option<TransactionInfo>, bool)> {
			Ok((
				self.sender.map(|from| TransactionInfo {
					hash,
					from,
					to: None,
					block_number: Some(100),
				}),
				false,
			))
		}

		async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
			Ok(Some(Receipt {
				transaction_hash: hash,
				block_number: 100,
				status: true,
			}))
		}

		async fn block_timestamp(&self, _: BlockNumber) -> Result<Timestamp> {
			match &self.timestamp {
				Ok(ts) => Ok(*ts),
				Err(_) => Err(IndexerError::NotFound("block".to_string())),
			}
		}

		async fn get_logs(&self, _: &LogFilter) -> Result<Vec<Log>> {
			Ok(vec![])
		}

		async fn subscribe_logs(&self, _: &LogFilter) -> Result<LogSubscription> {
			Err(IndexerError::SubscriptionUnsupported(self.chain_id))
		}
	}

	fn initiated_event(intent_byte: u8) -> RawEvent {
		RawEvent {
			chain_id: ChainId(1),
			kind: EventKind::IntentInitiated,
			intent_id: Bytes32::from([intent_byte; 32]),
			asset: Address::from([0xAAu8; 20]),
			amount: U256::from(1_000_000u64),
			target_chain: 42,
			receiver: vec![0xBB; 20],
			tip: U256::from(1000u64),
			salt: U256::from(7u64),
			call_data: None,
			is_call: false,
			tx_hash: Bytes32::from([intent_byte; 32]),
			block_number: 100,
		}
	}

	fn processor(client: StubClient, store: Arc<MemoryStore>) -> IntentProcessor {
		IntentProcessor::new(Arc::new(client), store, Arc::new(ServiceMetrics::new()))
	}

	#[tokio::test]
	async fn test_creates_pending_intent_with_enrichment() {
		let store = Arc::new(MemoryStore::new());
		let processor = processor(StubClient::healthy(ChainId(1)), store.clone());

		processor.process(&initiated_event(1)).await.unwrap();

		let id = format_intent_id(&Bytes32::from([1u8; 32]));
		let intent = store.get_intent(&id).await.unwrap();
		assert_eq!(intent.status, IntentStatus::Pending);
		assert_eq!(intent.source_chain, 1);
		assert_eq!(intent.destination_chain, 42);
		assert_eq!(intent.amount, "1000000");
		assert_eq!(intent.intent_fee, "1000");
		assert_eq!(intent.sender, format!("0x{}", "11".repeat(20)));
		assert_eq!(intent.asset, format!("0x{}", "aa".repeat(20)));
		assert_eq!(intent.recipient, format!("0x{}", "bb".repeat(20)));
		assert_eq!(intent.created_at.timestamp(), 1_700_000_000);

		assert_eq!(processor.metrics.events_processed(), 1);
	}

	#[tokio::test]
	async fn test_duplicate_event_is_skipped() {
		let store = Arc::new(MemoryStore::new());
		let processor = processor(StubClient::healthy(ChainId(1)), store.clone());

		let event = initiated_event(1);
		processor.process(&event).await.unwrap();
		processor.process(&event).await.unwrap();

		let (intents, total) = store
			.list_intents(indexer_storage::Page::new(1, 10), None)
			.await
			.unwrap();
		assert_eq!(total, 1);
		assert_eq!(intents.len(), 1);
		assert_eq!(processor.metrics.events_processed(), 1);
		assert_eq!(processor.metrics.events_skipped(), 1);
	}

	#[tokio::test]
	async fn test_timestamp_failure_falls_back_to_wall_clock() {
		let store = Arc::new(MemoryStore::new());
		let client = StubClient {
			chain_id: ChainId(1),
			sender: Some(Address::from([0x11u8; 20])),
			timestamp: Err(IndexerError::NotFound("block".to_string())),
		};
		let processor = processor(client, store.clone());

		let before = Utc::now();
		processor.process(&initiated_event(1)).await.unwrap();

		let id = format_intent_id(&Bytes32::from([1u8; 32]));
		let intent = store.get_intent(&id).await.unwrap();
		assert!(intent.created_at >= before);
	}

	#[tokio::test]
	async fn test_call_event_carries_call_data() {
		let store = Arc::new(MemoryStore::new());
		let processor = processor(StubClient::healthy(ChainId(1)), store.clone());

		let mut event = initiated_event(2);
		event.kind = EventKind::IntentInitiatedWithCall;
		event.is_call = true;
		event.call_data = Some(vec![0xDE, 0xAD]);
		processor.process(&event).await.unwrap();

		let id = format_intent_id(&Bytes32::from([2u8; 32]));
		let intent = store.get_intent(&id).await.unwrap();
		assert!(intent.is_call);
		assert_eq!(intent.call_data.as_deref(), Some("0xdead"));
	}

	#[tokio::test]
	async fn test_rejects_fulfillment_events() {
		let store = Arc::new(MemoryStore::new());
		let processor = processor(StubClient::healthy(ChainId(1)), store);

		let mut event = initiated_event(1);
		event.kind = EventKind::IntentFulfilled;
		assert!(processor.process(&event).await.is_err());
	}

	#[tokio::test]
	async fn test_rejects_zero_intent_id() {
		let store = Arc::new(MemoryStore::new());
		let processor = processor(StubClient::healthy(ChainId(1)), store);

		let mut event = initiated_event(1);
		event.intent_id = Bytes32::zero();
		assert!(matches!(
			processor.process(&event).await,
			Err(IndexerError::MalformedLog(_))
		));
	}
}
