//! Fulfillment event processing.

use super::{chain_time, render_call_data};
use chrono::{DateTime, Utc};
use indexer_chains::ChainRegistry;
use indexer_monitoring::ServiceMetrics;
use indexer_storage::{IntentStore, StoreError};
use indexer_types::{
	common::{canonical_address, format_address, format_intent_id, is_hex_id, receiver_address},
	Address, Bytes32, ChainClient, ChainId, Fulfillment, Intent, IntentStatus, IndexerError,
	RawEvent, Result, TxHash, U256,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Persists fulfillments and advances the related intent to
/// `fulfilled`. Timestamp enrichment prefers the destination chain's
/// client from the resolver, falling back to the observing chain.
pub struct FulfillmentProcessor {
	client: Arc<dyn ChainClient>,
	resolver: Arc<ChainRegistry>,
	store: Arc<dyn IntentStore>,
	metrics: Arc<ServiceMetrics>,
}

impl FulfillmentProcessor {
	pub fn new(
		client: Arc<dyn ChainClient>,
		resolver: Arc<ChainRegistry>,
		store: Arc<dyn IntentStore>,
		metrics: Arc<ServiceMetrics>,
	) -> Self {
		Self {
			client,
			resolver,
			store,
			metrics,
		}
	}

	/// Processes one fulfillment event.
	///
	/// A fulfillment whose intent has not been observed yet returns
	/// `MissingIntent`; the catchup poller re-delivers the log once the
	/// intent exists.
	pub async fn process(&self, event: &RawEvent) -> Result<()> {
		if !event.kind.is_fulfillment() {
			return Err(IndexerError::Internal(format!(
				"fulfillment processor received {:?}",
				event.kind
			)));
		}
		if event.intent_id == Bytes32::zero() {
			return Err(IndexerError::MalformedLog(
				"fulfillment event without intent id".to_string(),
			));
		}

		let id = format_intent_id(&event.intent_id);
		let intent = match self.store.get_intent(&id).await {
			Ok(intent) => intent,
			Err(StoreError::NotFound) => return Err(IndexerError::MissingIntent(id)),
			Err(e) => {
				return Err(IndexerError::Internal(format!(
					"resolving intent {}: {}",
					id, e
				)))
			}
		};

		let enrich_client = self.enrichment_client(&intent);
		let created_at = self.created_at_for(enrich_client.as_ref(), event.tx_hash).await;

		// absent event fields inherit from the intent
		let asset = if event.asset == Address::zero() {
			intent.asset.clone()
		} else {
			canonical_address(&format_address(&event.asset))
		};
		let amount = if event.amount == U256::zero() {
			intent.amount.clone()
		} else {
			event.amount.to_string()
		};
		let receiver = {
			let rendered = canonical_address(&receiver_address(&event.receiver));
			if event.receiver.is_empty() || rendered == format_address(&Address::zero()) {
				intent.recipient.clone()
			} else {
				rendered
			}
		};

		let fulfillment = Fulfillment {
			id: id.clone(),
			asset,
			amount,
			receiver,
			tx_hash: format!("{:#x}", event.tx_hash),
			is_call: event.is_call,
			call_data: render_call_data(event.call_data.as_ref()),
			created_at,
			updated_at: created_at,
		};

		self.persist(fulfillment).await
	}

	/// Manual creation path for the HTTP surface: the event fields come
	/// from the related intent, only the transaction hash is external.
	pub async fn create_manual(
		&self,
		intent_id: &str,
		tx_hash: &str,
		call_data: Option<String>,
	) -> Result<Fulfillment> {
		if !is_hex_id(intent_id) {
			return Err(IndexerError::validation(
				"intent_id",
				"must be a 66-character 0x-prefixed hex string",
			));
		}
		if !is_hex_id(tx_hash) {
			return Err(IndexerError::validation(
				"tx_hash",
				"must be a 66-character 0x-prefixed hex string",
			));
		}

		let intent = match self.store.get_intent(intent_id).await {
			Ok(intent) => intent,
			Err(StoreError::NotFound) => {
				return Err(IndexerError::NotFound(format!("intent {}", intent_id)))
			}
			Err(e) => {
				return Err(IndexerError::Internal(format!(
					"resolving intent {}: {}",
					intent_id, e
				)))
			}
		};

		let call_data = match call_data {
			Some(data) => {
				if !intent.is_call {
					return Err(IndexerError::validation(
						"call_data",
						"intent is not a call intent",
					));
				}
				let stripped = data.strip_prefix("0x").unwrap_or(&data);
				if hex::decode(stripped).is_err() {
					return Err(IndexerError::validation("call_data", "invalid hex"));
				}
				Some(data)
			}
			None => None,
		};

		let hash: TxHash = tx_hash
			.parse()
			.map_err(|_| IndexerError::validation("tx_hash", "invalid hash"))?;

		let enrich_client = self.enrichment_client(&intent);
		let created_at = self.created_at_for(enrich_client.as_ref(), hash).await;

		let fulfillment = Fulfillment {
			id: intent.id.clone(),
			asset: intent.asset.clone(),
			amount: intent.amount.clone(),
			receiver: intent.recipient.clone(),
			tx_hash: tx_hash.to_lowercase(),
			is_call: intent.is_call,
			call_data,
			created_at,
			updated_at: created_at,
		};

		// the HTTP surface reports duplicates, unlike the event path
		self.store
			.create_fulfillment(fulfillment.clone())
			.await
			.map_err(|e| match e {
				StoreError::Duplicate(id) => IndexerError::Duplicate(id),
				other => IndexerError::Internal(format!("persisting fulfillment: {}", other)),
			})?;

		self.mark_fulfilled(&fulfillment.id).await?;
		Ok(fulfillment)
	}

	async fn persist(&self, fulfillment: Fulfillment) -> Result<()> {
		let id = fulfillment.id.clone();
		match self.store.create_fulfillment(fulfillment).await {
			Ok(()) => {
				debug!(intent = %id, "fulfillment recorded");
			}
			Err(StoreError::Duplicate(_)) => {
				debug!(intent = %id, "fulfillment already recorded, skipping");
				self.metrics.record_skipped();
				return Ok(());
			}
			Err(e) => {
				return Err(IndexerError::Internal(format!(
					"persisting fulfillment {}: {}",
					id, e
				)))
			}
		}

		self.mark_fulfilled(&id).await?;
		self.metrics.record_processed();
		Ok(())
	}

	async fn mark_fulfilled(&self, id: &str) -> Result<()> {
		match self
			.store
			.update_intent_status(id, IntentStatus::Fulfilled)
			.await
		{
			Ok(()) => Ok(()),
			// the intent already moved past fulfilled; nothing to do
			Err(StoreError::InvalidTransition { from, .. }) => {
				debug!(intent = %id, status = %from, "intent already past fulfilled");
				Ok(())
			}
			Err(e) => Err(IndexerError::Internal(format!(
				"updating intent {} status: {}",
				id, e
			))),
		}
	}

	/// Prefers the resolver's client for the intent's destination
	/// chain; falls back to the observing chain's client.
	fn enrichment_client(&self, intent: &Intent) -> Arc<dyn ChainClient> {
		match self.resolver.get(ChainId(intent.destination_chain)) {
			Some(client) => client,
			None => {
				warn!(
					intent = %intent.id,
					destination = intent.destination_chain,
					"destination chain not configured, using local client for timestamps"
				);
				self.client.clone()
			}
		}
	}

	/// Derives the fulfillment timestamp from the transaction's block,
	/// degrading to the wall clock step by step.
	async fn created_at_for(&self, client: &dyn ChainClient, tx_hash: TxHash) -> DateTime<Utc> {
		if tx_hash == TxHash::zero() {
			warn!("fulfillment without transaction hash, using wall clock");
			return Utc::now();
		}

		match client.transaction_receipt(tx_hash).await {
			Ok(Some(receipt)) => match client.block_timestamp(receipt.block_number).await {
				Ok(ts) => chain_time(ts),
				Err(e) => {
					warn!(tx = %tx_hash, "block timestamp unavailable, using wall clock: {}", e);
					Utc::now()
				}
			},
			Ok(None) => {
				match client.transaction_by_hash(tx_hash).await {
					Ok((_, true)) => {
						warn!(tx = %tx_hash, "transaction still pending, using wall clock")
					}
					_ => warn!(tx = %tx_hash, "receipt not available, using wall clock"),
				}
				Utc::now()
			}
			Err(e) => {
				warn!(tx = %tx_hash, "receipt lookup failed, using wall clock: {}", e);
				Utc::now()
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use indexer_storage::MemoryStore;
	use indexer_types::{
		BlockNumber, EndpointKind, EventKind, Log, LogFilter, LogSubscription, Receipt,
		Timestamp, TransactionInfo,
	};
	use std::sync::atomic::{AtomicU64, Ordering};

	/// Chain client that counts enrichment lookups, so tests can
	/// observe which client served them.
	struct RecordingClient {
		chain_id: ChainId,
		timestamp: Timestamp,
		receipt_calls: AtomicU64,
		timestamp_calls: AtomicU64,
	}

	impl RecordingClient {
		fn new(chain_id: ChainId, timestamp: Timestamp) -> Self {
			Self {
				chain_id,
				timestamp,
				receipt_calls: AtomicU64::new(0),
				timestamp_calls: AtomicU64::new(0),
			}
		}
	}

	#[async_trait]
	impl ChainClient for RecordingClient {
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
				Some(TransactionInfo {
					hash,
					from: Address::from([0x11u8; 20]),
					to: None,
					block_number: Some(100),
				}),
				false,
			))
		}

		async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
			self.receipt_calls.fetch_add(1, Ordering::SeqCst);
			Ok(Some(Receipt {
				transaction_hash: hash,
				block_number: 100,
				status: true,
			}))
		}

		async fn block_timestamp(&self, _: BlockNumber) -> Result<Timestamp> {
			self.timestamp_calls.fetch_add(1, Ordering::SeqCst);
			Ok(self.timestamp)
		}

		async fn get_logs(&self, _: &LogFilter) -> Result<Vec<Log>> {
			Ok(vec![])
		}

		async fn subscribe_logs(&self, _: &LogFilter) -> Result<LogSubscription> {
			Err(IndexerError::SubscriptionUnsupported(self.chain_id))
		}
	}

	fn intent_record(id: &str, destination_chain: u64, is_call: bool) -> Intent {
		let now = Utc::now();
		Intent {
			id: id.to_string(),
			source_chain: 1,
			destination_chain,
			asset: format!("0x{}", "aa".repeat(20)),
			amount: "1000000".to_string(),
			recipient: format!("0x{}", "bb".repeat(20)),
			sender: format!("0x{}", "11".repeat(20)),
			intent_fee: "1000".to_string(),
			status: IntentStatus::Pending,
			is_call,
			call_data: is_call.then(|| "0xdead".to_string()),
			created_at: now,
			updated_at: now,
		}
	}

	fn fulfilled_event(intent_byte: u8) -> RawEvent {
		let mut receiver = vec![0u8; 12];
		receiver.extend_from_slice(&[0xBB; 20]);
		RawEvent {
			chain_id: ChainId(42),
			kind: EventKind::IntentFulfilled,
			intent_id: Bytes32::from([intent_byte; 32]),
			asset: Address::from([0xAAu8; 20]),
			amount: U256::from(1_000_000u64),
			target_chain: 0,
			receiver,
			tip: U256::zero(),
			salt: U256::zero(),
			call_data: None,
			is_call: false,
			tx_hash: Bytes32::from([0xF0u8; 32]),
			block_number: 200,
		}
	}

	fn test_id(n: u8) -> String {
		format!("0x{}", format!("{:02x}", n).repeat(32))
	}

	struct Setup {
		processor: FulfillmentProcessor,
		store: Arc<MemoryStore>,
		local: Arc<RecordingClient>,
		destination: Arc<RecordingClient>,
	}

	/// Local client observes chain 42; destination chain 42161 is in
	/// the resolver.
	fn setup() -> Setup {
		let store = Arc::new(MemoryStore::new());
		let local = Arc::new(RecordingClient::new(ChainId(42), 1_700_000_000));
		let destination = Arc::new(RecordingClient::new(ChainId(42161), 1_700_000_999));

		let mut registry = ChainRegistry::new();
		registry.register(destination.clone()).unwrap();

		let processor = FulfillmentProcessor::new(
			local.clone(),
			Arc::new(registry),
			store.clone(),
			Arc::new(ServiceMetrics::new()),
		);

		Setup {
			processor,
			store,
			local,
			destination,
		}
	}

	#[tokio::test]
	async fn test_missing_intent_is_transient() {
		let setup = setup();
		let err = setup.processor.process(&fulfilled_event(1)).await.unwrap_err();
		assert!(matches!(err, IndexerError::MissingIntent(_)));

		// nothing written
		assert!(setup.store.get_fulfillment(&test_id(1)).await.is_err());
	}

	#[tokio::test]
	async fn test_fulfillment_flips_intent_status() {
		let setup = setup();
		setup
			.store
			.create_intent(intent_record(&test_id(1), 42161, false))
			.await
			.unwrap();

		setup.processor.process(&fulfilled_event(1)).await.unwrap();

		let fulfillment = setup.store.get_fulfillment(&test_id(1)).await.unwrap();
		assert_eq!(fulfillment.amount, "1000000");
		assert_eq!(fulfillment.receiver, format!("0x{}", "bb".repeat(20)));

		let intent = setup.store.get_intent(&test_id(1)).await.unwrap();
		assert_eq!(intent.status, IntentStatus::Fulfilled);
	}

	#[tokio::test]
	async fn test_duplicate_fulfillment_is_absorbed() {
		let setup = setup();
		setup
			.store
			.create_intent(intent_record(&test_id(1), 42161, false))
			.await
			.unwrap();

		let event = fulfilled_event(1);
		setup.processor.process(&event).await.unwrap();
		let skipped_before = setup.processor.metrics.events_skipped();
		setup.processor.process(&event).await.unwrap();

		assert_eq!(
			setup.processor.metrics.events_skipped(),
			skipped_before + 1
		);
		let (all, total) = setup
			.store
			.list_fulfillments(indexer_storage::Page::new(1, 10))
			.await
			.unwrap();
		assert_eq!(total, 1);
		assert_eq!(all.len(), 1);
	}

	#[tokio::test]
	async fn test_timestamps_come_from_destination_chain() {
		let setup = setup();
		setup
			.store
			.create_intent(intent_record(&test_id(1), 42161, false))
			.await
			.unwrap();

		setup.processor.process(&fulfilled_event(1)).await.unwrap();

		assert!(setup.destination.receipt_calls.load(Ordering::SeqCst) >= 1);
		assert!(setup.destination.timestamp_calls.load(Ordering::SeqCst) >= 1);
		assert_eq!(setup.local.receipt_calls.load(Ordering::SeqCst), 0);

		let fulfillment = setup.store.get_fulfillment(&test_id(1)).await.unwrap();
		assert_eq!(fulfillment.created_at.timestamp(), 1_700_000_999);
	}

	#[tokio::test]
	async fn test_unresolvable_destination_falls_back_to_local() {
		let setup = setup();
		// destination chain 555 is not in the resolver
		setup
			.store
			.create_intent(intent_record(&test_id(1), 555, false))
			.await
			.unwrap();

		setup.processor.process(&fulfilled_event(1)).await.unwrap();

		assert!(setup.local.receipt_calls.load(Ordering::SeqCst) >= 1);
		assert_eq!(setup.destination.receipt_calls.load(Ordering::SeqCst), 0);
	}

	#[tokio::test]
	async fn test_out_of_order_arrival_converges() {
		let setup = setup();
		let event = fulfilled_event(1);

		// fulfillment first: transient failure
		assert!(matches!(
			setup.processor.process(&event).await,
			Err(IndexerError::MissingIntent(_))
		));

		// intent lands, the re-delivered fulfillment succeeds
		setup
			.store
			.create_intent(intent_record(&test_id(1), 42161, false))
			.await
			.unwrap();
		setup.processor.process(&event).await.unwrap();

		let intent = setup.store.get_intent(&test_id(1)).await.unwrap();
		assert_eq!(intent.status, IntentStatus::Fulfilled);
	}

	#[tokio::test]
	async fn test_manual_creation_validates_and_persists() {
		let setup = setup();
		setup
			.store
			.create_intent(intent_record(&test_id(1), 42161, false))
			.await
			.unwrap();

		let tx_hash = format!("0x{}", "f0".repeat(32));
		let fulfillment = setup
			.processor
			.create_manual(&test_id(1), &tx_hash, None)
			.await
			.unwrap();
		assert_eq!(fulfillment.id, test_id(1));
		assert_eq!(fulfillment.amount, "1000000");

		let intent = setup.store.get_intent(&test_id(1)).await.unwrap();
		assert_eq!(intent.status, IntentStatus::Fulfilled);
	}

	#[tokio::test]
	async fn test_manual_creation_rejects_bad_inputs() {
		let setup = setup();
		setup
			.store
			.create_intent(intent_record(&test_id(1), 42161, false))
			.await
			.unwrap();
		let tx_hash = format!("0x{}", "f0".repeat(32));

		// malformed id
		assert!(matches!(
			setup.processor.create_manual("0x123", &tx_hash, None).await,
			Err(IndexerError::Validation { .. })
		));

		// unknown intent
		assert!(matches!(
			setup
				.processor
				.create_manual(&test_id(9), &tx_hash, None)
				.await,
			Err(IndexerError::NotFound(_))
		));

		// call data against a non-call intent
		assert!(matches!(
			setup
				.processor
				.create_manual(&test_id(1), &tx_hash, Some("0xdead".to_string()))
				.await,
			Err(IndexerError::Validation { .. })
		));
	}

	#[tokio::test]
	async fn test_manual_duplicate_surfaces() {
		let setup = setup();
		setup
			.store
			.create_intent(intent_record(&test_id(1), 42161, false))
			.await
			.unwrap();
		let tx_hash = format!("0x{}", "f0".repeat(32));

		setup
			.processor
			.create_manual(&test_id(1), &tx_hash, None)
			.await
			.unwrap();
		assert!(matches!(
			setup
				.processor
				.create_manual(&test_id(1), &tx_hash, None)
				.await,
			Err(IndexerError::Duplicate(_))
		));
	}

	#[tokio::test]
	async fn test_manual_call_data_on_call_intent() {
		let setup = setup();
		setup
			.store
			.create_intent(intent_record(&test_id(2), 42161, true))
			.await
			.unwrap();
		let tx_hash = format!("0x{}", "f1".repeat(32));

		let fulfillment = setup
			.processor
			.create_manual(&test_id(2), &tx_hash, Some("0xdead".to_string()))
			.await
			.unwrap();
		assert!(fulfillment.is_call);
		assert_eq!(fulfillment.call_data.as_deref(), Some("0xdead"));
	}
}
