//! Chain-related types and the client trait over blockchain endpoints.

use crate::common::{Address, BlockNumber, Bytes32, ChainId, Timestamp, TxHash};
use crate::errors::{IndexerError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Bounded capacity of a subscription's log channel. A full channel
/// blocks the endpoint reader; logs are never dropped.
pub const LOG_CHANNEL_CAPACITY: usize = 200;

/// Bounded capacity of a subscription's error channel.
pub const ERROR_CHANNEL_CAPACITY: usize = 100;

/// How an endpoint delivers logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
	/// Live log subscriptions over a persistent connection.
	Push,
	/// Bounded historical queries only; served by the catchup poller.
	Pull,
}

/// Basic log structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
	pub address: Address,
	pub topics: Vec<Bytes32>,
	pub data: Vec<u8>,
	pub block_number: BlockNumber,
	pub transaction_hash: TxHash,
	pub log_index: u64,
}

/// Filter for log queries and subscriptions.
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
	pub address: Option<Address>,
	/// Accepted topic0 values; empty matches any event.
	pub topic0: Vec<Bytes32>,
	pub from_block: Option<BlockNumber>,
	pub to_block: Option<BlockNumber>,
}

impl LogFilter {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn address(mut self, address: Address) -> Self {
		self.address = Some(address);
		self
	}

	pub fn topic0(mut self, topics: Vec<Bytes32>) -> Self {
		self.topic0 = topics;
		self
	}

	pub fn from_block(mut self, block: BlockNumber) -> Self {
		self.from_block = Some(block);
		self
	}

	pub fn to_block(mut self, block: BlockNumber) -> Self {
		self.to_block = Some(block);
		self
	}
}

/// Minimal view of a transaction, enough to attribute its sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
	pub hash: TxHash,
	pub from: Address,
	pub to: Option<Address>,
	pub block_number: Option<BlockNumber>,
}

/// Minimal receipt view; carries the block the transaction landed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
	pub transaction_hash: TxHash,
	pub block_number: BlockNumber,
	pub status: bool,
}

/// Consumer half of a live log subscription.
///
/// Logs arrive in endpoint order until the subscription errors or is
/// cancelled. A closed log channel while the producer should still be
/// live is itself a subscription error.
pub struct LogSubscription {
	pub logs: mpsc::Receiver<Log>,
	pub errors: mpsc::Receiver<IndexerError>,
	cancel: CancellationToken,
}

impl LogSubscription {
	/// Creates a bounded subscription channel pair.
	pub fn channel() -> (SubscriptionSink, LogSubscription) {
		let (log_tx, log_rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
		let (err_tx, err_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
		let cancel = CancellationToken::new();
		(
			SubscriptionSink {
				logs: log_tx,
				errors: err_tx,
				cancel: cancel.clone(),
			},
			LogSubscription {
				logs: log_rx,
				errors: err_rx,
				cancel,
			},
		)
	}

	/// Signals the producer to stop. Buffered logs stay readable so the
	/// consumer can drain in-flight work.
	pub fn unsubscribe(&self) {
		self.cancel.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Handle that cancels this subscription remotely; used by the
	/// supervisor's subscription table during shutdown.
	pub fn cancel_handle(&self) -> CancellationToken {
		self.cancel.clone()
	}
}

/// Producer half of a live log subscription, held by the client's
/// forwarder task.
#[derive(Clone)]
pub struct SubscriptionSink {
	logs: mpsc::Sender<Log>,
	errors: mpsc::Sender<IndexerError>,
	cancel: CancellationToken,
}

impl SubscriptionSink {
	/// Forwards one log, blocking when the channel is full. Errors only
	/// when the consumer is gone.
	pub async fn send_log(&self, log: Log) -> Result<()> {
		self.logs
			.send(log)
			.await
			.map_err(|_| IndexerError::Internal("subscription consumer dropped".into()))
	}

	/// Reports an asynchronous subscription error.
	pub async fn send_error(&self, error: IndexerError) {
		let _ = self.errors.send(error).await;
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancel.is_cancelled()
	}

	/// Completes when the consumer unsubscribes.
	pub async fn cancelled(&self) {
		self.cancel.cancelled().await
	}
}

/// Client over one blockchain endpoint.
///
/// Push endpoints additionally serve `subscribe_logs`; pull endpoints
/// return `SubscriptionUnsupported` there and rely on `get_logs`.
/// `get_logs` returns logs in block-then-index order within one call; no
/// ordering holds between concurrent calls.
#[async_trait]
pub trait ChainClient: Send + Sync {
	/// Chain this client is connected to.
	fn chain_id(&self) -> ChainId;

	/// Whether the endpoint pushes logs or must be polled.
	fn kind(&self) -> EndpointKind;

	/// Current head block number.
	async fn head_block(&self) -> Result<BlockNumber>;

	/// Transaction lookup; the boolean reports whether it is still
	/// pending.
	async fn transaction_by_hash(&self, hash: TxHash) -> Result<(Option<TransactionInfo>, bool)>;

	/// Receipt lookup; `None` until the transaction is mined.
	async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>>;

	/// Unix-seconds timestamp of the given block.
	async fn block_timestamp(&self, block: BlockNumber) -> Result<Timestamp>;

	/// Bounded historical log query.
	async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>>;

	/// Opens a live log subscription. Push endpoints only.
	async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription>;
}
