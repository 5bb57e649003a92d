//! EVM chain client backed by ethers-rs.
//!
//! Every chain gets an HTTP JSON-RPC provider wrapped in the retrying
//! transport. Chains that also configure a WebSocket endpoint become the
//! push variant: `subscribe_logs` spawns a forwarder task that owns the
//! WS stream and feeds the subscription's bounded channels. Without a
//! WebSocket endpoint the client is pull-only and log delivery is the
//! catchup poller's job.

use crate::retry::{RetryPolicy, RetryTransport};
use async_trait::async_trait;
use ethers::providers::{Authorization, Http, Middleware, Provider, Ws};
use ethers::types::{Filter, Log as EthersLog, ValueOrArray};
use futures::StreamExt;
use indexer_types::{
	BlockNumber, ChainClient, ChainId, EndpointKind, IndexerError, Log, LogFilter,
	LogSubscription, Receipt, Result, SubscriptionSink, Timestamp, TransactionInfo, TxHash,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

/// Chain client over an EVM JSON-RPC endpoint.
pub struct EvmClient {
	chain_id: ChainId,
	http: Arc<Provider<RetryTransport<Http>>>,
	ws: Option<Arc<Provider<Ws>>>,
}

/// Builder for [`EvmClient`] instances.
pub struct EvmClientBuilder {
	chain_id: ChainId,
	rpc_endpoint: String,
	ws_endpoint: Option<String>,
	auth_token: Option<String>,
	max_retries: u32,
}

impl EvmClient {
	pub fn builder(chain_id: ChainId, rpc_endpoint: &str) -> EvmClientBuilder {
		EvmClientBuilder {
			chain_id,
			rpc_endpoint: rpc_endpoint.to_string(),
			ws_endpoint: None,
			auth_token: None,
			max_retries: 3,
		}
	}

	async fn connect(builder: EvmClientBuilder) -> Result<Self> {
		info!(
			chain = %builder.chain_id,
			endpoint = %builder.rpc_endpoint,
			push = builder.ws_endpoint.is_some(),
			"connecting chain client"
		);

		let url: Url = builder
			.rpc_endpoint
			.parse()
			.map_err(|e| IndexerError::Config(format!("invalid rpc endpoint: {}", e)))?;

		let http_transport = match &builder.auth_token {
			Some(token) => Http::new_with_auth(url, Authorization::bearer(token))
				.map_err(|e| IndexerError::Config(format!("failed to create http client: {}", e)))?,
			None => Http::new(url),
		};

		let retrying = RetryTransport::new(http_transport).with_policy(RetryPolicy {
			max_attempts: builder.max_retries.max(1),
			..Default::default()
		});
		let http = Arc::new(Provider::new(retrying));

		// refuse to run against the wrong network
		let actual = http
			.get_chainid()
			.await
			.map_err(|e| rpc_error("get_chainid", e))?;
		if actual != builder.chain_id.0.into() {
			return Err(IndexerError::Config(format!(
				"chain id mismatch: expected {}, endpoint reports {}",
				builder.chain_id, actual
			)));
		}

		let ws = match &builder.ws_endpoint {
			Some(endpoint) => {
				let provider = Provider::<Ws>::connect(endpoint.clone())
					.await
					.map_err(|e| IndexerError::Transport(format!("ws connect failed: {}", e)))?;
				Some(Arc::new(provider))
			}
			None => None,
		};

		Ok(Self {
			chain_id: builder.chain_id,
			http,
			ws,
		})
	}
}

impl EvmClientBuilder {
	pub fn ws_endpoint(mut self, endpoint: Option<String>) -> Self {
		self.ws_endpoint = endpoint;
		self
	}

	pub fn auth_token(mut self, token: Option<String>) -> Self {
		self.auth_token = token;
		self
	}

	pub fn max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;
		self
	}

	pub async fn connect(self) -> Result<EvmClient> {
		EvmClient::connect(self).await
	}
}

/// Maps a provider failure into the indexer error taxonomy.
fn rpc_error(context: &str, e: ethers::providers::ProviderError) -> IndexerError {
	let message = format!("{}: {}", context, e);
	if message.contains("timed out") || message.contains("timeout") {
		IndexerError::Timeout(message)
	} else {
		IndexerError::Transport(message)
	}
}

pub(crate) fn from_ethers_log(log: EthersLog) -> Log {
	Log {
		address: log.address,
		topics: log.topics,
		data: log.data.to_vec(),
		block_number: log.block_number.unwrap_or_default().as_u64(),
		transaction_hash: log.transaction_hash.unwrap_or_default(),
		log_index: log.log_index.unwrap_or_default().as_u64(),
	}
}

pub(crate) fn to_ethers_filter(filter: &LogFilter) -> Filter {
	let mut out = Filter::new();

	if let Some(from) = filter.from_block {
		out = out.from_block(from);
	}
	if let Some(to) = filter.to_block {
		out = out.to_block(to);
	}
	if let Some(address) = filter.address {
		out = out.address(address);
	}
	if !filter.topic0.is_empty() {
		out = out.topic0(ValueOrArray::Array(filter.topic0.clone()));
	}

	out
}

/// Forwards a live WS log stream into the subscription channels,
/// backfilling the gap from the resume point first so no log between
/// the last processed block and the subscription start is lost.
async fn run_forwarder(
	chain_id: ChainId,
	http: Arc<Provider<RetryTransport<Http>>>,
	ws: Arc<Provider<Ws>>,
	filter: LogFilter,
	sink: SubscriptionSink,
) {
	if let Some(from) = filter.from_block {
		let backfill = to_ethers_filter(&filter).from_block(from);
		match http.get_logs(&backfill).await {
			Ok(mut logs) => {
				logs.sort_by_key(|log| {
					(
						log.block_number.unwrap_or_default().as_u64(),
						log.log_index.unwrap_or_default().as_u64(),
					)
				});
				debug!(chain = %chain_id, count = logs.len(), from, "replaying logs from resume point");
				for log in logs {
					if sink.send_log(from_ethers_log(log)).await.is_err() {
						return;
					}
				}
			}
			Err(e) => {
				sink.send_error(rpc_error("resume backfill", e)).await;
				return;
			}
		}
	}

	let live_filter = to_ethers_filter(&LogFilter {
		from_block: None,
		to_block: None,
		..filter
	});

	let mut stream = match ws.subscribe_logs(&live_filter).await {
		Ok(stream) => stream,
		Err(e) => {
			sink.send_error(rpc_error("subscribe_logs", e)).await;
			return;
		}
	};

	loop {
		tokio::select! {
			_ = sink.cancelled() => {
				debug!(chain = %chain_id, "subscription cancelled, stopping forwarder");
				break;
			}
			item = stream.next() => match item {
				Some(log) => {
					if sink.send_log(from_ethers_log(log)).await.is_err() {
						break;
					}
				}
				None => {
					warn!(chain = %chain_id, "ws log stream terminated");
					sink.send_error(IndexerError::Transport(
						"log stream terminated by endpoint".to_string(),
					))
					.await;
					break;
				}
			}
		}
	}

	if let Err(e) = stream.unsubscribe().await {
		debug!(chain = %chain_id, "unsubscribe failed: {}", e);
	}
}

#[async_trait]
impl ChainClient for EvmClient {
	fn chain_id(&self) -> ChainId {
		self.chain_id
	}

	fn kind(&self) -> EndpointKind {
		if self.ws.is_some() {
			EndpointKind::Push
		} else {
			EndpointKind::Pull
		}
	}

	async fn head_block(&self) -> Result<BlockNumber> {
		self.http
			.get_block_number()
			.await
			.map(|n| n.as_u64())
			.map_err(|e| rpc_error("get_block_number", e))
	}

	async fn transaction_by_hash(
		&self,
		hash: TxHash,
	) -> Result<(Option<TransactionInfo>, bool)> {
		let tx = self
			.http
			.get_transaction(hash)
			.await
			.map_err(|e| rpc_error("get_transaction", e))?;

		Ok(match tx {
			Some(tx) => {
				let is_pending = tx.block_number.is_none();
				(
					Some(TransactionInfo {
						hash: tx.hash,
						from: tx.from,
						to: tx.to,
						block_number: tx.block_number.map(|n| n.as_u64()),
					}),
					is_pending,
				)
			}
			None => (None, false),
		})
	}

	async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
		let receipt = self
			.http
			.get_transaction_receipt(hash)
			.await
			.map_err(|e| rpc_error("get_transaction_receipt", e))?;

		Ok(receipt.and_then(|r| {
			// a receipt without a block number is not yet usable
			r.block_number.map(|block| Receipt {
				transaction_hash: r.transaction_hash,
				block_number: block.as_u64(),
				status: r.status.map(|s| s.as_u64() == 1).unwrap_or(false),
			})
		}))
	}

	async fn block_timestamp(&self, block: BlockNumber) -> Result<Timestamp> {
		let found = self
			.http
			.get_block(block)
			.await
			.map_err(|e| rpc_error("get_block", e))?;

		match found {
			Some(b) => Ok(b.timestamp.as_u64()),
			None => Err(IndexerError::NotFound(format!(
				"block {} on chain {}",
				block, self.chain_id
			))),
		}
	}

	async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
		let mut logs = self
			.http
			.get_logs(&to_ethers_filter(filter))
			.await
			.map_err(|e| rpc_error("get_logs", e))?;

		// block-then-index order within one call
		logs.sort_by_key(|log| {
			(
				log.block_number.unwrap_or_default().as_u64(),
				log.log_index.unwrap_or_default().as_u64(),
			)
		});

		Ok(logs.into_iter().map(from_ethers_log).collect())
	}

	async fn subscribe_logs(&self, filter: &LogFilter) -> Result<LogSubscription> {
		let ws = self
			.ws
			.clone()
			.ok_or(IndexerError::SubscriptionUnsupported(self.chain_id))?;

		let (sink, subscription) = LogSubscription::channel();
		let chain_id = self.chain_id;
		let http = self.http.clone();
		let filter = filter.clone();

		tokio::spawn(async move {
			run_forwarder(chain_id, http, ws, filter, sink).await;
		});

		Ok(subscription)
	}
}
