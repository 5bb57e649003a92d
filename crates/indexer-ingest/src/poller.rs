//! Catchup poller for pull-only endpoints and post-restart backfill.
//!
//! Every tick the poller advances a bounded block window from the
//! store's last-processed block toward the chain head, fetches the
//! window's logs, feeds them to the sink in block-then-index order, and
//! commits the new resume point. A crash between feeding and committing
//! re-delivers at most one window, which the idempotent processors
//! absorb.
//!
//! A fulfillment whose intent has not been observed yet holds the
//! commit back to just before its block, so the same window is
//! re-scanned on a later tick once the intent exists.

use crate::{deliver_log, EventDecoder, EventSink};
use indexer_monitoring::ServiceMetrics;
use indexer_storage::IntentStore;
use indexer_types::{
	Address, BlockNumber, ChainClient, ChainId, EventKind, IndexerError, LogFilter, Result,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tunables for the catchup poller.
#[derive(Debug, Clone)]
pub struct PollerConfig {
	pub poll_interval: Duration,
	/// Starting window size in blocks; adapts between 1 and
	/// `max_window` with endpoint behavior.
	pub initial_window: u64,
	pub max_window: u64,
	/// Deadline for processing one log.
	pub log_deadline: Duration,
	/// First block to scan when the store has no resume point.
	pub start_block: Option<BlockNumber>,
}

impl Default for PollerConfig {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_secs(5),
			initial_window: 1000,
			max_window: 5000,
			log_deadline: Duration::from_secs(45),
			start_block: None,
		}
	}
}

/// Polls one (chain, contract) pair over bounded block windows.
pub struct CatchupPoller {
	client: Arc<dyn ChainClient>,
	contract: Address,
	decoder: EventDecoder,
	sink: Arc<dyn EventSink>,
	store: Arc<dyn IntentStore>,
	metrics: Arc<ServiceMetrics>,
	shutdown: CancellationToken,
	config: PollerConfig,
}

impl CatchupPoller {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		client: Arc<dyn ChainClient>,
		contract: Address,
		sink: Arc<dyn EventSink>,
		store: Arc<dyn IntentStore>,
		metrics: Arc<ServiceMetrics>,
		shutdown: CancellationToken,
		config: PollerConfig,
	) -> Self {
		let decoder = EventDecoder::new(client.chain_id());
		Self {
			client,
			contract,
			decoder,
			sink,
			store,
			metrics,
			shutdown,
			config,
		}
	}

	fn chain_id(&self) -> ChainId {
		self.client.chain_id()
	}

	/// Runs until cancelled, reporting poll health into the metrics.
	pub async fn run(self) {
		info!(chain = %self.chain_id(), "catchup poller starting");

		let mut window = self.config.initial_window.max(1);
		let mut ticker = tokio::time::interval(self.config.poll_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = self.shutdown.cancelled() => break,
				_ = ticker.tick() => {}
			}

			match self.poll_once(window).await {
				Ok(outcome) => {
					self.metrics.touch_polling_check(true);
					if outcome.processed > 0 {
						debug!(
							chain = %self.chain_id(),
							processed = outcome.processed,
							committed = outcome.committed,
							"window processed"
						);
					}
					if outcome.saturated {
						// endpoint handled a full window; widen up to the cap
						window = (window * 2).min(self.config.max_window);
					}
				}
				Err(e) => {
					self.metrics.touch_polling_check(false);
					if e.is_retriable() {
						// shrink the window before the next attempt
						window = (window / 2).max(1);
						warn!(
							chain = %self.chain_id(),
							window,
							"poll failed, narrowing window: {}",
							e
						);
					} else {
						warn!(chain = %self.chain_id(), "poll failed: {}", e);
					}
				}
			}
		}

		info!(chain = %self.chain_id(), "catchup poller stopped");
	}

	/// Backfill mode for push chains resuming after downtime: advances
	/// windows until the head is reached, then returns and leaves new
	/// logs to the live subscription.
	pub async fn run_until_caught_up(self) {
		info!(chain = %self.chain_id(), "backfill starting");

		let mut window = self.config.initial_window.max(1);
		loop {
			if self.shutdown.is_cancelled() {
				break;
			}
			match self.poll_once(window).await {
				Ok(outcome) => {
					if !outcome.saturated {
						break;
					}
					window = (window * 2).min(self.config.max_window);
				}
				Err(e) if e.is_retriable() => {
					window = (window / 2).max(1);
					warn!(chain = %self.chain_id(), window, "backfill poll failed, narrowing window: {}", e);
					tokio::select! {
						_ = tokio::time::sleep(self.config.poll_interval) => {}
						_ = self.shutdown.cancelled() => break,
					}
				}
				Err(e) => {
					warn!(chain = %self.chain_id(), "backfill aborted: {}", e);
					break;
				}
			}
		}

		info!(chain = %self.chain_id(), "backfill complete");
	}

	/// Processes one window; returns what was processed and committed.
	pub async fn poll_once(&self, window: u64) -> Result<PollOutcome> {
		let head = self.client.head_block().await?;
		let last = self
			.store
			.get_last_processed_block(self.chain_id())
			.await
			.map_err(|e| IndexerError::Internal(format!("reading resume point: {}", e)))?;

		let from = match last {
			Some(block) => block + 1,
			// fresh chain: honor the configured override or start at the head
			None => self.config.start_block.unwrap_or(head),
		};
		if from > head {
			return Ok(PollOutcome::empty(last.unwrap_or(head)));
		}

		let to = head.min(from + window.saturating_sub(1));
		let filter = LogFilter::new()
			.address(self.contract)
			.topic0(EventKind::all_topics())
			.from_block(from)
			.to_block(to);

		let logs = self.client.get_logs(&filter).await?;

		let mut processed = 0u64;
		let mut commit = to;
		for log in logs {
			let block = log.block_number;
			match deliver_log(
				&self.decoder,
				self.sink.as_ref(),
				&self.metrics,
				log,
				self.config.log_deadline,
			)
			.await
			{
				Ok(()) => processed += 1,
				Err(IndexerError::MissingIntent(_)) => {
					// re-scan from this block once the intent lands
					commit = block.saturating_sub(1).max(from.saturating_sub(1));
					break;
				}
				// malformed or failed logs are counted and left behind
				Err(_) => {}
			}
		}

		self.store
			.set_last_processed_block(self.chain_id(), commit)
			.await
			.map_err(|e| IndexerError::Internal(format!("committing resume point: {}", e)))?;

		Ok(PollOutcome {
			processed,
			committed: commit,
			saturated: to < head && commit == to,
		})
	}
}

/// Result of one polling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
	/// Events handed to the sink successfully.
	pub processed: u64,
	/// Resume point written to the store.
	pub committed: BlockNumber,
	/// Whether the window was full, i.e. more blocks are waiting.
	pub saturated: bool,
}

impl PollOutcome {
	fn empty(committed: BlockNumber) -> Self {
		Self {
			processed: 0,
			committed,
			saturated: false,
		}
	}
}
