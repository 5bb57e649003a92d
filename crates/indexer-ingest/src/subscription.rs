//! Live log subscription worker.
//!
//! Maintains exactly one healthy subscription per (chain, contract) and
//! survives endpoint instability indefinitely. The state machine:
//!
//! Starting -> Subscribing -> Active -> Backoff -> Subscribing ...
//!                              |          |
//!                              v          v (retry budget spent)
//!                           Draining    Failed
//!                              |
//!                              v
//!                          Terminated
//!
//! `Failed` reports on the supervisor's error channel; the supervisor
//! recreates the worker without bound. Cancellation drains in-flight
//! logs before terminating.

use crate::{deliver_log, EventDecoder, EventSink, RetryBackoff, SubscriptionTable};
use indexer_monitoring::ServiceMetrics;
use indexer_types::{
	common::format_address, Address, BlockNumber, ChainClient, EventKind, IndexerError, Log,
	LogFilter, LogSubscription,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tunables for the subscription worker.
#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
	pub base_delay: Duration,
	pub max_delay: Duration,
	/// Inner retry budget before the worker gives up and asks for a
	/// restart.
	pub max_attempts: u32,
	/// Deadline for processing one log.
	pub log_deadline: Duration,
	pub heartbeat_interval: Duration,
	/// Cadence of the supervisor health timestamp update.
	pub health_interval: Duration,
}

impl Default for SubscriptionConfig {
	fn default() -> Self {
		Self {
			base_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(300),
			max_attempts: 10,
			log_deadline: Duration::from_secs(45),
			heartbeat_interval: Duration::from_secs(120),
			health_interval: Duration::from_secs(60),
		}
	}
}

enum Phase {
	Starting,
	Subscribing,
	Active(LogSubscription),
	Backoff,
	Draining(Option<LogSubscription>),
	Failed,
	Terminated,
}

enum ActiveOutcome {
	Log(Log),
	SubscriptionError(Option<String>),
	LogChannelClosed,
	Shutdown,
	Heartbeat,
	Health,
}

/// Worker owning one live log subscription.
pub struct SubscriptionWorker {
	client: Arc<dyn ChainClient>,
	contract: Address,
	decoder: EventDecoder,
	sink: Arc<dyn EventSink>,
	metrics: Arc<ServiceMetrics>,
	table: Arc<SubscriptionTable>,
	error_tx: mpsc::Sender<IndexerError>,
	shutdown: CancellationToken,
	config: SubscriptionConfig,
}

impl SubscriptionWorker {
	#[allow(clippy::too_many_arguments)]
	pub fn new(
		client: Arc<dyn ChainClient>,
		contract: Address,
		sink: Arc<dyn EventSink>,
		metrics: Arc<ServiceMetrics>,
		table: Arc<SubscriptionTable>,
		error_tx: mpsc::Sender<IndexerError>,
		shutdown: CancellationToken,
		config: SubscriptionConfig,
	) -> Self {
		let decoder = EventDecoder::new(client.chain_id());
		Self {
			client,
			contract,
			decoder,
			sink,
			metrics,
			table,
			error_tx,
			shutdown,
			config,
		}
	}

	/// Runs the state machine until terminated or failed.
	pub async fn run(self) {
		let name = format!(
			"{}:{}",
			self.client.chain_id(),
			format_address(&self.contract)
		);
		info!(worker = %name, "subscription worker starting");

		let mut resume: Option<BlockNumber> = None;
		let mut backoff = RetryBackoff::new(self.config.base_delay, self.config.max_delay);
		let mut ever_subscribed = false;
		let mut phase = Phase::Starting;

		loop {
			phase = match phase {
				Phase::Starting => {
					match self.client.head_block().await {
						Ok(head) => resume = Some(head),
						Err(e) => {
							// without a head probe the endpoint decides
							// where the live stream begins
							warn!(worker = %name, "head probe failed, subscribing without resume point: {}", e);
						}
					}
					Phase::Subscribing
				}

				Phase::Subscribing => {
					if self.shutdown.is_cancelled() {
						Phase::Draining(None)
					} else {
						let mut filter = LogFilter::new()
							.address(self.contract)
							.topic0(EventKind::all_topics());
						if let Some(from) = resume {
							filter = filter.from_block(from);
						}

						match self.client.subscribe_logs(&filter).await {
							Ok(subscription) => {
								self.table
									.register(name.as_str(), subscription.cancel_handle());
								if ever_subscribed {
									self.metrics.record_reconnection();
								}
								ever_subscribed = true;
								backoff.reset();
								info!(worker = %name, resume = ?resume, "subscription established");
								Phase::Active(subscription)
							}
							Err(e) => {
								warn!(worker = %name, "subscribe failed: {}", e);
								Phase::Backoff
							}
						}
					}
				}

				Phase::Active(subscription) => {
					self.run_active(&name, subscription, &mut resume).await
				}

				Phase::Backoff => {
					if backoff.attempt() >= self.config.max_attempts {
						Phase::Failed
					} else {
						let delay = backoff.next_delay();
						debug!(worker = %name, attempt = backoff.attempt(), "backing off for {:?}", delay);
						tokio::select! {
							_ = tokio::time::sleep(delay) => Phase::Subscribing,
							_ = self.shutdown.cancelled() => Phase::Draining(None),
						}
					}
				}

				Phase::Draining(subscription) => {
					if let Some(mut subscription) = subscription {
						subscription.unsubscribe();
						// in-flight logs are allowed to finish
						while let Ok(log) = subscription.logs.try_recv() {
							let _ = deliver_log(
								&self.decoder,
								self.sink.as_ref(),
								&self.metrics,
								log,
								self.config.log_deadline,
							)
							.await;
						}
						self.table.unregister(&name);
					}
					Phase::Terminated
				}

				Phase::Failed => {
					error!(
						worker = %name,
						attempts = self.config.max_attempts,
						"subscription retry budget spent, requesting restart"
					);
					let _ = self
						.error_tx
						.send(IndexerError::SubscriptionFailed {
							chain: self.client.chain_id(),
							reason: format!(
								"retry budget of {} attempts spent",
								self.config.max_attempts
							),
						})
						.await;
					break;
				}

				Phase::Terminated => break,
			};
		}

		info!(worker = %name, "subscription worker stopped");
	}

	async fn run_active(
		&self,
		name: &str,
		mut subscription: LogSubscription,
		resume: &mut Option<BlockNumber>,
	) -> Phase {
		let mut heartbeat = tokio::time::interval(self.config.heartbeat_interval);
		heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
		let mut health = tokio::time::interval(self.config.health_interval);
		health.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			let outcome = tokio::select! {
				_ = self.shutdown.cancelled() => ActiveOutcome::Shutdown,
				maybe_err = subscription.errors.recv() => {
					ActiveOutcome::SubscriptionError(maybe_err.map(|e| e.to_string()))
				}
				maybe_log = subscription.logs.recv() => match maybe_log {
					Some(log) => ActiveOutcome::Log(log),
					None => ActiveOutcome::LogChannelClosed,
				},
				_ = heartbeat.tick() => ActiveOutcome::Heartbeat,
				_ = health.tick() => ActiveOutcome::Health,
			};

			match outcome {
				ActiveOutcome::Log(log) => {
					*resume = Some(log.block_number);
					let _ = deliver_log(
						&self.decoder,
						self.sink.as_ref(),
						&self.metrics,
						log,
						self.config.log_deadline,
					)
					.await;
				}
				ActiveOutcome::Heartbeat => {
					info!(
						worker = %name,
						processed = self.metrics.events_processed(),
						errors = self.metrics.processing_errors(),
						"subscription heartbeat"
					);
				}
				ActiveOutcome::Health => {
					self.metrics.touch_health_check();
				}
				ActiveOutcome::Shutdown => {
					info!(worker = %name, "shutdown requested, draining");
					return Phase::Draining(Some(subscription));
				}
				ActiveOutcome::SubscriptionError(reason) => {
					warn!(
						worker = %name,
						"subscription error: {}",
						reason.unwrap_or_else(|| "error channel closed".to_string())
					);
					subscription.unsubscribe();
					self.table.unregister(name);
					return Phase::Backoff;
				}
				ActiveOutcome::LogChannelClosed => {
					warn!(worker = %name, "log channel closed while active");
					self.table.unregister(name);
					return Phase::Backoff;
				}
			}
		}
	}
}
