//! Per-chain service supervisor.
//!
//! One `ChainService` owns every task of a chain's ingestion: the
//! subscription worker or catchup poller, the error monitor, and the
//! health monitor. Tasks are spawned through a tracked launcher that
//! counts them, recovers panics, and reports them on the error channel.
//! Push chains additionally run a bounded backfill at startup to heal
//! downtime from the store's resume point.

use crate::processor::EventRouter;
use futures::FutureExt;
use indexer_ingest::{
	CatchupPoller, EventSink, PollerConfig, SubscriptionConfig, SubscriptionTable,
	SubscriptionWorker,
};
use indexer_monitoring::{HealthCheck, HealthStatus, MetricsSnapshot, ServiceMetrics};
use indexer_storage::IntentStore;
use indexer_types::{
	Address, ChainClient, ChainId, EndpointKind, IndexerError, Result,
	chains::ERROR_CHANNEL_CAPACITY,
};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Tunables for the supervisor.
#[derive(Debug, Clone)]
pub struct ChainServiceConfig {
	/// Startup window during which the service reports healthy
	/// unconditionally.
	pub grace_period: Duration,
	pub health_check_interval: Duration,
	/// Consecutive unhealthy checks before ingestion is restarted.
	pub unhealthy_restart_threshold: u32,
	/// Maximum age of the last poll report for a pull chain to count
	/// as healthy.
	pub max_polling_age: Duration,
	/// Budget for draining the error channel during shutdown.
	pub error_drain_deadline: Duration,
	pub subscription: SubscriptionConfig,
	pub poller: PollerConfig,
}

impl Default for ChainServiceConfig {
	fn default() -> Self {
		Self {
			grace_period: Duration::from_secs(30),
			health_check_interval: Duration::from_secs(300),
			unhealthy_restart_threshold: 3,
			max_polling_age: Duration::from_secs(600),
			error_drain_deadline: Duration::from_secs(1),
			subscription: SubscriptionConfig::default(),
			poller: PollerConfig::default(),
		}
	}
}

/// Supervisor of one chain's ingestion service.
pub struct ChainService {
	chain_id: ChainId,
	client: Arc<dyn ChainClient>,
	contract: Address,
	store: Arc<dyn IntentStore>,
	router: Arc<EventRouter>,
	metrics: Arc<ServiceMetrics>,
	table: Arc<SubscriptionTable>,
	config: ChainServiceConfig,
	shutdown: CancellationToken,
	shut_down: AtomicBool,
	started: AtomicBool,
	tasks: Mutex<JoinSet<()>>,
	error_tx: mpsc::Sender<IndexerError>,
	error_rx: Mutex<Option<mpsc::Receiver<IndexerError>>>,
	ingest_cancel: Mutex<CancellationToken>,
}

impl ChainService {
	pub fn new(
		client: Arc<dyn ChainClient>,
		contract: Address,
		store: Arc<dyn IntentStore>,
		router: Arc<EventRouter>,
		metrics: Arc<ServiceMetrics>,
		config: ChainServiceConfig,
	) -> Arc<Self> {
		let (error_tx, error_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);
		let shutdown = CancellationToken::new();
		let ingest_cancel = shutdown.child_token();

		Arc::new(Self {
			chain_id: client.chain_id(),
			client,
			contract,
			store,
			router,
			metrics,
			table: Arc::new(SubscriptionTable::new()),
			config,
			shutdown,
			shut_down: AtomicBool::new(false),
			started: AtomicBool::new(false),
			tasks: Mutex::new(JoinSet::new()),
			error_tx,
			error_rx: Mutex::new(Some(error_rx)),
			ingest_cancel: Mutex::new(ingest_cancel),
		})
	}

	pub fn chain_id(&self) -> ChainId {
		self.chain_id
	}

	/// The fulfillment processor, for the HTTP surface's manual path.
	pub fn fulfillments(&self) -> Arc<crate::processor::FulfillmentProcessor> {
		self.router.fulfillments()
	}

	/// Starts ingestion and the monitors. Idempotent.
	pub fn start(self: &Arc<Self>) {
		if self.started.swap(true, Ordering::SeqCst) {
			return;
		}
		info!(chain = %self.chain_id, kind = ?self.client.kind(), "starting chain service");

		self.spawn_ingestion();

		if let Some(error_rx) = self.error_rx.lock().unwrap_or_else(|e| e.into_inner()).take()
		{
			let this = self.clone();
			self.spawn_tracked("error-monitor", async move {
				this.run_error_monitor(error_rx).await;
			});
		}

		let this = self.clone();
		self.spawn_tracked("health-monitor", async move {
			this.run_health_monitor().await;
		});
	}

	/// Spawns a tracked task: counted, panic-safe, reported. A no-op
	/// once the service is shut down.
	pub fn spawn_tracked(
		self: &Arc<Self>,
		name: &str,
		fut: impl Future<Output = ()> + Send + 'static,
	) {
		if self.shut_down.load(Ordering::SeqCst) {
			debug!(chain = %self.chain_id, task = %name, "service shut down, not spawning");
			return;
		}

		self.metrics.task_started();
		let metrics = self.metrics.clone();
		let error_tx = self.error_tx.clone();
		let task = name.to_string();

		self.lock_tasks().spawn(async move {
			if let Err(panic) = AssertUnwindSafe(fut).catch_unwind().await {
				let message = panic_message(panic.as_ref());
				error!(task = %task, "task panicked: {}", message);
				let _ = error_tx
					.send(IndexerError::TaskPanicked { task, message })
					.await;
			}
			metrics.task_finished();
		});
	}

	/// Shutdown protocol: flag, cancel, unsubscribe, drain, join.
	pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
		if self.shut_down.swap(true, Ordering::SeqCst) {
			return Ok(());
		}
		info!(chain = %self.chain_id, "shutting down chain service");

		self.shutdown.cancel();
		self.table.cancel_all();
		// the error monitor drains the channel within its deadline
		// before it exits, unblocking any reporter

		let mut tasks = std::mem::take(&mut *self.lock_tasks());
		let joined = tokio::time::timeout(timeout, async {
			while tasks.join_next().await.is_some() {}
		})
		.await;

		match joined {
			Ok(()) => {
				info!(chain = %self.chain_id, "chain service stopped");
				Ok(())
			}
			Err(_) => {
				warn!(chain = %self.chain_id, "shutdown deadline exceeded, aborting tasks");
				tasks.abort_all();
				Err(IndexerError::ShutdownTimedOut(timeout))
			}
		}
	}

	/// Health policy.
	///
	/// During the startup grace period the service is assumed healthy.
	/// Push chains need their worker set plus a live subscription;
	/// pull chains need a recent successful poll.
	pub fn is_healthy(&self) -> bool {
		if self.metrics.uptime() < self.config.grace_period {
			return true;
		}
		match self.client.kind() {
			EndpointKind::Push => {
				self.metrics.active_tasks() >= 3 && self.table.count() >= 1
			}
			EndpointKind::Pull => {
				self.metrics.polling_healthy()
					&& self
						.metrics
						.polling_check_age()
						.map_or(false, |age| age <= self.config.max_polling_age)
			}
		}
	}

	/// Point-in-time metrics, including the live subscription count.
	pub fn metrics(&self) -> MetricsSnapshot {
		let mut snapshot = self.metrics.snapshot();
		snapshot.subscriptions = self.table.count() as u64;
		snapshot
	}

	/// Health probe for the service-wide checker.
	pub fn health_check(self: &Arc<Self>) -> Box<dyn HealthCheck> {
		Box::new(ServiceHealthCheck {
			name: format!("chain-{}", self.chain_id),
			service: self.clone(),
		})
	}

	/// (Re)starts ingestion under a fresh cancellation scope; any
	/// previous generation is cancelled first.
	fn spawn_ingestion(self: &Arc<Self>) {
		let token = {
			let mut guard = self.ingest_cancel.lock().unwrap_or_else(|e| e.into_inner());
			guard.cancel();
			*guard = self.shutdown.child_token();
			guard.clone()
		};

		let sink: Arc<dyn EventSink> = self.router.clone();

		match self.client.kind() {
			EndpointKind::Push => {
				let worker = SubscriptionWorker::new(
					self.client.clone(),
					self.contract,
					sink.clone(),
					self.metrics.clone(),
					self.table.clone(),
					self.error_tx.clone(),
					token.clone(),
					self.config.subscription.clone(),
				);
				self.spawn_tracked("subscription-worker", worker.run());

				// heal downtime between the stored resume point and now
				let backfill = CatchupPoller::new(
					self.client.clone(),
					self.contract,
					sink,
					self.store.clone(),
					self.metrics.clone(),
					token,
					self.config.poller.clone(),
				);
				self.spawn_tracked("backfill", backfill.run_until_caught_up());
			}
			EndpointKind::Pull => {
				let poller = CatchupPoller::new(
					self.client.clone(),
					self.contract,
					sink,
					self.store.clone(),
					self.metrics.clone(),
					token,
					self.config.poller.clone(),
				);
				self.spawn_tracked("catchup-poller", poller.run());
			}
		}
	}

	async fn run_error_monitor(self: Arc<Self>, mut error_rx: mpsc::Receiver<IndexerError>) {
		loop {
			tokio::select! {
				_ = self.shutdown.cancelled() => {
					// drain on a short deadline so blocked reporters
					// are released before the workgroup join
					let deadline =
						tokio::time::Instant::now() + self.config.error_drain_deadline;
					loop {
						match tokio::time::timeout_at(deadline, error_rx.recv()).await {
							Ok(Some(err)) => {
								debug!(chain = %self.chain_id, "drained error: {}", err)
							}
							Ok(None) | Err(_) => break,
						}
					}
					break;
				}
				maybe_err = error_rx.recv() => match maybe_err {
					Some(err) => self.handle_reported_error(err),
					None => break,
				}
			}
		}
	}

	fn handle_reported_error(self: &Arc<Self>, err: IndexerError) {
		match &err {
			IndexerError::SubscriptionFailed { .. } => {
				error!(chain = %self.chain_id, "critical: {}", err);
				self.spawn_ingestion();
			}
			IndexerError::TaskPanicked { .. } => {
				// the health monitor restarts ingestion if the panic
				// left the service below its worker quorum
				error!(chain = %self.chain_id, "critical: {}", err);
			}
			other => {
				warn!(chain = %self.chain_id, "worker error: {}", other);
			}
		}
	}

	async fn run_health_monitor(self: Arc<Self>) {
		let mut consecutive_unhealthy = 0u32;
		let mut ticker = tokio::time::interval(self.config.health_check_interval);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

		loop {
			tokio::select! {
				_ = self.shutdown.cancelled() => break,
				_ = ticker.tick() => {}
			}

			self.metrics.touch_health_check();
			if self.is_healthy() {
				consecutive_unhealthy = 0;
				continue;
			}

			consecutive_unhealthy += 1;
			warn!(
				chain = %self.chain_id,
				consecutive = consecutive_unhealthy,
				"chain service unhealthy"
			);
			if consecutive_unhealthy >= self.config.unhealthy_restart_threshold {
				warn!(chain = %self.chain_id, "restarting ingestion after repeated unhealthy checks");
				self.spawn_ingestion();
				consecutive_unhealthy = 0;
			}
		}
	}

	fn lock_tasks(&self) -> std::sync::MutexGuard<'_, JoinSet<()>> {
		self.tasks.lock().unwrap_or_else(|e| e.into_inner())
	}
}

struct ServiceHealthCheck {
	name: String,
	service: Arc<ChainService>,
}

#[async_trait::async_trait]
impl HealthCheck for ServiceHealthCheck {
	async fn check(&self) -> HealthStatus {
		HealthStatus::from_bool(self.service.is_healthy())
	}

	fn name(&self) -> &str {
		&self.name
	}
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
	if let Some(message) = panic.downcast_ref::<&str>() {
		(*message).to_string()
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message.clone()
	} else {
		"opaque panic payload".to_string()
	}
}
