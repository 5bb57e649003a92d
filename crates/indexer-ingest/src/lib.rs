//! Per-chain event ingestion: decoding, live subscriptions, catchup
//! polling.
//!
//! Logs enter through either the [`SubscriptionWorker`] (push endpoints)
//! or the [`CatchupPoller`] (pull endpoints and post-restart backfill),
//! are decoded into [`indexer_types::RawEvent`]s, and leave through an
//! [`EventSink`] — implemented by the core's event router. Both workers
//! are supervised: they accept a cancellation token and report
//! asynchronous failures on the supervisor's error channel.

use async_trait::async_trait;
use indexer_monitoring::ServiceMetrics;
use indexer_types::{IndexerError, Log, RawEvent, Result};
use std::time::Duration;
use tracing::{debug, warn};

pub mod backoff;
pub mod decoder;
pub mod poller;
pub mod subscription;
pub mod subscriptions;

pub use backoff::RetryBackoff;
pub use decoder::EventDecoder;
pub use poller::{CatchupPoller, PollerConfig};
pub use subscription::{SubscriptionConfig, SubscriptionWorker};
pub use subscriptions::SubscriptionTable;

/// Consumer of decoded events; the seam between ingestion and the
/// processors.
#[async_trait]
pub trait EventSink: Send + Sync {
	async fn deliver(&self, event: RawEvent) -> Result<()>;
}

/// Decodes one raw log and hands it to the sink under a bounded
/// deadline.
///
/// One policy for every failure class: log, count a processing error,
/// continue. A malformed log can never wedge ingestion, and a sink
/// failure (including a fulfillment whose intent has not arrived yet)
/// skips only the one log. The error is still returned so the catchup
/// poller can hold back its window commit on `MissingIntent`.
pub(crate) async fn deliver_log(
	decoder: &EventDecoder,
	sink: &dyn EventSink,
	metrics: &ServiceMetrics,
	log: Log,
	deadline: Duration,
) -> Result<()> {
	let tx_hash = log.transaction_hash;
	let block = log.block_number;

	let event = match decoder.decode(&log) {
		Ok(event) => event,
		Err(e) => {
			warn!(tx = %tx_hash, block, "skipping malformed log: {}", e);
			metrics.record_processing_error();
			return Err(e);
		}
	};

	match tokio::time::timeout(deadline, sink.deliver(event)).await {
		Ok(Ok(())) => Ok(()),
		Ok(Err(e)) => {
			match &e {
				IndexerError::MissingIntent(id) => {
					debug!(intent = %id, tx = %tx_hash, "fulfillment precedes its intent, left for catchup");
				}
				other => {
					warn!(tx = %tx_hash, block, "event processing failed: {}", other);
				}
			}
			metrics.record_processing_error();
			Err(e)
		}
		Err(_) => {
			warn!(tx = %tx_hash, block, deadline = ?deadline, "event processing timed out");
			metrics.record_processing_error();
			Err(IndexerError::Timeout(format!(
				"processing log in tx {}",
				tx_hash
			)))
		}
	}
}
