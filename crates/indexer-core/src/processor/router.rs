//! Event routing from the ingestion pipeline into the processors.

use super::{FulfillmentProcessor, IntentProcessor};
use async_trait::async_trait;
use indexer_ingest::EventSink;
use indexer_types::{RawEvent, Result};
use std::sync::Arc;

/// Dispatches decoded events to the processor for their kind. The
/// ingestion side counts failures; this stays a pure fan-out.
pub struct EventRouter {
	intents: Arc<IntentProcessor>,
	fulfillments: Arc<FulfillmentProcessor>,
}

impl EventRouter {
	pub fn new(intents: Arc<IntentProcessor>, fulfillments: Arc<FulfillmentProcessor>) -> Self {
		Self {
			intents,
			fulfillments,
		}
	}

	pub fn fulfillments(&self) -> Arc<FulfillmentProcessor> {
		self.fulfillments.clone()
	}
}

#[async_trait]
impl EventSink for EventRouter {
	async fn deliver(&self, event: RawEvent) -> Result<()> {
		if event.kind.is_initiation() {
			self.intents.process(&event).await
		} else {
			self.fulfillments.process(&event).await
		}
	}
}
