//! Service construction from configuration.

use anyhow::{Context, Result};
use indexer_chains::{ChainRegistry, EvmClient};
use indexer_config::IndexerConfig;
use indexer_core::processor::{EventRouter, FulfillmentProcessor, IntentProcessor};
use indexer_core::{ChainService, ChainServiceConfig};
use indexer_ingest::PollerConfig;
use indexer_monitoring::{HealthChecker, ServiceMetrics};
use indexer_storage::IntentStore;
use indexer_types::{Address, ChainId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

/// Everything the running service owns, built from the config.
pub struct Services {
	pub services: HashMap<ChainId, Arc<ChainService>>,
	pub fulfillments: HashMap<ChainId, Arc<FulfillmentProcessor>>,
	pub health: Arc<HealthChecker>,
}

/// Connects every configured chain and assembles its service stack.
///
/// The aggregation chain never gets a WebSocket connection, so its
/// client stays the pull variant and the supervisor runs the catchup
/// poller for it.
pub async fn build(config: &IndexerConfig, store: Arc<dyn IntentStore>) -> Result<Services> {
	let mut registry = ChainRegistry::new();

	for chain in &config.chains {
		let is_aggregation = chain.chain_id == config.indexer.aggregation_chain_id;
		let ws_endpoint = if is_aggregation {
			None
		} else {
			chain.ws_endpoint.clone()
		};

		let client = EvmClient::builder(chain.chain_id(), &chain.rpc_endpoint)
			.ws_endpoint(ws_endpoint)
			.auth_token(chain.auth_token.clone())
			.connect()
			.await
			.with_context(|| format!("connecting chain {}", chain.chain_id))?;
		registry.register(Arc::new(client))?;
	}

	let registry = Arc::new(registry);
	let health = Arc::new(HealthChecker::new());
	let mut services = HashMap::new();
	let mut fulfillments = HashMap::new();

	for chain in &config.chains {
		let chain_id = chain.chain_id();
		let client = registry.get_required(chain_id)?;
		let contract: Address = chain
			.contract_address
			.parse()
			.with_context(|| format!("chain {}: contract address", chain.chain_id))?;

		let metrics = Arc::new(ServiceMetrics::new());
		let intents = Arc::new(IntentProcessor::new(
			client.clone(),
			store.clone(),
			metrics.clone(),
		));
		let fulfillment = Arc::new(FulfillmentProcessor::new(
			client.clone(),
			registry.clone(),
			store.clone(),
			metrics.clone(),
		));
		let router = Arc::new(EventRouter::new(intents, fulfillment.clone()));

		let service_config = ChainServiceConfig {
			poller: PollerConfig {
				start_block: chain.start_block,
				..Default::default()
			},
			..Default::default()
		};
		let service = ChainService::new(
			client,
			contract,
			store.clone(),
			router,
			metrics,
			service_config,
		);

		health.register(service.health_check()).await;
		info!(
			chain = %chain_id,
			name = chain.name.as_deref().unwrap_or("unnamed"),
			"chain service assembled"
		);
		fulfillments.insert(chain_id, fulfillment);
		services.insert(chain_id, service);
	}

	Ok(Services {
		services,
		fulfillments,
		health,
	})
}
