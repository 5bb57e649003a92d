//! Registry of chain clients, keyed by chain id.
//!
//! Built once at startup from the configured chains and shared behind
//! an `Arc`; lookups after that are read-only. The fulfillment processor
//! consults it to reach the destination chain of an intent; a miss is
//! non-fatal there, the processor falls back to its local client.

use indexer_types::{ChainClient, ChainId, IndexerError, Result};
use std::{collections::HashMap, fmt, sync::Arc};
use tracing::info;

/// Collection of chain clients; the cross-chain resolver.
pub struct ChainRegistry {
	clients: HashMap<ChainId, Arc<dyn ChainClient>>,
}

impl ChainRegistry {
	pub fn new() -> Self {
		Self {
			clients: HashMap::new(),
		}
	}

	/// Registers a client. Fails when the chain is already present.
	pub fn register(&mut self, client: Arc<dyn ChainClient>) -> Result<()> {
		let chain_id = client.chain_id();
		info!(chain = %chain_id, kind = ?client.kind(), "registering chain client");

		if self.clients.contains_key(&chain_id) {
			return Err(IndexerError::Config(format!(
				"chain {} already registered",
				chain_id
			)));
		}

		self.clients.insert(chain_id, client);
		Ok(())
	}

	/// Resolves the client for a chain, if configured.
	pub fn get(&self, chain_id: ChainId) -> Option<Arc<dyn ChainClient>> {
		self.clients.get(&chain_id).cloned()
	}

	/// Resolves the client for a chain, erroring when absent.
	pub fn get_required(&self, chain_id: ChainId) -> Result<Arc<dyn ChainClient>> {
		self.get(chain_id)
			.ok_or_else(|| IndexerError::NotFound(format!("chain {} not configured", chain_id)))
	}

	/// All registered chain ids, in no particular order.
	pub fn chains(&self) -> Vec<ChainId> {
		self.clients.keys().copied().collect()
	}

	pub fn len(&self) -> usize {
		self.clients.len()
	}

	pub fn is_empty(&self) -> bool {
		self.clients.is_empty()
	}
}

impl Default for ChainRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl fmt::Debug for ChainRegistry {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ChainRegistry")
			.field("chains", &self.clients.keys().collect::<Vec<_>>())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use async_trait::async_trait;
	use indexer_types::{
		BlockNumber, EndpointKind, Log, LogFilter, LogSubscription, Receipt, Timestamp,
		TransactionInfo, TxHash,
	};

	struct MockClient {
		chain_id: ChainId,
		kind: EndpointKind,
	}

	#[async_trait]
	impl ChainClient for MockClient {
		fn chain_id(&self) -> ChainId {
			self.chain_id
		}

		fn kind(&self) -> EndpointKind {
			self.kind
		}

		async fn head_block(&self) -> Result<BlockNumber> {
			Ok(100)
		}

		async fn transaction_by_hash(
			&self,
			_: TxHash,
		) -> Result<(Option<TransactionInfo>, bool)> {
			Ok((None, false))
		}

		async fn transaction_receipt(&self, _: TxHash) -> Result<Option<Receipt>> {
			Ok(None)
		}

		async fn block_timestamp(&self, _: BlockNumber) -> Result<Timestamp> {
			Ok(0)
		}

		async fn get_logs(&self, _: &LogFilter) -> Result<Vec<Log>> {
			Ok(vec![])
		}

		async fn subscribe_logs(&self, _: &LogFilter) -> Result<LogSubscription> {
			Err(IndexerError::SubscriptionUnsupported(self.chain_id))
		}
	}

	#[test]
	fn test_register_and_get() {
		let mut registry = ChainRegistry::new();
		registry
			.register(Arc::new(MockClient {
				chain_id: ChainId(1),
				kind: EndpointKind::Push,
			}))
			.unwrap();

		assert_eq!(registry.get(ChainId(1)).unwrap().chain_id(), ChainId(1));
		assert!(registry.get(ChainId(2)).is_none());
	}

	#[test]
	fn test_duplicate_registration_fails() {
		let mut registry = ChainRegistry::new();
		let make = || {
			Arc::new(MockClient {
				chain_id: ChainId(1),
				kind: EndpointKind::Pull,
			})
		};

		registry.register(make()).unwrap();
		assert!(registry.register(make()).is_err());
	}

	#[test]
	fn test_get_required() {
		let mut registry = ChainRegistry::new();
		registry
			.register(Arc::new(MockClient {
				chain_id: ChainId(7000),
				kind: EndpointKind::Pull,
			}))
			.unwrap();

		assert!(registry.get_required(ChainId(7000)).is_ok());
		assert!(matches!(
			registry.get_required(ChainId(8453)),
			Err(IndexerError::NotFound(_))
		));
	}

	#[test]
	fn test_chains_listing() {
		let mut registry = ChainRegistry::new();
		assert!(registry.is_empty());

		for id in [1u64, 42161] {
			registry
				.register(Arc::new(MockClient {
					chain_id: ChainId(id),
					kind: EndpointKind::Push,
				}))
				.unwrap();
		}

		let chains = registry.chains();
		assert_eq!(chains.len(), 2);
		assert!(chains.contains(&ChainId(1)));
		assert!(chains.contains(&ChainId(42161)));
	}
}
