//! Configuration structures.

use indexer_types::ChainId;
use serde::{Deserialize, Serialize};

/// Top-level service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerConfig {
	#[serde(default)]
	pub api: ApiConfig,
	#[serde(default)]
	pub indexer: IndexerSettings,
	#[serde(default)]
	pub chains: Vec<ChainConfig>,
}

/// HTTP API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
	#[serde(default = "default_host")]
	pub host: String,
	#[serde(default = "default_port")]
	pub port: u16,
	/// Allowed CORS origins; `*` allows any.
	#[serde(default = "default_cors_origins")]
	pub cors_origins: Vec<String>,
}

/// Indexer-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexerSettings {
	/// Chain served by polling only; it never gets a log subscription.
	#[serde(default = "default_aggregation_chain_id")]
	pub aggregation_chain_id: u64,
	/// Default tracing filter when `RUST_LOG` is unset.
	#[serde(default = "default_log_level")]
	pub request_log_verbosity: String,
}

/// Per-chain connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
	pub chain_id: u64,
	#[serde(default)]
	pub name: Option<String>,
	/// HTTP/HTTPS JSON-RPC endpoint URL.
	pub rpc_endpoint: String,
	/// WebSocket endpoint; presence selects the push variant.
	#[serde(default)]
	pub ws_endpoint: Option<String>,
	/// Intent contract observed on this chain.
	pub contract_address: String,
	/// Bearer token attached to RPC requests, if the endpoint wants one.
	#[serde(default)]
	pub auth_token: Option<String>,
	/// Backfill override: first block to scan when the store holds no
	/// resume point.
	#[serde(default)]
	pub start_block: Option<u64>,
}

impl ChainConfig {
	pub fn chain_id(&self) -> ChainId {
		ChainId(self.chain_id)
	}
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			host: default_host(),
			port: default_port(),
			cors_origins: default_cors_origins(),
		}
	}
}

impl Default for IndexerSettings {
	fn default() -> Self {
		Self {
			aggregation_chain_id: default_aggregation_chain_id(),
			request_log_verbosity: default_log_level(),
		}
	}
}

impl Default for IndexerConfig {
	fn default() -> Self {
		Self {
			api: ApiConfig::default(),
			indexer: IndexerSettings::default(),
			chains: Vec::new(),
		}
	}
}

fn default_host() -> String {
	"0.0.0.0".to_string()
}

fn default_port() -> u16 {
	8080
}

fn default_cors_origins() -> Vec<String> {
	vec!["*".to_string()]
}

fn default_aggregation_chain_id() -> u64 {
	ChainId::DEFAULT_AGGREGATION.0
}

fn default_log_level() -> String {
	"info".to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_defaults() {
		let config = IndexerConfig::default();
		assert_eq!(config.api.host, "0.0.0.0");
		assert_eq!(config.api.port, 8080);
		assert_eq!(config.api.cors_origins, vec!["*".to_string()]);
		assert_eq!(config.indexer.aggregation_chain_id, 7000);
		assert!(config.chains.is_empty());
	}

	#[test]
	fn test_minimal_chain_entry_deserializes() {
		let chain: ChainConfig = toml::from_str(
			r#"
			chain_id = 8453
			rpc_endpoint = "https://base.example.com"
			contract_address = "0xcccccccccccccccccccccccccccccccccccccccc"
			"#,
		)
		.unwrap();

		assert_eq!(chain.chain_id(), ChainId(8453));
		assert!(chain.ws_endpoint.is_none());
		assert!(chain.start_block.is_none());
	}
}
