//! Configuration loading from files and environment.

use crate::types::IndexerConfig;
use crate::ConfigError;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

/// Loads, overrides, and validates service configuration.
pub struct ConfigLoader;

impl ConfigLoader {
	/// Loads a TOML config file, applies environment overrides, and
	/// validates the result.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<IndexerConfig, ConfigError> {
		let path = path.as_ref();
		info!(path = %path.display(), "loading configuration");

		let contents = std::fs::read_to_string(path)?;
		let mut config = Self::from_toml(&contents)?;
		Self::apply_env_overrides(&mut config);
		Self::validate(&config)?;
		Ok(config)
	}

	/// Parses a TOML string without validation.
	pub fn from_toml(contents: &str) -> Result<IndexerConfig, ConfigError> {
		toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
	}

	/// Environment overrides for scalar settings:
	/// `INDEXER_API_HOST`, `INDEXER_API_PORT`, `INDEXER_LOG`, and
	/// `RPC_URL_<chain id>` / `RPC_AUTH_TOKEN_<chain id>` per chain.
	fn apply_env_overrides(config: &mut IndexerConfig) {
		if let Ok(host) = std::env::var("INDEXER_API_HOST") {
			debug!("overriding api.host from environment");
			config.api.host = host;
		}
		if let Ok(port) = std::env::var("INDEXER_API_PORT") {
			if let Ok(port) = port.parse() {
				debug!("overriding api.port from environment");
				config.api.port = port;
			}
		}
		if let Ok(level) = std::env::var("INDEXER_LOG") {
			config.indexer.request_log_verbosity = level;
		}

		for (key, value) in std::env::vars() {
			if let Some(id) = key.strip_prefix("RPC_URL_") {
				if let Ok(id) = id.parse::<u64>() {
					if let Some(chain) = config.chains.iter_mut().find(|c| c.chain_id == id) {
						debug!(chain = id, "overriding rpc endpoint from environment");
						chain.rpc_endpoint = value;
					}
				}
			} else if let Some(id) = key.strip_prefix("RPC_AUTH_TOKEN_") {
				if let Ok(id) = id.parse::<u64>() {
					if let Some(chain) = config.chains.iter_mut().find(|c| c.chain_id == id) {
						debug!(chain = id, "overriding rpc auth token from environment");
						chain.auth_token = Some(value);
					}
				}
			}
		}
	}

	/// Structural validation beyond what serde enforces.
	pub fn validate(config: &IndexerConfig) -> Result<(), ConfigError> {
		if config.api.port == 0 {
			return Err(ConfigError::Invalid("api.port must be non-zero".into()));
		}
		if config.chains.is_empty() {
			return Err(ConfigError::Invalid(
				"at least one chain must be configured".into(),
			));
		}

		let mut seen = HashSet::new();
		for chain in &config.chains {
			if !seen.insert(chain.chain_id) {
				return Err(ConfigError::Invalid(format!(
					"chain {} configured twice",
					chain.chain_id
				)));
			}

			if !chain.rpc_endpoint.starts_with("http://")
				&& !chain.rpc_endpoint.starts_with("https://")
			{
				return Err(ConfigError::Invalid(format!(
					"chain {}: rpc_endpoint must be http(s)",
					chain.chain_id
				)));
			}

			if let Some(ws) = &chain.ws_endpoint {
				if !ws.starts_with("ws://") && !ws.starts_with("wss://") {
					return Err(ConfigError::Invalid(format!(
						"chain {}: ws_endpoint must be ws(s)",
						chain.chain_id
					)));
				}
			}

			if !indexer_types::common::is_hex_address(&chain.contract_address) {
				return Err(ConfigError::Invalid(format!(
					"chain {}: contract_address must be a 42-character hex address",
					chain.chain_id
				)));
			}

			// the aggregation chain cannot subscribe; a ws endpoint
			// there is a configuration mistake
			if chain.chain_id == config.indexer.aggregation_chain_id
				&& chain.ws_endpoint.is_some()
			{
				return Err(ConfigError::Invalid(format!(
					"chain {} is the aggregation chain and must not configure ws_endpoint",
					chain.chain_id
				)));
			}
		}

		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	const VALID: &str = r#"
		[api]
		host = "127.0.0.1"
		port = 9090
		cors_origins = ["https://app.example.com"]

		[indexer]
		aggregation_chain_id = 7000

		[[chains]]
		chain_id = 8453
		name = "base"
		rpc_endpoint = "https://base.example.com"
		ws_endpoint = "wss://base.example.com"
		contract_address = "0xcccccccccccccccccccccccccccccccccccccccc"

		[[chains]]
		chain_id = 7000
		rpc_endpoint = "https://aggregation.example.com"
		contract_address = "0xdddddddddddddddddddddddddddddddddddddddd"
		start_block = 100
	"#;

	#[test]
	fn test_load_valid_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		file.write_all(VALID.as_bytes()).unwrap();

		let config = ConfigLoader::from_file(file.path()).unwrap();
		assert_eq!(config.api.port, 9090);
		assert_eq!(config.chains.len(), 2);
		assert_eq!(config.chains[0].name.as_deref(), Some("base"));
		assert_eq!(config.chains[1].start_block, Some(100));
	}

	#[test]
	fn test_missing_file_errors() {
		assert!(matches!(
			ConfigLoader::from_file("/nonexistent/indexer.toml"),
			Err(ConfigError::Io(_))
		));
	}

	#[test]
	fn test_rejects_no_chains() {
		let config = ConfigLoader::from_toml("[api]\nport = 8080\n").unwrap();
		assert!(matches!(
			ConfigLoader::validate(&config),
			Err(ConfigError::Invalid(_))
		));
	}

	#[test]
	fn test_rejects_duplicate_chain_ids() {
		let mut config = ConfigLoader::from_toml(VALID).unwrap();
		let duplicate = config.chains[0].clone();
		config.chains.push(duplicate);
		assert!(ConfigLoader::validate(&config).is_err());
	}

	#[test]
	fn test_rejects_bad_endpoint_schemes() {
		let mut config = ConfigLoader::from_toml(VALID).unwrap();
		config.chains[0].rpc_endpoint = "ftp://nope".to_string();
		assert!(ConfigLoader::validate(&config).is_err());

		let mut config = ConfigLoader::from_toml(VALID).unwrap();
		config.chains[0].ws_endpoint = Some("https://not-ws".to_string());
		assert!(ConfigLoader::validate(&config).is_err());
	}

	#[test]
	fn test_rejects_bad_contract_address() {
		let mut config = ConfigLoader::from_toml(VALID).unwrap();
		config.chains[0].contract_address = "0x1234".to_string();
		assert!(ConfigLoader::validate(&config).is_err());
	}

	#[test]
	fn test_rejects_ws_on_aggregation_chain() {
		let mut config = ConfigLoader::from_toml(VALID).unwrap();
		config.chains[1].ws_endpoint = Some("wss://aggregation.example.com".to_string());
		assert!(ConfigLoader::validate(&config).is_err());
	}

	#[test]
	fn test_parse_error_is_reported() {
		assert!(matches!(
			ConfigLoader::from_toml("not toml at all ["),
			Err(ConfigError::Parse(_))
		));
	}
}
