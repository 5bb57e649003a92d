//! Configuration types and loading for the indexer service.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{ApiConfig, ChainConfig, IndexerConfig, IndexerSettings};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file: {0}")]
	Io(#[from] std::io::Error),

	#[error("failed to parse config: {0}")]
	Parse(String),

	#[error("invalid configuration: {0}")]
	Invalid(String),
}
