//! # Intent Indexer Binary
//!
//! Entry point for the cross-chain intent indexer: loads
//! configuration, connects the chain clients, starts one supervised
//! service per chain, serves the HTTP API, and shuts everything down
//! in order on SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indexer_config::ConfigLoader;
use indexer_monitoring::tracing::init_tracing;
use indexer_storage::{IntentStore, MemoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{info, warn};

mod api;
mod bootstrap;
mod server;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Command-line interface for the indexer service.
#[derive(Parser)]
#[command(name = "intent-indexer")]
#[command(about = "Cross-chain intent indexer", long_about = None)]
struct Cli {
	/// Subcommand to execute
	#[command(subcommand)]
	command: Option<Commands>,

	/// Path to configuration file
	#[arg(short, long, value_name = "FILE", default_value = "config/indexer.toml")]
	config: PathBuf,

	/// Logging level; falls back to the config file, then "info"
	#[arg(long, env = "INDEXER_LOG_LEVEL")]
	log_level: Option<String>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
	/// Start the indexer service
	Start,
	/// Validate the configuration file without starting services
	Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	match cli.command {
		Some(Commands::Validate) => validate_config(cli),
		Some(Commands::Start) | None => start_service(cli).await,
	}
}

async fn start_service(cli: Cli) -> Result<()> {
	let config = ConfigLoader::from_file(&cli.config).context("loading configuration")?;

	let log_level = cli
		.log_level
		.unwrap_or_else(|| config.indexer.request_log_verbosity.clone());
	init_tracing(&log_level).map_err(|e| anyhow::anyhow!("initializing tracing: {}", e))?;

	info!(
		chains = config.chains.len(),
		api_port = config.api.port,
		"starting intent indexer"
	);

	// the in-memory reference backend; a relational store plugs in
	// through the same trait
	let store: Arc<dyn IntentStore> = Arc::new(MemoryStore::new());

	let built = bootstrap::build(&config, store.clone())
		.await
		.context("building chain services")?;

	for service in built.services.values() {
		service.start();
	}

	let state = server::AppState {
		store,
		fulfillments: Arc::new(built.fulfillments),
		services: Arc::new(built.services.clone()),
		health: built.health,
	};

	server::serve(state, &config.api, shutdown_signal())
		.await
		.context("api server")?;

	info!("shutdown signal received, stopping chain services");
	for service in built.services.values() {
		if let Err(e) = service.shutdown(SHUTDOWN_TIMEOUT).await {
			warn!(chain = %service.chain_id(), "shutdown incomplete: {}", e);
		}
	}

	info!("intent indexer stopped");
	Ok(())
}

fn validate_config(cli: Cli) -> Result<()> {
	let config = ConfigLoader::from_file(&cli.config).context("loading configuration")?;

	println!("configuration is valid");
	println!("api: {}:{}", config.api.host, config.api.port);
	println!(
		"aggregation chain: {}",
		config.indexer.aggregation_chain_id
	);
	for chain in &config.chains {
		let mode = if chain.chain_id == config.indexer.aggregation_chain_id
			|| chain.ws_endpoint.is_none()
		{
			"poll"
		} else {
			"subscribe"
		};
		println!(
			"  chain {} ({}): {} [{}]",
			chain.chain_id,
			chain.name.as_deref().unwrap_or("unnamed"),
			chain.rpc_endpoint,
			mode
		);
	}

	Ok(())
}

async fn shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
