//! Tracing subscriber initialization for the service binary.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_level` (e.g. `"info"`
/// or a full filter directive) applies. Calling this twice fails, so
/// it belongs in `main` only.
pub fn init_tracing(default_level: &str) -> Result<(), Box<dyn std::error::Error>> {
	let env_filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.try_init()?;

	Ok(())
}
