//! HTTP server for the indexer API.
//!
//! Routes live under `/api/v1`; `/health` is additionally exposed at
//! the root for load balancers. Middleware applies a 10-second
//! per-request timeout, CORS from the configured origins, panic
//! recovery returning 500, and request tracing. Connection-level
//! limits (15 s read/write, 60 s idle, 1 MiB header cap) are the
//! hyper server defaults.

use crate::api::{fulfillments, intents, system};
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use indexer_config::ApiConfig;
use indexer_core::processor::FulfillmentProcessor;
use indexer_core::ChainService;
use indexer_monitoring::HealthChecker;
use indexer_storage::IntentStore;
use indexer_types::ChainId;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state of the API handlers.
#[derive(Clone)]
pub struct AppState {
	pub store: Arc<dyn IntentStore>,
	/// Fulfillment processors by observing chain, for the manual
	/// creation path.
	pub fulfillments: Arc<HashMap<ChainId, Arc<FulfillmentProcessor>>>,
	pub services: Arc<HashMap<ChainId, Arc<ChainService>>>,
	pub health: Arc<HealthChecker>,
}

impl AppState {
	/// Processor serving an intent's destination chain, or any
	/// configured processor as a fallback.
	pub fn fulfillment_processor_for(
		&self,
		destination_chain: u64,
	) -> Option<Arc<FulfillmentProcessor>> {
		self.fulfillments
			.get(&ChainId(destination_chain))
			.cloned()
			.or_else(|| self.fulfillments.values().next().cloned())
	}
}

/// Builds the application router with all middleware applied.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
	let api = Router::new()
		.route("/intents", post(intents::create).get(intents::list))
		.route("/intents/{id}", get(intents::get_by_id))
		.route("/intents/sender/{address}", get(intents::list_by_sender))
		.route(
			"/intents/recipient/{address}",
			get(intents::list_by_recipient),
		)
		.route(
			"/fulfillments",
			post(fulfillments::create).get(fulfillments::list),
		)
		.route("/fulfillments/{id}", get(fulfillments::get_by_id))
		.route("/health", get(system::health))
		.route("/metrics", get(system::metrics));

	Router::new()
		.nest("/api/v1", api)
		.route("/health", get(system::health))
		.layer(
			ServiceBuilder::new()
				.layer(TraceLayer::new_for_http())
				.layer(CatchPanicLayer::new())
				.layer(TimeoutLayer::new(REQUEST_TIMEOUT))
				.layer(cors_layer(cors_origins)),
		)
		.with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
	if origins.iter().any(|origin| origin == "*") {
		return CorsLayer::permissive();
	}
	let allowed: Vec<HeaderValue> = origins
		.iter()
		.filter_map(|origin| origin.parse().ok())
		.collect();
	CorsLayer::new()
		.allow_origin(allowed)
		.allow_methods(Any)
		.allow_headers(Any)
}

/// Binds and serves the API until the shutdown future resolves.
pub async fn serve(
	state: AppState,
	api_config: &ApiConfig,
	shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
	let app = router(state, &api_config.cors_origins);
	let bind_address = format!("{}:{}", api_config.host, api_config.port);
	let listener = TcpListener::bind(&bind_address).await?;

	info!(address = %bind_address, "api server listening");
	axum::serve(listener, app)
		.with_graceful_shutdown(shutdown)
		.await
}

#[cfg(test)]
pub(crate) mod testing {
	use super::*;
	use async_trait::async_trait;
	use axum::body::Body;
	use axum::http::{header, Method, Request, StatusCode};
	use indexer_chains::ChainRegistry;
	use indexer_monitoring::ServiceMetrics;
	use indexer_storage::MemoryStore;
	use indexer_types::{
		BlockNumber, ChainClient, EndpointKind, IndexerError, Log, LogFilter, LogSubscription,
		Receipt, Result, Timestamp, TransactionInfo, TxHash,
	};
	use serde_json::Value;
	use tower::ServiceExt;

	struct StubClient;

	#[async_trait]
	impl ChainClient for StubClient {
		fn chain_id(&self) -> ChainId {
			ChainId(42)
		}

		fn kind(&self) -> EndpointKind {
			EndpointKind::Pull
		}

		async fn head_block(&self) -> Result<BlockNumber> {
			Ok(100)
		}

		async fn transaction_by_hash(
			&self,
			hash: TxHash,
		) -> Result<(Option<TransactionInfo>, bool)> {
			Ok((
				Some(TransactionInfo {
					hash,
					from: indexer_types::Address::from([0x11u8; 20]),
					to: None,
					block_number: Some(100),
				}),
				false,
			))
		}

		async fn transaction_receipt(&self, hash: TxHash) -> Result<Option<Receipt>> {
			Ok(Some(Receipt {
				transaction_hash: hash,
				block_number: 100,
				status: true,
			}))
		}

		async fn block_timestamp(&self, _: BlockNumber) -> Result<Timestamp> {
			Ok(1_700_000_000)
		}

		async fn get_logs(&self, _: &LogFilter) -> Result<Vec<Log>> {
			Ok(vec![])
		}

		async fn subscribe_logs(&self, _: &LogFilter) -> Result<LogSubscription> {
			Err(IndexerError::SubscriptionUnsupported(ChainId(42)))
		}
	}

	pub(crate) fn make_state() -> (AppState, Arc<MemoryStore>) {
		let store = Arc::new(MemoryStore::new());
		let processor = Arc::new(FulfillmentProcessor::new(
			Arc::new(StubClient),
			Arc::new(ChainRegistry::new()),
			store.clone(),
			Arc::new(ServiceMetrics::new()),
		));

		let mut fulfillments = HashMap::new();
		fulfillments.insert(ChainId(42), processor);

		let state = AppState {
			store: store.clone(),
			fulfillments: Arc::new(fulfillments),
			services: Arc::new(HashMap::new()),
			health: Arc::new(HealthChecker::new()),
		};
		(state, store)
	}

	pub(crate) fn make_app() -> (Router, Arc<MemoryStore>) {
		let (state, store) = make_state();
		(router(state, &["*".to_string()]), store)
	}

	pub(crate) async fn request(
		app: &Router,
		method: Method,
		uri: &str,
		body: Option<Value>,
	) -> (StatusCode, Value) {
		let builder = Request::builder().method(method).uri(uri);
		let request = match body {
			Some(value) => builder
				.header(header::CONTENT_TYPE, "application/json")
				.body(Body::from(value.to_string())),
			None => builder.body(Body::empty()),
		}
		.expect("request construction");

		let response = app.clone().oneshot(request).await.expect("request served");
		let status = response.status();
		let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
			.await
			.expect("body read");
		let value = if bytes.is_empty() {
			Value::Null
		} else {
			serde_json::from_slice(&bytes).expect("json body")
		};
		(status, value)
	}
}
