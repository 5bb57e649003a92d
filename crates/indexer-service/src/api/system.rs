//! Health and metrics handlers.

use crate::server::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use indexer_monitoring::MetricsSnapshot;
use serde_json::json;
use std::collections::HashMap;

/// `GET /health` and `GET /api/v1/health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
	if state.health.overall().await.is_healthy() {
		(StatusCode::OK, Json(json!({ "status": "ok" })))
	} else {
		(
			StatusCode::SERVICE_UNAVAILABLE,
			Json(json!({ "status": "unhealthy" })),
		)
	}
}

/// `GET /api/v1/metrics` — per-chain service counters.
pub async fn metrics(State(state): State<AppState>) -> Json<HashMap<String, MetricsSnapshot>> {
	let snapshots = state
		.services
		.iter()
		.map(|(chain_id, service)| (chain_id.to_string(), service.metrics()))
		.collect();
	Json(snapshots)
}

#[cfg(test)]
mod tests {
	use crate::server::testing::{make_app, request};
	use axum::http::{Method, StatusCode};

	#[tokio::test]
	async fn test_health_endpoint() {
		let (app, _store) = make_app();

		let (status, body) = request(&app, Method::GET, "/health", None).await;
		assert_eq!(status, StatusCode::OK);
		assert_eq!(body["status"], "ok");

		let (status, _) = request(&app, Method::GET, "/api/v1/health", None).await;
		assert_eq!(status, StatusCode::OK);
	}

	#[tokio::test]
	async fn test_metrics_endpoint_empty_services() {
		let (app, _store) = make_app();

		let (status, body) = request(&app, Method::GET, "/api/v1/metrics", None).await;
		assert_eq!(status, StatusCode::OK);
		assert!(body.as_object().unwrap().is_empty());
	}
}
