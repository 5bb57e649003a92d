//! Fulfillment read/write handlers.

use super::dto::{validate_id, CreateFulfillmentRequest, ListQuery, ListResponse};
use super::ApiError;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::Json;
use indexer_types::Fulfillment;
use tracing::info;

/// `POST /api/v1/fulfillments`
///
/// The manual creation path: the fulfiller agent reports a delivery by
/// `(intent_id, tx_hash)`. Runs through the same processor as the
/// event path, minus decoding.
pub async fn create(
	State(state): State<AppState>,
	Json(body): Json<CreateFulfillmentRequest>,
) -> Result<Json<Fulfillment>, ApiError> {
	validate_id("intent_id", &body.intent_id)?;
	validate_id("tx_hash", &body.tx_hash)?;

	let intent_id = body.intent_id.to_lowercase();
	let intent = state.store.get_intent(&intent_id).await?;

	let processor = state
		.fulfillment_processor_for(intent.destination_chain)
		.ok_or_else(|| ApiError::Internal("no chain services configured".to_string()))?;

	let fulfillment = processor
		.create_manual(&intent_id, &body.tx_hash.to_lowercase(), body.call_data)
		.await?;
	info!(intent = %fulfillment.id, "fulfillment created via api");
	Ok(Json(fulfillment))
}

/// `GET /api/v1/fulfillments/{id}`
pub async fn get_by_id(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Fulfillment>, ApiError> {
	validate_id("id", &id)?;
	let fulfillment = state.store.get_fulfillment(&id.to_lowercase()).await?;
	Ok(Json(fulfillment))
}

/// `GET /api/v1/fulfillments?page&page_size`
pub async fn list(
	State(state): State<AppState>,
	Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<Fulfillment>>, ApiError> {
	let page = query.page()?;
	let (items, total) = state.store.list_fulfillments(page).await?;
	Ok(Json(ListResponse {
		items,
		page: page.number,
		page_size: page.size,
		total,
	}))
}
