//! Intent read/write handlers.

use super::dto::{
	validate_address, validate_amount, validate_id, CreateIntentRequest, ListQuery, ListResponse,
};
use super::ApiError;
use crate::server::AppState;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use indexer_types::{Intent, IntentStatus};
use tracing::info;

/// `POST /api/v1/intents`
pub async fn create(
	State(state): State<AppState>,
	Json(body): Json<CreateIntentRequest>,
) -> Result<(StatusCode, Json<Intent>), ApiError> {
	validate_id("id", &body.id)?;
	let asset = validate_address("token", &body.token)?;
	let recipient = validate_address("recipient", &body.recipient)?;
	let sender = validate_address("sender", &body.sender)?;
	validate_amount("amount", &body.amount)?;
	validate_amount("intent_fee", &body.intent_fee)?;
	if body.source_chain == 0 {
		return Err(ApiError::validation("source_chain", "must be non-zero"));
	}
	if body.destination_chain == 0 {
		return Err(ApiError::validation("destination_chain", "must be non-zero"));
	}

	let now = Utc::now();
	let intent = Intent {
		id: body.id.to_lowercase(),
		source_chain: body.source_chain,
		destination_chain: body.destination_chain,
		asset,
		amount: body.amount,
		recipient,
		sender,
		intent_fee: body.intent_fee,
		status: IntentStatus::Pending,
		is_call: false,
		call_data: None,
		created_at: now,
		updated_at: now,
	};

	state.store.create_intent(intent.clone()).await?;
	info!(intent = %intent.id, "intent created via api");
	Ok((StatusCode::CREATED, Json(intent)))
}

/// `GET /api/v1/intents/{id}`
pub async fn get_by_id(
	State(state): State<AppState>,
	Path(id): Path<String>,
) -> Result<Json<Intent>, ApiError> {
	validate_id("id", &id)?;
	let intent = state.store.get_intent(&id.to_lowercase()).await?;
	Ok(Json(intent))
}

/// `GET /api/v1/intents?page&page_size&status`
pub async fn list(
	State(state): State<AppState>,
	Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<Intent>>, ApiError> {
	let page = query.page()?;
	let status = query.status()?;
	let (items, total) = state.store.list_intents(page, status).await?;
	Ok(Json(ListResponse {
		items,
		page: page.number,
		page_size: page.size,
		total,
	}))
}

/// `GET /api/v1/intents/sender/{address}?page&page_size`
pub async fn list_by_sender(
	State(state): State<AppState>,
	Path(address): Path<String>,
	Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<Intent>>, ApiError> {
	let sender = validate_address("address", &address)?;
	let page = query.page()?;
	let (items, total) = state.store.list_intents_by_sender(&sender, page).await?;
	Ok(Json(ListResponse {
		items,
		page: page.number,
		page_size: page.size,
		total,
	}))
}

/// `GET /api/v1/intents/recipient/{address}?page&page_size`
pub async fn list_by_recipient(
	State(state): State<AppState>,
	Path(address): Path<String>,
	Query(query): Query<ListQuery>,
) -> Result<Json<ListResponse<Intent>>, ApiError> {
	let recipient = validate_address("address", &address)?;
	let page = query.page()?;
	let (items, total) = state
		.store
		.list_intents_by_recipient(&recipient, page)
		.await?;
	Ok(Json(ListResponse {
		items,
		page: page.number,
		page_size: page.size,
		total,
	}))
}
