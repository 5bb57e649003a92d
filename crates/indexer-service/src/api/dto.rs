//! Request/response shapes and field validation.

use super::ApiError;
use indexer_storage::Page;
use indexer_types::common::{canonical_address, is_hex_address, is_hex_id};
use indexer_types::{IntentStatus, U256};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Body of `POST /api/v1/intents`.
#[derive(Debug, Deserialize)]
pub struct CreateIntentRequest {
	pub id: String,
	pub source_chain: u64,
	pub destination_chain: u64,
	pub token: String,
	pub amount: String,
	pub recipient: String,
	pub sender: String,
	pub intent_fee: String,
}

/// Body of `POST /api/v1/fulfillments`.
#[derive(Debug, Deserialize)]
pub struct CreateFulfillmentRequest {
	pub intent_id: String,
	pub tx_hash: String,
	#[serde(default)]
	pub call_data: Option<String>,
}

/// Pagination and optional status filter query.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
	pub page: Option<u64>,
	pub page_size: Option<u64>,
	pub status: Option<String>,
}

/// One page of records plus the total matching count.
#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
	pub items: Vec<T>,
	pub page: u64,
	pub page_size: u64,
	pub total: u64,
}

impl ListQuery {
	/// Validates the window: `page >= 1`, `1 <= page_size <= 100`.
	pub fn page(&self) -> Result<Page, ApiError> {
		let number = self.page.unwrap_or(1);
		if number < 1 {
			return Err(ApiError::validation("page", "must be at least 1"));
		}
		let size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
		if size < 1 || size > MAX_PAGE_SIZE {
			return Err(ApiError::validation(
				"page_size",
				format!("must be between 1 and {}", MAX_PAGE_SIZE),
			));
		}
		Ok(Page::new(number, size))
	}

	pub fn status(&self) -> Result<Option<IntentStatus>, ApiError> {
		match &self.status {
			None => Ok(None),
			Some(raw) => IntentStatus::from_str(raw)
				.map(Some)
				.map_err(|e| ApiError::validation("status", e)),
		}
	}
}

/// Validates a 66-character `0x`-prefixed hex id or hash.
pub fn validate_id(field: &str, id: &str) -> Result<(), ApiError> {
	if is_hex_id(id) {
		Ok(())
	} else {
		Err(ApiError::validation(
			field,
			"must be a 66-character 0x-prefixed hex string",
		))
	}
}

/// Validates and canonicalizes an address parameter.
pub fn validate_address(field: &str, address: &str) -> Result<String, ApiError> {
	let canonical = canonical_address(address);
	if is_hex_address(&canonical) {
		Ok(canonical)
	} else {
		Err(ApiError::validation(
			field,
			"must be a 42-character 0x-prefixed hex address",
		))
	}
}

/// Validates a non-negative decimal amount of unbounded-integer shape.
pub fn validate_amount(field: &str, amount: &str) -> Result<(), ApiError> {
	if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
		return Err(ApiError::validation(
			field,
			"must be a non-negative decimal string",
		));
	}
	U256::from_dec_str(amount)
		.map(|_| ())
		.map_err(|_| ApiError::validation(field, "exceeds the representable range"))
}
