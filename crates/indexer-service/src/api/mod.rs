//! HTTP API handlers and their error mapping.

pub mod dto;
pub mod fulfillments;
pub mod intents;
pub mod system;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use indexer_storage::StoreError;
use indexer_types::IndexerError;
use serde_json::json;
use tracing::error;

/// Error surface of the HTTP API.
///
/// Validation failures and duplicate writes map to 400, missing
/// records to 404, everything else to a logged 500.
#[derive(Debug)]
pub enum ApiError {
	Validation { field: String, message: String },
	Duplicate(String),
	NotFound,
	Internal(String),
}

impl ApiError {
	pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
		ApiError::Validation {
			field: field.into(),
			message: message.into(),
		}
	}
}

impl From<IndexerError> for ApiError {
	fn from(err: IndexerError) -> Self {
		match err {
			IndexerError::Validation { field, message } => ApiError::Validation { field, message },
			IndexerError::Duplicate(id) => ApiError::Duplicate(id),
			IndexerError::NotFound(_) => ApiError::NotFound,
			other => ApiError::Internal(other.to_string()),
		}
	}
}

impl From<StoreError> for ApiError {
	fn from(err: StoreError) -> Self {
		match err {
			StoreError::NotFound => ApiError::NotFound,
			StoreError::Duplicate(id) => ApiError::Duplicate(id),
			other => ApiError::Internal(other.to_string()),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		match self {
			ApiError::Validation { field, message } => (
				StatusCode::BAD_REQUEST,
				Json(json!({ "error": message, "field": field })),
			)
				.into_response(),
			ApiError::Duplicate(id) => (
				StatusCode::BAD_REQUEST,
				Json(json!({ "error": format!("duplicate id {}", id) })),
			)
				.into_response(),
			ApiError::NotFound => (
				StatusCode::NOT_FOUND,
				Json(json!({ "error": "not found" })),
			)
				.into_response(),
			ApiError::Internal(cause) => {
				error!("internal error serving request: {}", cause);
				(
					StatusCode::INTERNAL_SERVER_ERROR,
					Json(json!({ "error": "internal error" })),
				)
					.into_response()
			}
		}
	}
}
