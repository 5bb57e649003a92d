//! Persisted entities: intents and their fulfillments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an intent.
///
/// Transitions are monotone along `pending -> fulfilled -> settled`;
/// `failed` is a terminal sink reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentStatus {
	Pending,
	Fulfilled,
	Settled,
	Failed,
}

impl IntentStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			IntentStatus::Pending => "pending",
			IntentStatus::Fulfilled => "fulfilled",
			IntentStatus::Settled => "settled",
			IntentStatus::Failed => "failed",
		}
	}

	/// Whether moving to `next` respects the monotone lifecycle.
	/// Re-asserting the current status is a no-op and always legal.
	pub fn can_transition_to(&self, next: IntentStatus) -> bool {
		use IntentStatus::*;
		if *self == next {
			return true;
		}
		match (*self, next) {
			(Pending, Fulfilled) => true,
			(Fulfilled, Settled) => true,
			(Pending, Failed) | (Fulfilled, Failed) | (Settled, Failed) => true,
			_ => false,
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, IntentStatus::Failed)
	}
}

impl fmt::Display for IntentStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for IntentStatus {
	type Err = String;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s {
			"pending" => Ok(IntentStatus::Pending),
			"fulfilled" => Ok(IntentStatus::Fulfilled),
			"settled" => Ok(IntentStatus::Settled),
			"failed" => Ok(IntentStatus::Failed),
			other => Err(format!("unknown intent status: {}", other)),
		}
	}
}

/// A user's declared cross-chain transfer request.
///
/// Identified by the 32-byte on-chain intent id, rendered as a
/// 66-character `0x`-prefixed hex string. Amounts are decimal strings of
/// the underlying `uint256` values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
	pub id: String,
	pub source_chain: u64,
	pub destination_chain: u64,
	pub asset: String,
	pub amount: String,
	pub recipient: String,
	pub sender: String,
	pub intent_fee: String,
	pub status: IntentStatus,
	pub is_call: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub call_data: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

/// A third party's acknowledgement that an intent's value was delivered
/// on the destination chain. Shares the intent's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fulfillment {
	pub id: String,
	pub asset: String,
	pub amount: String,
	pub receiver: String,
	pub tx_hash: String,
	pub is_call: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub call_data: Option<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_status_monotone_transitions() {
		use IntentStatus::*;
		assert!(Pending.can_transition_to(Fulfilled));
		assert!(Fulfilled.can_transition_to(Settled));
		assert!(Pending.can_transition_to(Failed));
		assert!(!Fulfilled.can_transition_to(Pending));
		assert!(!Settled.can_transition_to(Fulfilled));
		assert!(!Failed.can_transition_to(Pending));
		assert!(!Failed.can_transition_to(Settled));
	}

	#[test]
	fn test_status_reassertion_is_legal() {
		for status in [
			IntentStatus::Pending,
			IntentStatus::Fulfilled,
			IntentStatus::Settled,
			IntentStatus::Failed,
		] {
			assert!(status.can_transition_to(status));
		}
	}

	#[test]
	fn test_status_round_trips_through_str() {
		for status in [
			IntentStatus::Pending,
			IntentStatus::Fulfilled,
			IntentStatus::Settled,
			IntentStatus::Failed,
		] {
			assert_eq!(status.as_str().parse::<IntentStatus>().unwrap(), status);
		}
		assert!("unknown".parse::<IntentStatus>().is_err());
	}

	#[test]
	fn test_status_serde_is_lowercase() {
		let json = serde_json::to_string(&IntentStatus::Pending).unwrap();
		assert_eq!(json, "\"pending\"");
	}
}
