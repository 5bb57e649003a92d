//! Event schemas consumed by the indexer and their decoded form.

use crate::common::{Address, BlockNumber, Bytes32, ChainId, TxHash, U256};
use ethers_core::utils::keccak256;

/// The four contract events the indexer observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
	IntentInitiated,
	IntentInitiatedWithCall,
	IntentFulfilled,
	IntentFulfilledWithCall,
}

impl EventKind {
	pub const ALL: [EventKind; 4] = [
		EventKind::IntentInitiated,
		EventKind::IntentInitiatedWithCall,
		EventKind::IntentFulfilled,
		EventKind::IntentFulfilledWithCall,
	];

	/// Canonical Solidity signature string, indexed parameters included.
	pub fn signature(&self) -> &'static str {
		match self {
			EventKind::IntentInitiated => {
				"IntentInitiated(bytes32,address,uint256,uint256,bytes,uint256,uint256)"
			}
			EventKind::IntentInitiatedWithCall => {
				"IntentInitiatedWithCall(bytes32,address,uint256,uint256,bytes,uint256,uint256,bytes)"
			}
			EventKind::IntentFulfilled => "IntentFulfilled(bytes32,address,address,uint256)",
			EventKind::IntentFulfilledWithCall => {
				"IntentFulfilledWithCall(bytes32,address,address,uint256,bytes)"
			}
		}
	}

	/// keccak256 of the signature string; the value of topic0.
	pub fn topic(&self) -> Bytes32 {
		Bytes32::from(keccak256(self.signature().as_bytes()))
	}

	/// Resolves an observed topic0 back to its event kind.
	pub fn from_topic(topic: &Bytes32) -> Option<EventKind> {
		EventKind::ALL.into_iter().find(|kind| kind.topic() == *topic)
	}

	/// All four topic0 values, for log filters.
	pub fn all_topics() -> Vec<Bytes32> {
		EventKind::ALL.iter().map(|kind| kind.topic()).collect()
	}

	pub fn is_initiation(&self) -> bool {
		matches!(
			self,
			EventKind::IntentInitiated | EventKind::IntentInitiatedWithCall
		)
	}

	pub fn is_fulfillment(&self) -> bool {
		!self.is_initiation()
	}

	pub fn is_call(&self) -> bool {
		matches!(
			self,
			EventKind::IntentInitiatedWithCall | EventKind::IntentFulfilledWithCall
		)
	}
}

/// A decoded but not-yet-persisted event.
///
/// Produced by the decoder, consumed by one processor, then dropped.
/// Fulfillment events carry no target chain, tip, or salt; those fields
/// stay zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
	pub chain_id: ChainId,
	pub kind: EventKind,
	pub intent_id: Bytes32,
	pub asset: Address,
	pub amount: U256,
	pub target_chain: u64,
	pub receiver: Vec<u8>,
	pub tip: U256,
	pub salt: U256,
	pub call_data: Option<Vec<u8>>,
	pub is_call: bool,
	pub tx_hash: TxHash,
	pub block_number: BlockNumber,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_topics_are_distinct_and_stable() {
		let topics = EventKind::all_topics();
		assert_eq!(topics.len(), 4);
		for (i, a) in topics.iter().enumerate() {
			for b in topics.iter().skip(i + 1) {
				assert_ne!(a, b);
			}
		}
		// keccak over a fixed string is deterministic
		assert_eq!(
			EventKind::IntentInitiated.topic(),
			EventKind::IntentInitiated.topic()
		);
	}

	#[test]
	fn test_from_topic_round_trips() {
		for kind in EventKind::ALL {
			assert_eq!(EventKind::from_topic(&kind.topic()), Some(kind));
		}
		assert_eq!(EventKind::from_topic(&Bytes32::zero()), None);
	}

	#[test]
	fn test_kind_predicates() {
		assert!(EventKind::IntentInitiated.is_initiation());
		assert!(EventKind::IntentInitiatedWithCall.is_call());
		assert!(EventKind::IntentFulfilled.is_fulfillment());
		assert!(!EventKind::IntentFulfilled.is_call());
		assert!(EventKind::IntentFulfilledWithCall.is_call());
	}
}
