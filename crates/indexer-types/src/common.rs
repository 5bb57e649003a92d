//! Common types used throughout the indexer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Re-export commonly used ethereum types
pub use ethers_core::types::{Address, H256 as Bytes32, U256};

/// Transaction hash
pub type TxHash = Bytes32;

/// Block number
pub type BlockNumber = u64;

/// Timestamp (Unix seconds)
pub type Timestamp = u64;

/// Chain identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainId(pub u64);

impl ChainId {
	pub const ETHEREUM: Self = Self(1);
	pub const ARBITRUM: Self = Self(42161);
	pub const BASE: Self = Self(8453);
	pub const POLYGON: Self = Self(137);

	/// Default id of the aggregation chain, which only serves logs by
	/// polling.
	pub const DEFAULT_AGGREGATION: Self = Self(7000);
}

impl fmt::Display for ChainId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for ChainId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(ChainId(s.parse()?))
	}
}

impl From<u64> for ChainId {
	fn from(id: u64) -> Self {
		ChainId(id)
	}
}

/// Renders a 32-byte intent id as its canonical 66-character hex form.
pub fn format_intent_id(id: &Bytes32) -> String {
	format!("0x{}", hex::encode(id.as_bytes()))
}

/// Renders an address as its canonical 42-character lowercase hex form.
pub fn format_address(address: &Address) -> String {
	format!("0x{}", hex::encode(address.as_bytes()))
}

/// Canonicalizes a hex address string.
///
/// Event topics pad addresses to 32 bytes; when a hex string is longer
/// than 42 characters and `0x`-prefixed, only the trailing 40 hex digits
/// name the address. Shorter inputs are lowercased unchanged.
pub fn canonical_address(raw: &str) -> String {
	let s = raw.trim();
	if s.len() > 42 && s.starts_with("0x") {
		format!("0x{}", s[s.len() - 40..].to_lowercase())
	} else {
		s.to_lowercase()
	}
}

/// Reinterprets the low-order 20 bytes of a 32-byte topic as an address.
pub fn address_from_topic(topic: &Bytes32) -> Address {
	Address::from_slice(&topic.as_bytes()[12..])
}

/// Renders a receiver byte sequence as an address string, keeping only
/// the low-order 20 bytes when the field was zero-padded.
pub fn receiver_address(receiver: &[u8]) -> String {
	if receiver.len() >= 20 {
		format!("0x{}", hex::encode(&receiver[receiver.len() - 20..]))
	} else {
		format!("0x{}", hex::encode(receiver))
	}
}

/// Checks the 66-character `0x`-prefixed hex form used for intent ids.
pub fn is_hex_id(s: &str) -> bool {
	s.len() == 66 && s.starts_with("0x") && s[2..].bytes().all(|b| b.is_ascii_hexdigit())
}

/// Checks the 42-character `0x`-prefixed hex form used for addresses.
pub fn is_hex_address(s: &str) -> bool {
	s.len() == 42 && s.starts_with("0x") && s[2..].bytes().all(|b| b.is_ascii_hexdigit())
}
