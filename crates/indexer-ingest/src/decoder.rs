//! Raw log decoding and validation.

use ethers_core::abi::{self, ParamType, Token};
use indexer_types::{
	common::address_from_topic, ChainId, EventKind, IndexerError, Log, RawEvent, Result, U256,
};

/// Turns raw logs from one chain into typed [`RawEvent`]s, or rejects
/// them as malformed. Stateless apart from the origin chain id it
/// stamps on every event.
#[derive(Debug, Clone, Copy)]
pub struct EventDecoder {
	chain_id: ChainId,
}

/// Minimum topic count shared by all four event schemas: the signature
/// plus the indexed intent id and asset.
const MIN_TOPICS: usize = 3;

/// Data-field arity per schema, below which a log is malformed.
const MIN_FIELDS_INITIATED: usize = 5;
const MIN_FIELDS_INITIATED_CALL: usize = 6;
const MIN_FIELDS_FULFILLED: usize = 1;
const MIN_FIELDS_FULFILLED_CALL: usize = 2;

impl EventDecoder {
	pub fn new(chain_id: ChainId) -> Self {
		Self { chain_id }
	}

	/// Decodes a raw log into a typed event. No side effects.
	pub fn decode(&self, log: &Log) -> Result<RawEvent> {
		if log.topics.len() < MIN_TOPICS {
			return Err(malformed(format!(
				"expected at least {} topics, got {}",
				MIN_TOPICS,
				log.topics.len()
			)));
		}

		let kind = EventKind::from_topic(&log.topics[0])
			.ok_or_else(|| malformed(format!("unknown event signature {:?}", log.topics[0])))?;

		if kind.is_initiation() {
			self.decode_initiation(kind, log)
		} else {
			self.decode_fulfillment(kind, log)
		}
	}

	fn decode_initiation(&self, kind: EventKind, log: &Log) -> Result<RawEvent> {
		let is_call = kind.is_call();
		let mut params = vec![
			ParamType::Uint(256),  // amount
			ParamType::Uint(256),  // targetChain
			ParamType::Bytes,      // receiver
			ParamType::Uint(256),  // tip
			ParamType::Uint(256),  // salt
		];
		if is_call {
			params.push(ParamType::Bytes); // data
		}

		let tokens = abi::decode(&params, &log.data)
			.map_err(|e| malformed(format!("abi unpack failed: {}", e)))?;

		let min_fields = if is_call {
			MIN_FIELDS_INITIATED_CALL
		} else {
			MIN_FIELDS_INITIATED
		};
		if tokens.len() < min_fields {
			return Err(malformed(format!(
				"expected at least {} data fields, got {}",
				min_fields,
				tokens.len()
			)));
		}

		let mut tokens = tokens.into_iter();
		let amount = take_uint(&mut tokens, "amount")?;
		let target_chain = take_chain_id(&mut tokens)?;
		let receiver = take_bytes(&mut tokens, "receiver")?;
		if receiver.is_empty() {
			return Err(malformed("zero-length receiver".to_string()));
		}
		let tip = take_uint(&mut tokens, "tip")?;
		let salt = take_uint(&mut tokens, "salt")?;
		let call_data = if is_call {
			Some(take_bytes(&mut tokens, "data")?)
		} else {
			None
		};

		Ok(RawEvent {
			chain_id: self.chain_id,
			kind,
			intent_id: log.topics[1],
			asset: address_from_topic(&log.topics[2]),
			amount,
			target_chain,
			receiver,
			tip,
			salt,
			call_data,
			is_call,
			tx_hash: log.transaction_hash,
			block_number: log.block_number,
		})
	}

	fn decode_fulfillment(&self, kind: EventKind, log: &Log) -> Result<RawEvent> {
		// the receiver rides in topic 3 for the fulfillment family
		if log.topics.len() < 4 {
			return Err(malformed(format!(
				"fulfillment log carries {} topics, receiver topic missing",
				log.topics.len()
			)));
		}

		let is_call = kind.is_call();
		let mut params = vec![ParamType::Uint(256)]; // amount
		if is_call {
			params.push(ParamType::Bytes); // data
		}

		let tokens = abi::decode(&params, &log.data)
			.map_err(|e| malformed(format!("abi unpack failed: {}", e)))?;

		let min_fields = if is_call {
			MIN_FIELDS_FULFILLED_CALL
		} else {
			MIN_FIELDS_FULFILLED
		};
		if tokens.len() < min_fields {
			return Err(malformed(format!(
				"expected at least {} data fields, got {}",
				min_fields,
				tokens.len()
			)));
		}

		let mut tokens = tokens.into_iter();
		let amount = take_uint(&mut tokens, "amount")?;
		let call_data = if is_call {
			Some(take_bytes(&mut tokens, "data")?)
		} else {
			None
		};

		let receiver = log.topics[3].as_bytes().to_vec();

		Ok(RawEvent {
			chain_id: self.chain_id,
			kind,
			intent_id: log.topics[1],
			asset: address_from_topic(&log.topics[2]),
			amount,
			target_chain: 0,
			receiver,
			tip: U256::zero(),
			salt: U256::zero(),
			call_data,
			is_call,
			tx_hash: log.transaction_hash,
			block_number: log.block_number,
		})
	}
}

fn malformed(message: String) -> IndexerError {
	IndexerError::MalformedLog(message)
}

fn take_uint(tokens: &mut impl Iterator<Item = Token>, field: &str) -> Result<U256> {
	tokens
		.next()
		.and_then(Token::into_uint)
		.ok_or_else(|| malformed(format!("{} is not a uint", field)))
}

fn take_bytes(tokens: &mut impl Iterator<Item = Token>, field: &str) -> Result<Vec<u8>> {
	tokens
		.next()
		.and_then(Token::into_bytes)
		.ok_or_else(|| malformed(format!("{} is not bytes", field)))
}

fn take_chain_id(tokens: &mut impl Iterator<Item = Token>) -> Result<u64> {
	let raw = take_uint(tokens, "target chain")?;
	if raw > U256::from(u64::MAX) {
		return Err(malformed(format!("target chain {} overflows u64", raw)));
	}
	Ok(raw.as_u64())
}
