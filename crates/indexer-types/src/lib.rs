//! Shared types for the intent indexer.
//!
//! This crate defines the vocabulary every other crate speaks: chain
//! primitives and the `ChainClient` trait, the persisted `Intent` and
//! `Fulfillment` entities, the transient decoded `RawEvent`, and the
//! error taxonomy the ingestion pipeline propagates.

pub mod chains;
pub mod common;
pub mod entities;
pub mod errors;
pub mod events;

pub use chains::{
	ChainClient, EndpointKind, Log, LogFilter, LogSubscription, Receipt, SubscriptionSink,
	TransactionInfo,
};
pub use common::{Address, BlockNumber, Bytes32, ChainId, Timestamp, TxHash, U256};
pub use entities::{Fulfillment, Intent, IntentStatus};
pub use errors::{IndexerError, Result};
pub use events::{EventKind, RawEvent};
