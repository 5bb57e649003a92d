//! Indexer core: event processors and the per-chain service
//! supervisor.
//!
//! The processors give the ingestion pipeline its semantics — intents
//! and fulfillments persisted idempotently, statuses advanced
//! monotonically. The supervisor owns every task of one chain's
//! service, its shutdown protocol, and its health and metrics surface.

pub mod processor;
pub mod supervisor;

pub use processor::{EventRouter, FulfillmentProcessor, IntentProcessor};
pub use supervisor::{ChainService, ChainServiceConfig};
