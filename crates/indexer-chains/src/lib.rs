//! Chain clients for connecting to blockchain endpoints.
//!
//! This crate implements the `ChainClient` contract over EVM endpoints
//! using ethers-rs: an HTTP JSON-RPC transport with retry logic for
//! every chain, plus an optional WebSocket connection that upgrades the
//! client to the push variant serving live log subscriptions.
//!
//! The `ChainRegistry` holds one client per configured chain and is the
//! cross-chain resolver consulted by the fulfillment processor.

pub mod client;
pub mod registry;
pub mod retry;

pub use client::EvmClient;
pub use registry::ChainRegistry;
pub use retry::{RetryPolicy, RetryTransport};
