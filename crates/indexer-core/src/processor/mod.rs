//! Per-event-kind processors and the router that feeds them.

mod fulfillment;
mod intent;
mod router;

pub use fulfillment::FulfillmentProcessor;
pub use intent::IntentProcessor;
pub use router::EventRouter;

use chrono::{DateTime, TimeZone, Utc};
use indexer_types::Timestamp;

/// Converts a unix-seconds chain timestamp into the entity timestamp
/// type, falling back to the wall clock on out-of-range values.
pub(crate) fn chain_time(unix_seconds: Timestamp) -> DateTime<Utc> {
	Utc.timestamp_opt(unix_seconds as i64, 0)
		.single()
		.unwrap_or_else(Utc::now)
}

/// Renders optional call data as `0x`-prefixed hex.
pub(crate) fn render_call_data(data: Option<&Vec<u8>>) -> Option<String> {
	data.map(|bytes| format!("0x{}", hex::encode(bytes)))
}
