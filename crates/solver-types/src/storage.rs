//! Failed-swap record types.
//!
//! When an intent exhausts its swap retries it is evicted from the queue and
//! one durable row is written so operators can resolve it out of band. The
//! sell amount is carried as decimal text to preserve the full 256-bit value.

use crate::account::Address;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// Durable record of an intent evicted after repeated swap failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedSwap {
	/// Unix timestamp of the eviction.
	pub timestamp: u64,
	/// Order id of the evicted intent. Unique key of the record.
	pub order_id: U256,
	/// Human-readable description of the final swap failure.
	pub error_message: String,
	/// Intent type as read from the contract.
	pub intent_type: u8,
	/// Asset the agent wanted to sell.
	pub asset_to_sell: Address,
	/// Sell amount as decimal text, never truncated below 256 bits.
	pub amount_to_sell: String,
	/// Asset the agent wanted to buy.
	pub asset_to_buy: Address,
	/// Contract order status at eviction time.
	pub order_status: u8,
}
