//! Mock swap implementation for development and testing.
//!
//! Converts the sell amount at a fixed rate instead of routing through an
//! aggregator, so the solver can run against a local chain without any
//! off-chain dependency.

use crate::{SwapError, SwapInterface, SwapRequest};
use alloy_primitives::U256;
use async_trait::async_trait;

/// Fixed-point scale used to apply the configured rate to U256 amounts.
const RATE_SCALE: u64 = 1_000_000;

/// Mock swap implementation with a fixed conversion rate.
pub struct MockSwap {
	/// Rate applied to the sell amount, scaled by [`RATE_SCALE`].
	rate_scaled: U256,
	/// When set, every execution fails with this message.
	failure: Option<String>,
}

impl MockSwap {
	/// Creates a new MockSwap instance with configuration.
	///
	/// Recognized keys: `rate` (float, default 1.0) and `failure` (string;
	/// when present every swap fails with that message).
	pub fn new(config: &toml::Value) -> Result<Self, SwapError> {
		let rate = config
			.get("rate")
			.and_then(|v| v.as_float())
			.unwrap_or(1.0);
		if !(rate > 0.0) {
			return Err(SwapError::InvalidResponse(format!(
				"mock rate must be positive, got {}",
				rate
			)));
		}

		let failure = config
			.get("failure")
			.and_then(|v| v.as_str())
			.map(|s| s.to_string());

		Ok(Self {
			rate_scaled: U256::from((rate * RATE_SCALE as f64) as u64),
			failure,
		})
	}
}

#[async_trait]
impl SwapInterface for MockSwap {
	async fn execute(&self, request: &SwapRequest) -> Result<U256, SwapError> {
		if let Some(ref message) = self.failure {
			return Err(SwapError::Rejected(message.clone()));
		}

		Ok(request.from_amount * self.rate_scaled / U256::from(RATE_SCALE))
	}
}

/// Factory function to create a mock swap backend from configuration.
pub fn create_mock_swap(config: &toml::Value) -> Result<Box<dyn SwapInterface>, SwapError> {
	Ok(Box::new(MockSwap::new(config)?))
}
