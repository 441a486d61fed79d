//! HTTP DEX aggregator swap implementation.
//!
//! Adapts any aggregator exposing a swap endpoint that accepts the trade
//! parameters and answers with the executed buy amount. The endpoint shape
//! is `POST {base_url}/swap` with a JSON body; the response carries the
//! out-amount as a decimal string so 256-bit values survive transport.

use crate::{SwapError, SwapInterface, SwapRequest};
use alloy_primitives::U256;
use async_trait::async_trait;
use reqwest::{
	header::{HeaderMap, HeaderValue, ACCEPT},
	Client,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Swap implementation backed by an HTTP DEX aggregator.
pub struct AggregatorSwap {
	/// HTTP client for API requests.
	client: Client,
	/// Base URL of the aggregator API.
	base_url: String,
}

/// Request body sent to the aggregator swap endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggregatorSwapRequest {
	from_token: String,
	to_token: String,
	amount: String,
	from_address: String,
	slippage: f64,
}

/// Aggregator response for the swap endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AggregatorSwapResponse {
	to_amount: String,
}

impl AggregatorSwap {
	/// Creates a new AggregatorSwap instance with configuration.
	pub fn new(config: &toml::Value) -> Result<Self, SwapError> {
		let base_url = config
			.get("base_url")
			.and_then(|v| v.as_str())
			.ok_or_else(|| {
				SwapError::InvalidResponse("aggregator config requires base_url".to_string())
			})?
			.trim_end_matches('/')
			.to_string();

		let api_key = config
			.get("api_key")
			.and_then(|v| v.as_str())
			.map(|s| s.to_string());

		let timeout_secs = config
			.get("timeout_secs")
			.and_then(|v| v.as_integer())
			.unwrap_or(30) as u64;

		let mut headers = HeaderMap::new();
		headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
		if let Some(ref key) = api_key {
			headers.insert(
				"authorization",
				HeaderValue::from_str(&format!("Bearer {}", key))
					.map_err(|e| SwapError::InvalidResponse(format!("invalid API key: {}", e)))?,
			);
		}

		let client = Client::builder()
			.default_headers(headers)
			.timeout(Duration::from_secs(timeout_secs))
			.build()
			.map_err(|e| SwapError::Network(format!("failed to create HTTP client: {}", e)))?;

		debug!(base_url = %base_url, timeout_secs, "aggregator swap initialized");

		Ok(Self { client, base_url })
	}

	fn parse_amount(raw: &str) -> Result<U256, SwapError> {
		U256::from_str_radix(raw.trim(), 10).map_err(|e| {
			SwapError::InvalidResponse(format!("unparseable buy amount {:?}: {}", raw, e))
		})
	}
}

#[async_trait]
impl SwapInterface for AggregatorSwap {
	async fn execute(&self, request: &SwapRequest) -> Result<U256, SwapError> {
		let body = AggregatorSwapRequest {
			from_token: request.from_token.to_string(),
			to_token: request.to_token.to_string(),
			amount: request.from_amount.to_string(),
			from_address: request.from_address.to_string(),
			slippage: request.slippage,
		};

		let url = format!("{}/swap", self.base_url);
		let response = self
			.client
			.post(&url)
			.json(&body)
			.send()
			.await
			.map_err(|e| SwapError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let detail = response.text().await.unwrap_or_default();
			return Err(SwapError::Rejected(format!(
				"aggregator answered {}: {}",
				status, detail
			)));
		}

		let parsed: AggregatorSwapResponse = response
			.json()
			.await
			.map_err(|e| SwapError::InvalidResponse(e.to_string()))?;

		Self::parse_amount(&parsed.to_amount)
	}
}

/// Factory function to create an aggregator swap backend from configuration.
pub fn create_aggregator_swap(
	config: &toml::Value,
) -> Result<Box<dyn SwapInterface>, SwapError> {
	Ok(Box::new(AggregatorSwap::new(config)?))
}
