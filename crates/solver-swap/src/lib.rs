//! Swap module for the AGI solver system.
//!
//! This module bridges the solver to an off-chain DEX aggregator. The
//! [`SwapInterface`] trait abstracts the aggregator; the [`SwapCoordinator`]
//! adds the idempotency the queue relies on: one swap record per order id,
//! at most one outstanding call, a cached result once a swap completes, and
//! a monotone attempt counter that survives eviction.

use async_trait::async_trait;
use solver_types::{Address, Agi, SwapPhase, SwapRecord};

use alloy_primitives::U256;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod aggregator;
	pub mod mock;
}

/// Errors raised by the swap capability.
///
/// Every variant represents a failure of the aggregator itself; failures
/// that occur before the capability is invoked surface through other error
/// types and are not retried on the swap schedule.
#[derive(Debug, Error)]
pub enum SwapError {
	/// The aggregator could not be reached or timed out.
	#[error("aggregator request failed: {0}")]
	Network(String),
	/// The aggregator answered with data the solver cannot interpret.
	#[error("aggregator returned invalid data: {0}")]
	InvalidResponse(String),
	/// The aggregator rejected the swap (no route, slippage exceeded, ...).
	#[error("swap rejected: {0}")]
	Rejected(String),
}

/// Parameters for one swap execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
	/// Token being sold.
	pub from_token: Address,
	/// Token being bought.
	pub to_token: Address,
	/// Amount of `from_token` to sell.
	pub from_amount: U256,
	/// Account the swap executes for.
	pub from_address: Address,
	/// Slippage tolerance as a fraction (0.05 = 5%).
	pub slippage: f64,
}

/// Trait defining the interface for swap implementations.
///
/// Implementations route the trade through a DEX aggregator and return the
/// resulting buy amount.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait SwapInterface: Send + Sync {
	/// Executes the swap and returns the amount of `to_token` obtained.
	async fn execute(&self, request: &SwapRequest) -> Result<U256, SwapError>;
}

/// Type alias for swap factory functions.
pub type SwapFactory = fn(&toml::Value) -> Result<Box<dyn SwapInterface>, SwapError>;

/// Coordinates swap execution per intent with idempotency guarantees.
///
/// The coordinator keeps the swap record past eviction so the failed-swap
/// report and re-admission refusal keep working; records are only dropped
/// when an intent completes.
pub struct SwapCoordinator {
	implementation: Arc<dyn SwapInterface>,
	default_slippage: f64,
	records: Mutex<HashMap<U256, SwapRecord>>,
}

impl SwapCoordinator {
	pub fn new(implementation: Arc<dyn SwapInterface>, default_slippage: f64) -> Self {
		Self {
			implementation,
			default_slippage,
			records: Mutex::new(HashMap::new()),
		}
	}

	/// Returns a snapshot of the swap record for an order id.
	pub fn record(&self, order_id: U256) -> Option<SwapRecord> {
		self.records.lock().unwrap().get(&order_id).cloned()
	}

	/// Returns the number of swap attempts made for an order id.
	pub fn attempts(&self, order_id: U256) -> u32 {
		self.records
			.lock()
			.unwrap()
			.get(&order_id)
			.map(|r| r.attempts)
			.unwrap_or(0)
	}

	/// Returns whether the order id has a failed swap at or beyond the
	/// retry ceiling.
	pub fn is_exhausted(&self, order_id: U256, max_retries: u32) -> bool {
		self.records
			.lock()
			.unwrap()
			.get(&order_id)
			.map(|r| r.phase == SwapPhase::Failed && r.attempts >= max_retries)
			.unwrap_or(false)
	}

	/// Returns the order ids whose swaps are failed and exhausted.
	pub fn failed_exhausted(&self, max_retries: u32) -> Vec<U256> {
		let records = self.records.lock().unwrap();
		let mut ids: Vec<U256> = records
			.iter()
			.filter(|(_, r)| r.phase == SwapPhase::Failed && r.attempts >= max_retries)
			.map(|(id, _)| *id)
			.collect();
		ids.sort();
		ids
	}

	/// Executes the swap for one intent.
	///
	/// A completed record short-circuits to the cached buy amount without
	/// touching the aggregator again. Otherwise the record is marked pending,
	/// the attempt counter advances, and the capability is invoked; the
	/// record lands in Completed or Failed accordingly.
	pub async fn execute(
		&self,
		order_id: U256,
		agi: &Agi,
		from_address: &Address,
	) -> Result<U256, SwapError> {
		{
			let mut records = self.records.lock().unwrap();
			let record = records.entry(order_id).or_insert(SwapRecord {
				phase: SwapPhase::Pending,
				amount_to_buy: None,
				attempts: 0,
			});

			if record.phase == SwapPhase::Completed {
				if let Some(amount) = record.amount_to_buy {
					return Ok(amount);
				}
			}

			record.phase = SwapPhase::Pending;
			record.attempts += 1;
		}

		let request = SwapRequest {
			from_token: agi.asset_to_sell.clone(),
			to_token: agi.asset_to_buy.clone(),
			from_amount: agi.amount_to_sell,
			from_address: from_address.clone(),
			slippage: self.default_slippage,
		};

		match self.implementation.execute(&request).await {
			Ok(amount_to_buy) => {
				let mut records = self.records.lock().unwrap();
				if let Some(record) = records.get_mut(&order_id) {
					record.phase = SwapPhase::Completed;
					record.amount_to_buy = Some(amount_to_buy);
				}
				tracing::info!(order_id = %order_id, amount = %amount_to_buy, "swap completed");
				Ok(amount_to_buy)
			},
			Err(e) => {
				let mut records = self.records.lock().unwrap();
				if let Some(record) = records.get_mut(&order_id) {
					record.phase = SwapPhase::Failed;
				}
				Err(e)
			},
		}
	}

	/// Drops the swap record for a completed intent.
	pub fn clear(&self, order_id: U256) {
		self.records.lock().unwrap().remove(&order_id);
	}
}
