//! Transaction delivery module for the AGI solver system.
//!
//! This module handles all interaction with the escrow chain: reading
//! published AGIs, simulating and submitting contract calls, and waiting for
//! receipts. The [`ChainInterface`] trait abstracts the RPC transport; the
//! [`TransactionExecutor`] layers the escrow-specific operations (withdraw,
//! approve, deposit) on top of it.

use async_trait::async_trait;
use solver_types::{Agi, Transaction, TransactionHash, TransactionReceipt};

use alloy_primitives::U256;
use solver_types::Address;
use thiserror::Error;

pub mod contracts;
pub mod executor;

/// Re-export implementations
pub mod implementations {
	pub mod evm {
		pub mod alloy;
	}
}

pub use executor::TransactionExecutor;

/// Errors that can occur during transaction delivery operations.
#[derive(Debug, Error)]
pub enum DeliveryError {
	/// Error that occurs during network communication, including receipts
	/// that never became available within the polling budget.
	#[error("Network error: {0}")]
	Network(String),
	/// The pre-submission simulation was rejected by the contract.
	#[error("Simulation reverted: {0}")]
	Simulation(String),
	/// A mined transaction reverted on-chain.
	#[error("Transaction reverted: {0}")]
	TransactionReverted(String),
	/// The chain returned data the solver cannot interpret.
	#[error("Invalid chain data: {0}")]
	InvalidData(String),
}

/// Trait defining the interface to the escrow chain.
///
/// This trait must be implemented by any transport that wants to integrate
/// with the solver. Submission maps to simulate-then-write: a call is only
/// sent once an `eth_call` against latest state accepts it. Receipt waiting
/// is expected to poll with bounded retries rather than fail on node lag.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait ChainInterface: Send + Sync {
	/// Reads the on-chain view of one AGI via `viewAGI`.
	async fn read_agi(&self, order_id: U256) -> Result<Agi, DeliveryError>;

	/// Simulates a transaction and, if accepted, signs and submits it.
	async fn simulate_and_send(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError>;

	/// Waits for the receipt of a submitted transaction, polling until the
	/// receipt appears or the attempt budget is exhausted.
	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError>;

	/// Reads the ERC-20 allowance granted by `owner` to `spender`.
	async fn get_allowance(
		&self,
		owner: &Address,
		spender: &Address,
		token: &Address,
	) -> Result<U256, DeliveryError>;

	/// Reads the next order id the contract will assign.
	async fn next_order_id(&self) -> Result<U256, DeliveryError>;

	/// Reads the number of fully processed AGIs.
	async fn processed_agis_length(&self) -> Result<U256, DeliveryError>;

	/// Reads the processed AGI ids in `[start, end)`.
	async fn get_processed_agis(
		&self,
		start: U256,
		end: U256,
	) -> Result<Vec<U256>, DeliveryError>;
}
