//! Storage module for the AGI solver system.
//!
//! This module provides the durable failed-swaps store: the only state the
//! solver persists across restarts. The queue itself is rebuilt from the
//! contract on startup, so the store carries exactly one table, keyed by the
//! AGI order id, holding intents that exhausted their swap retries.

use async_trait::async_trait;
use solver_types::FailedSwap;

use alloy_primitives::U256;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
	pub mod sqlite;
}

/// Errors that can occur during failed-swap store operations.
#[derive(Debug, Error)]
pub enum StoreError {
	/// Error raised by the database backend.
	#[error("database error: {0}")]
	Database(String),
	/// Error that occurs when a record cannot be encoded for storage.
	#[error("encoding error: {0}")]
	Encoding(String),
}

/// Trait defining the interface for failed-swap store backends.
///
/// Implementations must make [`record`](FailedSwapStore::record) an
/// insert-or-ignore on the order id and [`delete`](FailedSwapStore::delete)
/// a no-op when the row is absent, so both stay safe to repeat across
/// restarts.
#[async_trait]
#[cfg_attr(feature = "testing", mockall::automock)]
pub trait FailedSwapStore: Send + Sync {
	/// Records an evicted intent. Ignored if a row for the same order id
	/// already exists.
	async fn record(&self, failure: &FailedSwap) -> Result<(), StoreError>;

	/// Deletes the record for an order id. No-op if absent.
	async fn delete(&self, order_id: U256) -> Result<(), StoreError>;

	/// Returns whether a record exists for the order id.
	async fn contains(&self, order_id: U256) -> Result<bool, StoreError>;

	/// Returns all recorded failures, oldest first.
	async fn all(&self) -> Result<Vec<FailedSwap>, StoreError>;
}
