//! In-memory failed-swap store.
//!
//! Keeps records in a map for tests and development runs where durability
//! does not matter. Semantics match the SQLite backend: insert-or-ignore on
//! the order id, delete is a no-op when absent.

use crate::{FailedSwapStore, StoreError};
use alloy_primitives::U256;
use async_trait::async_trait;
use solver_types::FailedSwap;
use std::collections::BTreeMap;
use std::sync::RwLock;

/// Failed-swap store backed by an in-memory map.
#[derive(Default)]
pub struct MemoryFailedSwapStore {
	records: RwLock<BTreeMap<U256, FailedSwap>>,
}

impl MemoryFailedSwapStore {
	pub fn new() -> Self {
		Self::default()
	}
}

#[async_trait]
impl FailedSwapStore for MemoryFailedSwapStore {
	async fn record(&self, failure: &FailedSwap) -> Result<(), StoreError> {
		let mut records = self
			.records
			.write()
			.map_err(|e| StoreError::Database(format!("lock poisoned: {}", e)))?;
		records.entry(failure.order_id).or_insert_with(|| failure.clone());
		Ok(())
	}

	async fn delete(&self, order_id: U256) -> Result<(), StoreError> {
		let mut records = self
			.records
			.write()
			.map_err(|e| StoreError::Database(format!("lock poisoned: {}", e)))?;
		records.remove(&order_id);
		Ok(())
	}

	async fn contains(&self, order_id: U256) -> Result<bool, StoreError> {
		let records = self
			.records
			.read()
			.map_err(|e| StoreError::Database(format!("lock poisoned: {}", e)))?;
		Ok(records.contains_key(&order_id))
	}

	async fn all(&self) -> Result<Vec<FailedSwap>, StoreError> {
		let records = self
			.records
			.read()
			.map_err(|e| StoreError::Database(format!("lock poisoned: {}", e)))?;
		Ok(records.values().cloned().collect())
	}
}
