//! SQLite-backed failed-swap store.
//!
//! The store is a single local database file. SQLite I/O is blocking, so
//! every call is offloaded to the tokio blocking pool; writes are serialized
//! by the connection mutex.

use crate::{FailedSwapStore, StoreError};
use alloy_primitives::U256;
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use solver_types::{parse_address, FailedSwap};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Schema of the failed-swaps table. `agi_id` is the unique key; the sell
/// amount is decimal text so 256-bit values survive unmodified.
const CREATE_TABLE_SQL: &str = "
	CREATE TABLE IF NOT EXISTS failed_swaps (
		timestamp INTEGER,
		agi_id INTEGER PRIMARY KEY,
		error_message TEXT,
		intent_type INTEGER,
		asset_to_sell TEXT,
		amount_to_sell TEXT,
		asset_to_buy TEXT,
		order_id INTEGER,
		order_status INTEGER
	)
";

/// Failed-swap store backed by a local SQLite file.
pub struct SqliteFailedSwapStore {
	conn: Arc<Mutex<Connection>>,
}

impl SqliteFailedSwapStore {
	/// Opens (or creates) the database at `path` and ensures the table
	/// exists.
	pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
		let conn = Connection::open(path).map_err(|e| StoreError::Database(e.to_string()))?;
		conn.execute(CREATE_TABLE_SQL, [])
			.map_err(|e| StoreError::Database(e.to_string()))?;
		Ok(Self {
			conn: Arc::new(Mutex::new(conn)),
		})
	}

	/// Runs a blocking closure against the connection on the blocking pool.
	async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
	where
		T: Send + 'static,
		F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
	{
		let conn = self.conn.clone();
		tokio::task::spawn_blocking(move || {
			let guard = conn
				.lock()
				.map_err(|e| StoreError::Database(format!("connection mutex poisoned: {}", e)))?;
			f(&guard)
		})
		.await
		.map_err(|e| StoreError::Database(format!("blocking task failed: {}", e)))?
	}
}

/// Converts an order id to the INTEGER column representation.
fn order_id_to_i64(order_id: U256) -> Result<i64, StoreError> {
	u64::try_from(order_id)
		.ok()
		.and_then(|v| i64::try_from(v).ok())
		.ok_or_else(|| StoreError::Encoding(format!("order id {} exceeds INTEGER range", order_id)))
}

fn row_to_failed_swap(row: &rusqlite::Row<'_>) -> rusqlite::Result<FailedSwap> {
	let agi_id: i64 = row.get(1)?;
	let sell: String = row.get(4)?;
	let buy: String = row.get(6)?;

	let to_address = |s: &str, idx: usize| {
		parse_address(s).map_err(|e| {
			rusqlite::Error::FromSqlConversionFailure(
				idx,
				rusqlite::types::Type::Text,
				e.into(),
			)
		})
	};

	Ok(FailedSwap {
		timestamp: row.get::<_, i64>(0)? as u64,
		order_id: U256::from(agi_id as u64),
		error_message: row.get(2)?,
		intent_type: row.get::<_, i64>(3)? as u8,
		asset_to_sell: to_address(&sell, 4)?,
		amount_to_sell: row.get(5)?,
		asset_to_buy: to_address(&buy, 6)?,
		order_status: row.get::<_, i64>(8)? as u8,
	})
}

#[async_trait]
impl FailedSwapStore for SqliteFailedSwapStore {
	async fn record(&self, failure: &FailedSwap) -> Result<(), StoreError> {
		let agi_id = order_id_to_i64(failure.order_id)?;
		let failure = failure.clone();
		let inserted = self
			.with_conn(move |conn| {
				conn.execute(
					"INSERT OR IGNORE INTO failed_swaps
						(timestamp, agi_id, error_message, intent_type,
						 asset_to_sell, amount_to_sell, asset_to_buy, order_id, order_status)
					 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
					params![
						failure.timestamp as i64,
						agi_id,
						failure.error_message,
						failure.intent_type as i64,
						failure.asset_to_sell.to_string(),
						failure.amount_to_sell,
						failure.asset_to_buy.to_string(),
						agi_id,
						failure.order_status as i64,
					],
				)
				.map_err(|e| StoreError::Database(e.to_string()))
			})
			.await?;

		if inserted == 0 {
			tracing::debug!(agi_id, "failed swap already recorded");
		}
		Ok(())
	}

	async fn delete(&self, order_id: U256) -> Result<(), StoreError> {
		let agi_id = order_id_to_i64(order_id)?;
		self.with_conn(move |conn| {
			conn.execute("DELETE FROM failed_swaps WHERE agi_id = ?1", params![agi_id])
				.map_err(|e| StoreError::Database(e.to_string()))
		})
		.await?;
		Ok(())
	}

	async fn contains(&self, order_id: U256) -> Result<bool, StoreError> {
		let agi_id = order_id_to_i64(order_id)?;
		self.with_conn(move |conn| {
			conn.query_row(
				"SELECT agi_id FROM failed_swaps WHERE agi_id = ?1",
				params![agi_id],
				|_| Ok(()),
			)
			.optional()
			.map(|found| found.is_some())
			.map_err(|e| StoreError::Database(e.to_string()))
		})
		.await
	}

	async fn all(&self) -> Result<Vec<FailedSwap>, StoreError> {
		self.with_conn(|conn| {
			let mut stmt = conn
				.prepare(
					"SELECT timestamp, agi_id, error_message, intent_type,
						asset_to_sell, amount_to_sell, asset_to_buy, order_id, order_status
					 FROM failed_swaps ORDER BY rowid",
				)
				.map_err(|e| StoreError::Database(e.to_string()))?;

			let rows = stmt
				.query_map([], row_to_failed_swap)
				.map_err(|e| StoreError::Database(e.to_string()))?;

			rows.collect::<Result<Vec<_>, _>>()
				.map_err(|e| StoreError::Database(e.to_string()))
		})
		.await
	}
}
