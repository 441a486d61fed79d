//! Service wiring for the AGI solver binary.
//!
//! Builds the full service graph from configuration (chain access,
//! transaction executor, swap coordinator, failed-swap store, discovery and
//! the queue manager) and runs the admission loop until shutdown.

use alloy_signer_local::PrivateKeySigner;
use solver_config::{Config, ConfigError};
use solver_core::{QueueManager, RetryPolicy};
use solver_delivery::implementations::evm::alloy::AlloyChain;
use solver_delivery::{ChainInterface, DeliveryError, TransactionExecutor};
use solver_discovery::{DiscoveryError, DiscoveryInterface, EscrowDiscovery};
use solver_storage::implementations::sqlite::SqliteFailedSwapStore;
use solver_storage::StoreError;
use solver_swap::implementations::{aggregator, mock};
use solver_swap::{SwapCoordinator, SwapError, SwapInterface};
use solver_types::Address;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Errors that can occur while assembling or running the service.
#[derive(Debug, Error)]
pub enum ServiceError {
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),
	#[error("Account error: {0}")]
	Account(String),
	#[error("Delivery error: {0}")]
	Delivery(#[from] DeliveryError),
	#[error("Swap error: {0}")]
	Swap(#[from] SwapError),
	#[error("Storage error: {0}")]
	Storage(#[from] StoreError),
	#[error("Discovery error: {0}")]
	Discovery(#[from] DiscoveryError),
}

/// The assembled solver service.
pub struct SolverService {
	manager: Arc<QueueManager>,
	discovery: EscrowDiscovery,
}

/// Builds the service graph from a validated configuration.
pub async fn build_solver(config: &Config) -> Result<SolverService, ServiceError> {
	let signer: PrivateKeySigner = config
		.account
		.private_key
		.parse()
		.map_err(|e| ServiceError::Account(format!("invalid private key: {}", e)))?;
	let solver_address: Address = signer.address().into();
	tracing::info!(solver = %solver_address, "solver account loaded");

	let chain: Arc<dyn ChainInterface> = Arc::new(AlloyChain::new(
		&config.network.http_url,
		config.network.chain_id,
		&config.contract.escrow_address,
		signer,
		Duration::from_secs(config.delivery.receipt_poll_interval_secs),
		config.delivery.receipt_poll_max_attempts,
	)?);

	let executor = Arc::new(TransactionExecutor::new(
		chain.clone(),
		config.contract.escrow_address.clone(),
		solver_address,
		config.network.chain_id,
	));

	let swap_backend = create_swap_backend(config)?;
	let swaps = Arc::new(SwapCoordinator::new(
		Arc::from(swap_backend),
		config.swap.default_slippage,
	));

	let failed_swaps = Arc::new(SqliteFailedSwapStore::new(&config.storage.db_path)?);
	tracing::info!(db_path = %config.storage.db_path, "failed-swap store opened");

	let policy = RetryPolicy {
		retry_delay: Duration::from_millis(config.solver.retry_delay_ms),
		swap_retry_delay: Duration::from_millis(config.solver.swap_retry_delay_ms),
		max_retries: config.solver.max_retries,
	};
	let manager = QueueManager::new(
		chain.clone(),
		executor,
		swaps,
		failed_swaps,
		policy,
		Duration::from_millis(config.solver.check_interval_ms),
	);

	let discovery = EscrowDiscovery::new(
		&config.network.http_url,
		config.network.ws_url.as_deref(),
		&config.contract.escrow_address,
		chain,
		config.discovery.polling_interval_secs,
	)
	.await?;

	Ok(SolverService { manager, discovery })
}

/// Instantiates the configured swap backend.
fn create_swap_backend(config: &Config) -> Result<Box<dyn SwapInterface>, ServiceError> {
	let empty = toml::Value::Table(Default::default());
	let implementation_config = config.swap_implementation_config().unwrap_or(&empty);

	match config.swap.primary.as_str() {
		"aggregator" => Ok(aggregator::create_aggregator_swap(implementation_config)?),
		"mock" => Ok(mock::create_mock_swap(implementation_config)?),
		other => Err(ServiceError::Config(ConfigError::Validation(format!(
			"unknown swap implementation: {}",
			other
		)))),
	}
}

/// Runs the service: backlog admission, live event admission, and graceful
/// shutdown on ctrl-c.
pub async fn run(service: SolverService) -> Result<(), ServiceError> {
	let SolverService { manager, discovery } = service;

	// Rebuild the queue from contract state before listening for new events.
	let backlog = discovery.backlog().await?;
	tracing::info!(count = backlog.len(), "admitting backlog intents");
	for order_id in backlog {
		manager.add(order_id).await;
	}

	let (intent_tx, mut intent_rx) = mpsc::unbounded_channel();
	discovery.start(intent_tx).await?;
	tracing::info!("intent discovery started");

	loop {
		tokio::select! {
			Some(order_id) = intent_rx.recv() => {
				manager.add(order_id).await;
			}
			_ = tokio::signal::ctrl_c() => {
				tracing::info!("shutdown signal received");
				break;
			}
		}
	}

	discovery.stop().await?;
	manager.close().await;

	let report = manager.failed_swap_report();
	if report.count > 0 {
		tracing::warn!(
			count = report.count,
			order_ids = ?report.order_ids,
			"intents evicted after repeated swap failures; see the failed-swaps store"
		);
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn config_with_swap(primary: &str, table: &str) -> Config {
		let toml_str = format!(
			r#"
				[network]
				chain_id = 31337
				http_url = "http://localhost:8545"

				[contract]
				escrow_address = "0x1111111111111111111111111111111111111111"

				[account]
				private_key = "0x0123456789012345678901234567890123456789012345678901234567890123"

				[swap]
				primary = "{}"

				{}
			"#,
			primary, table
		);
		Config::from_toml_str(&toml_str).unwrap()
	}

	#[test]
	fn test_mock_swap_backend_selected() {
		let config = config_with_swap("mock", "[swap.implementations.mock]\nrate = 0.9");
		assert!(create_swap_backend(&config).is_ok());
	}

	#[test]
	fn test_aggregator_requires_base_url() {
		let config = config_with_swap("aggregator", "");
		assert!(create_swap_backend(&config).is_err());

		let config = config_with_swap(
			"aggregator",
			"[swap.implementations.aggregator]\nbase_url = \"https://agg.example\"",
		);
		assert!(create_swap_backend(&config).is_ok());
	}

	#[test]
	fn test_unknown_swap_backend_rejected() {
		let config = config_with_swap("mock", "");
		let mut bad = config;
		bad.swap.primary = "uniswap".to_string();
		assert!(matches!(
			create_swap_backend(&bad),
			Err(ServiceError::Config(_))
		));
	}
}
