//! On-chain discovery of published AGIs.
//!
//! Monitors the escrow contract's `AGIPublished` event and performs the
//! startup backlog scan. Supports HTTP log polling or WebSocket
//! subscriptions (when `polling_interval_secs` = 0).

use crate::{DiscoveryError, DiscoveryInterface};
use alloy_primitives::{Address as AlloyAddress, Log as PrimLog, LogData, U256};
use alloy_provider::{DynProvider, Provider, ProviderBuilder, RootProvider};
use alloy_rpc_types::{Filter, Log};
use alloy_sol_types::{sol, SolEvent};
use alloy_transport_ws::WsConnect;
use async_trait::async_trait;
use futures::StreamExt;
use solver_delivery::ChainInterface;
use solver_types::Address;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

// Event definition for the escrow contract.
//
// Redefined here because the sol! macro does not support external type
// references; it matches the surface bound in solver-delivery.
sol! {
	/// Event emitted when the agent publishes a new intent.
	event AGIPublished(
		uint256 indexed orderId,
		uint8 intentType,
		address assetToSell,
		uint256 amountToSell,
		address assetToBuy
	);
}

/// Provider handle for the two transport modes.
enum ProviderMode {
	/// HTTP provider for polling mode.
	Http(DynProvider),
	/// WebSocket provider for subscription mode.
	WebSocket(DynProvider),
}

/// Escrow event discovery implementation.
///
/// Watches one escrow contract for `AGIPublished` events and converts each
/// into an order id for admission. The backlog scan runs over the chain
/// capability so restarts recover every unfinished intent before live
/// events resume.
pub struct EscrowDiscovery {
	/// Provider used for event monitoring.
	provider: ProviderMode,
	/// Escrow contract emitting the events.
	escrow: AlloyAddress,
	/// Chain capability used by the backlog scan.
	chain: Arc<dyn ChainInterface>,
	/// The last processed block number (HTTP mode only).
	last_block: Arc<Mutex<u64>>,
	/// Flag indicating if monitoring is active.
	is_monitoring: Arc<AtomicBool>,
	/// Handle for the monitoring task.
	monitoring_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
	/// Channel for signaling monitoring shutdown.
	stop_signal: Arc<Mutex<Option<broadcast::Sender<()>>>>,
	/// Polling interval in seconds (0 = WebSocket mode).
	polling_interval_secs: u64,
}

impl EscrowDiscovery {
	/// Creates a new EscrowDiscovery instance.
	///
	/// When `polling_interval_secs` is 0, a WebSocket URL is required and
	/// events arrive via `eth_subscribe`; otherwise the HTTP endpoint is
	/// polled for logs.
	pub async fn new(
		http_url: &str,
		ws_url: Option<&str>,
		escrow_address: &Address,
		chain: Arc<dyn ChainInterface>,
		polling_interval_secs: u64,
	) -> Result<Self, DiscoveryError> {
		if escrow_address.0.len() != 20 {
			return Err(DiscoveryError::Connection(
				"Invalid escrow address length".to_string(),
			));
		}
		let escrow = AlloyAddress::from_slice(&escrow_address.0);

		let use_websocket = polling_interval_secs == 0;

		let (provider, last_block) = if use_websocket {
			let ws_url = ws_url.ok_or_else(|| {
				DiscoveryError::Connection(
					"WebSocket mode requires a ws_url in the network configuration".to_string(),
				)
			})?;

			tracing::info!(ws_url, "creating WebSocket provider for event subscriptions");

			let ws_connect = WsConnect::new(ws_url.to_string());
			let provider = ProviderBuilder::new()
				.connect_ws(ws_connect)
				.await
				.map_err(|e| {
					DiscoveryError::Connection(format!(
						"Failed to create WebSocket provider: {}",
						e
					))
				})?;

			(ProviderMode::WebSocket(provider.erased()), 0)
		} else {
			let url = http_url.parse().map_err(|e| {
				DiscoveryError::Connection(format!("Invalid RPC URL: {}", e))
			})?;
			let provider = RootProvider::new_http(url);

			// Events before startup are covered by the backlog scan.
			let current_block = provider.get_block_number().await.map_err(|e| {
				DiscoveryError::Connection(format!("Failed to get block number: {}", e))
			})?;

			(ProviderMode::Http(provider.erased()), current_block)
		};

		Ok(Self {
			provider,
			escrow,
			chain,
			last_block: Arc::new(Mutex::new(last_block)),
			is_monitoring: Arc::new(AtomicBool::new(false)),
			monitoring_handle: Arc::new(Mutex::new(None)),
			stop_signal: Arc::new(Mutex::new(None)),
			polling_interval_secs,
		})
	}

	/// Decodes an `AGIPublished` log into its order id.
	fn parse_agi_published(log: &Log) -> Result<U256, DiscoveryError> {
		let prim_log = PrimLog {
			address: log.address(),
			data: LogData::new_unchecked(log.topics().to_vec(), log.data().data.clone()),
		};

		let event = AGIPublished::decode_log(&prim_log, true).map_err(|e| {
			DiscoveryError::ParseError(format!("Failed to decode AGIPublished event: {}", e))
		})?;

		Ok(event.data.orderId)
	}

	/// Decodes discovered logs and forwards the order ids.
	fn process_discovered_logs(logs: Vec<Log>, sender: &mpsc::UnboundedSender<U256>) {
		for log in logs {
			match Self::parse_agi_published(&log) {
				Ok(order_id) => {
					tracing::info!(order_id = %order_id, "discovered published AGI");
					let _ = sender.send(order_id);
				},
				Err(e) => {
					tracing::warn!("skipping undecodable log: {}", e);
				},
			}
		}
	}

	/// Polling-based monitoring loop.
	async fn monitor_polling(
		provider: DynProvider,
		escrow: AlloyAddress,
		last_block: Arc<Mutex<u64>>,
		sender: mpsc::UnboundedSender<U256>,
		mut stop_rx: broadcast::Receiver<()>,
		polling_interval_secs: u64,
	) {
		let mut interval =
			tokio::time::interval(std::time::Duration::from_secs(polling_interval_secs));
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		// Skip the first immediate tick to avoid immediate polling
		interval.tick().await;

		loop {
			tokio::select! {
				_ = interval.tick() => {
					let last_block_num = *last_block.lock().await;

					let current_block = match provider.get_block_number().await {
						Ok(block) => block,
						Err(e) => {
							tracing::error!("Failed to get block number: {}", e);
							continue;
						}
					};

					if current_block <= last_block_num {
						continue; // No new blocks
					}

					let filter = Filter::new()
						.address(vec![escrow])
						.event_signature(vec![AGIPublished::SIGNATURE_HASH])
						.from_block(last_block_num + 1)
						.to_block(current_block);

					let logs = match provider.get_logs(&filter).await {
						Ok(logs) => logs,
						Err(e) => {
							tracing::error!("Failed to get logs: {}", e);
							continue;
						}
					};

					Self::process_discovered_logs(logs, &sender);

					*last_block.lock().await = current_block;
				}
				_ = stop_rx.recv() => {
					tracing::info!("Stopping escrow event monitor");
					break;
				}
			}
		}
	}

	/// Subscription-based monitoring loop.
	async fn monitor_subscription(
		provider: DynProvider,
		escrow: AlloyAddress,
		sender: mpsc::UnboundedSender<U256>,
		mut stop_rx: broadcast::Receiver<()>,
	) {
		let filter = Filter::new()
			.address(vec![escrow])
			.event_signature(vec![AGIPublished::SIGNATURE_HASH]);

		let subscription = match provider.subscribe_logs(&filter).await {
			Ok(subscription) => subscription,
			Err(e) => {
				tracing::error!("Failed to subscribe to AGIPublished logs: {}", e);
				return;
			},
		};
		let mut stream = subscription.into_stream();

		loop {
			tokio::select! {
				log = stream.next() => {
					match log {
						Some(log) => Self::process_discovered_logs(vec![log], &sender),
						None => {
							tracing::warn!("AGIPublished subscription closed by server");
							break;
						}
					}
				}
				_ = stop_rx.recv() => {
					tracing::info!("Stopping escrow event subscription");
					break;
				}
			}
		}
	}
}

#[async_trait]
impl DiscoveryInterface for EscrowDiscovery {
	async fn backlog(&self) -> Result<Vec<U256>, DiscoveryError> {
		let next_order_id = self.chain.next_order_id().await?;
		let next = u64::try_from(next_order_id).map_err(|_| {
			DiscoveryError::ParseError(format!(
				"nextOrderId {} exceeds the supported range",
				next_order_id
			))
		})?;

		let processed_length = self.chain.processed_agis_length().await?;
		let processed: HashSet<U256> = self
			.chain
			.get_processed_agis(U256::ZERO, processed_length)
			.await?
			.into_iter()
			.collect();

		// Order ids start at 1; everything below nextOrderId that is not
		// processed is still in flight.
		let backlog: Vec<U256> = (1..next)
			.map(U256::from)
			.filter(|id| !processed.contains(id))
			.collect();

		tracing::info!(
			total = next.saturating_sub(1),
			processed = processed.len(),
			backlog = backlog.len(),
			"backlog scan complete"
		);

		Ok(backlog)
	}

	async fn start(&self, sender: mpsc::UnboundedSender<U256>) -> Result<(), DiscoveryError> {
		if self.is_monitoring.swap(true, Ordering::SeqCst) {
			return Err(DiscoveryError::AlreadyMonitoring);
		}

		let (stop_tx, stop_rx) = broadcast::channel(1);
		*self.stop_signal.lock().await = Some(stop_tx);

		let escrow = self.escrow;
		let handle = match &self.provider {
			ProviderMode::Http(provider) => {
				let provider = provider.clone();
				let last_block = self.last_block.clone();
				let interval = self.polling_interval_secs;
				tokio::spawn(async move {
					Self::monitor_polling(provider, escrow, last_block, sender, stop_rx, interval)
						.await;
				})
			},
			ProviderMode::WebSocket(provider) => {
				let provider = provider.clone();
				tokio::spawn(async move {
					Self::monitor_subscription(provider, escrow, sender, stop_rx).await;
				})
			},
		};

		*self.monitoring_handle.lock().await = Some(handle);
		Ok(())
	}

	async fn stop(&self) -> Result<(), DiscoveryError> {
		if let Some(stop_tx) = self.stop_signal.lock().await.take() {
			let _ = stop_tx.send(());
		}

		if let Some(handle) = self.monitoring_handle.lock().await.take() {
			let _ = handle.await;
		}

		self.is_monitoring.store(false, Ordering::SeqCst);
		Ok(())
	}
}
