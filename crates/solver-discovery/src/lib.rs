//! Intent discovery module for the AGI solver system.
//!
//! This module feeds newly published AGI order ids into the queue. Two
//! sources exist: a startup backlog scan that reconstructs the set of
//! unfinished intents from contract state, and live monitoring of the
//! escrow's `AGIPublished` event (WebSocket subscription or HTTP log
//! polling).

use async_trait::async_trait;

use alloy_primitives::U256;
use thiserror::Error;
use tokio::sync::mpsc;

/// Re-export implementations
pub mod implementations {
	pub mod onchain {
		pub mod escrow;
	}
}

pub use implementations::onchain::escrow::EscrowDiscovery;

/// Errors that can occur during intent discovery.
#[derive(Debug, Error)]
pub enum DiscoveryError {
	/// Error that occurs when connecting to the event source.
	#[error("Connection error: {0}")]
	Connection(String),
	/// Error that occurs when parsing event data.
	#[error("Parse error: {0}")]
	ParseError(String),
	/// Error raised by the chain capability during the backlog scan.
	#[error("Chain error: {0}")]
	Chain(#[from] solver_delivery::DeliveryError),
	/// Error that occurs when monitoring is already active.
	#[error("Already monitoring")]
	AlreadyMonitoring,
}

/// Trait defining the interface for discovery implementations.
///
/// Discovered order ids flow through the provided channel; the queue
/// deduplicates, so re-delivery of an id is harmless.
#[async_trait]
pub trait DiscoveryInterface: Send + Sync {
	/// Computes the set of published-but-unfinished order ids from
	/// contract state: `{1..nextOrderId-1}` minus the processed set.
	async fn backlog(&self) -> Result<Vec<U256>, DiscoveryError>;

	/// Starts monitoring for newly published intents, sending each order
	/// id through `sender`.
	async fn start(&self, sender: mpsc::UnboundedSender<U256>) -> Result<(), DiscoveryError>;

	/// Stops monitoring. In-flight notifications may still be delivered.
	async fn stop(&self) -> Result<(), DiscoveryError>;
}
