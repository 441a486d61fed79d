//! Configuration module for the AGI solver system.
//!
//! This module provides structures and utilities for managing solver
//! configuration. It supports loading configuration from TOML files and
//! provides validation to ensure all required configuration values are
//! properly set.
//!
//! Secrets (the solver private key) may be given inline or as `${ENV_VAR}`
//! placeholders resolved at load time.

use regex::Regex;
use serde::{Deserialize, Serialize};
use solver_types::Address;
use std::collections::HashMap;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
	/// Error that occurs during file I/O operations.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	/// Error that occurs when parsing TOML configuration.
	#[error("Configuration error: {0}")]
	Parse(String),
	/// Error that occurs when configuration validation fails.
	#[error("Validation error: {0}")]
	Validation(String),
}

impl From<toml::de::Error> for ConfigError {
	fn from(err: toml::de::Error) -> Self {
		// Extract just the message without the huge input dump
		ConfigError::Parse(err.message().to_string())
	}
}

/// Main configuration structure for the AGI solver.
///
/// Contains all sections required for the solver to operate: queue timings,
/// network endpoints, the escrow contract, account credentials, the swap
/// backend, failed-swap storage and discovery behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	/// Queue and retry timings for the solver instance.
	#[serde(default)]
	pub solver: SolverConfig,
	/// RPC endpoints and chain identity.
	pub network: NetworkConfig,
	/// Escrow contract the solver serves.
	pub contract: ContractConfig,
	/// Solver account credentials.
	pub account: AccountConfig,
	/// Swap backend selection and parameters.
	pub swap: SwapConfig,
	/// Failed-swap storage settings.
	#[serde(default)]
	pub storage: StorageConfig,
	/// Intent discovery settings.
	#[serde(default)]
	pub discovery: DiscoveryConfig,
	/// Transaction delivery settings.
	#[serde(default)]
	pub delivery: DeliveryConfig,
}

/// Queue and retry timings for the solver instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SolverConfig {
	/// Ticker period in milliseconds.
	#[serde(default = "default_check_interval_ms")]
	pub check_interval_ms: u64,
	/// Delay after generic errors and successful steps, in milliseconds.
	#[serde(default = "default_retry_delay_ms")]
	pub retry_delay_ms: u64,
	/// Delay after swap errors, in milliseconds.
	#[serde(default = "default_swap_retry_delay_ms")]
	pub swap_retry_delay_ms: u64,
	/// Swap-error ceiling before an intent is evicted.
	#[serde(default = "default_max_retries")]
	pub max_retries: u32,
}

impl Default for SolverConfig {
	fn default() -> Self {
		Self {
			check_interval_ms: default_check_interval_ms(),
			retry_delay_ms: default_retry_delay_ms(),
			swap_retry_delay_ms: default_swap_retry_delay_ms(),
			max_retries: default_max_retries(),
		}
	}
}

fn default_check_interval_ms() -> u64 {
	2000
}

fn default_retry_delay_ms() -> u64 {
	1000
}

fn default_swap_retry_delay_ms() -> u64 {
	30000
}

fn default_max_retries() -> u32 {
	2
}

/// RPC endpoints and chain identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
	/// Chain ID for replay protection and signing.
	pub chain_id: u64,
	/// HTTP RPC endpoint.
	pub http_url: String,
	/// Optional WebSocket RPC endpoint for event subscriptions.
	#[serde(default)]
	pub ws_url: Option<String>,
}

/// Escrow contract the solver serves.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ContractConfig {
	/// Address of the escrow contract publishing AGIs.
	pub escrow_address: Address,
}

/// Solver account credentials.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AccountConfig {
	/// Hex-encoded private key, or a `${ENV_VAR}` placeholder.
	pub private_key: String,
}

/// Swap backend selection and parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SwapConfig {
	/// Which implementation to use as primary (e.g. "aggregator", "mock").
	pub primary: String,
	/// Slippage tolerance passed to the swap capability.
	#[serde(default = "default_slippage")]
	pub default_slippage: f64,
	/// Map of swap implementation names to their configurations.
	#[serde(default)]
	pub implementations: HashMap<String, toml::Value>,
}

fn default_slippage() -> f64 {
	0.05
}

/// Failed-swap storage settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// Path of the SQLite database holding the failed-swaps table.
	#[serde(default = "default_db_path")]
	pub db_path: String,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			db_path: default_db_path(),
		}
	}
}

fn default_db_path() -> String {
	"failed_swaps.db".to_string()
}

/// Intent discovery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DiscoveryConfig {
	/// Polling interval for the event monitoring loop in seconds.
	/// 0 selects WebSocket subscription mode instead of polling.
	#[serde(default = "default_polling_interval_secs")]
	pub polling_interval_secs: u64,
}

impl Default for DiscoveryConfig {
	fn default() -> Self {
		Self {
			polling_interval_secs: default_polling_interval_secs(),
		}
	}
}

fn default_polling_interval_secs() -> u64 {
	3
}

/// Transaction delivery settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeliveryConfig {
	/// Interval between receipt polls in seconds.
	#[serde(default = "default_receipt_poll_interval_secs")]
	pub receipt_poll_interval_secs: u64,
	/// Maximum number of receipt polls before giving up on a hash.
	#[serde(default = "default_receipt_poll_max_attempts")]
	pub receipt_poll_max_attempts: u32,
}

impl Default for DeliveryConfig {
	fn default() -> Self {
		Self {
			receipt_poll_interval_secs: default_receipt_poll_interval_secs(),
			receipt_poll_max_attempts: default_receipt_poll_max_attempts(),
		}
	}
}

fn default_receipt_poll_interval_secs() -> u64 {
	3
}

fn default_receipt_poll_max_attempts() -> u32 {
	1000
}

impl Config {
	/// Loads configuration from a TOML file, resolving `${ENV_VAR}`
	/// placeholders, and validates it.
	pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path)?;
		Self::from_toml_str(&content)
	}

	/// Parses and validates configuration from a TOML string.
	pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
		let resolved = resolve_env_placeholders(content)?;
		let config: Config = toml::from_str(&resolved)?;
		config.validate()?;
		Ok(config)
	}

	/// Validates values serde cannot check on its own.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.solver.check_interval_ms == 0 {
			return Err(ConfigError::Validation(
				"solver.check_interval_ms must be positive".to_string(),
			));
		}
		if self.network.http_url.is_empty() {
			return Err(ConfigError::Validation(
				"network.http_url must not be empty".to_string(),
			));
		}
		if self.account.private_key.is_empty() {
			return Err(ConfigError::Validation(
				"account.private_key must not be empty".to_string(),
			));
		}
		if !(0.0..1.0).contains(&self.swap.default_slippage) {
			return Err(ConfigError::Validation(
				"swap.default_slippage must be in [0, 1)".to_string(),
			));
		}
		if self.swap.primary.is_empty() {
			return Err(ConfigError::Validation(
				"swap.primary must name an implementation".to_string(),
			));
		}
		if self.delivery.receipt_poll_max_attempts == 0 {
			return Err(ConfigError::Validation(
				"delivery.receipt_poll_max_attempts must be positive".to_string(),
			));
		}
		Ok(())
	}

	/// Returns the configuration table for the primary swap implementation,
	/// if one was provided.
	pub fn swap_implementation_config(&self) -> Option<&toml::Value> {
		self.swap.implementations.get(&self.swap.primary)
	}
}

/// Replaces `${VAR}` placeholders with the value of the environment
/// variable `VAR`. Unset variables are a validation error so that missing
/// secrets fail startup instead of producing an unusable key.
fn resolve_env_placeholders(content: &str) -> Result<String, ConfigError> {
	let pattern = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
		.map_err(|e| ConfigError::Parse(e.to_string()))?;

	let mut missing = Vec::new();
	let resolved = pattern.replace_all(content, |caps: &regex::Captures| {
		let name = &caps[1];
		match std::env::var(name) {
			Ok(value) => value,
			Err(_) => {
				missing.push(name.to_string());
				String::new()
			},
		}
	});

	if missing.is_empty() {
		Ok(resolved.into_owned())
	} else {
		Err(ConfigError::Validation(format!(
			"missing environment variables: {}",
			missing.join(", ")
		)))
	}
}
