//! Utility functions for common type conversions.

use crate::account::Address;
use std::time::{SystemTime, UNIX_EPOCH};

/// Ensures a hex string carries a `0x` prefix.
pub fn with_0x_prefix(hex: &str) -> String {
	if hex.starts_with("0x") {
		hex.to_string()
	} else {
		format!("0x{}", hex)
	}
}

/// Parses a hex string (with or without `0x` prefix) into an [`Address`].
pub fn parse_address(hex_str: &str) -> Result<Address, String> {
	let stripped = hex_str.trim_start_matches("0x");
	let bytes = hex::decode(stripped).map_err(|e| format!("Invalid hex address: {}", e))?;
	if bytes.len() != 20 {
		return Err(format!(
			"Invalid address length: expected 20 bytes, got {}",
			bytes.len()
		));
	}
	Ok(Address(bytes))
}

/// Returns the current Unix timestamp in seconds.
pub fn current_timestamp() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.unwrap_or_default()
		.as_secs()
}
