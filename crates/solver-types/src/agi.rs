//! Agent Generated Intent types.
//!
//! An AGI is a single trade instruction published on-chain by the agent:
//! sell X of asset A, buy some amount of asset B, identified by a monotonic
//! order id. The escrow contract tracks three authoritative statuses; the
//! solver overlays two internal statuses on top of them while a swap is in
//! flight. This module defines both enums, the merged "effective" status
//! rule, and the swap bookkeeping record.

use crate::account::Address;
use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The only intent type the solver executes. Other values are rejected.
pub const TRADE_INTENT_TYPE: u8 = 0;

/// Authoritative order status tracked by the escrow contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgiStatus {
	/// Awaiting `withdrawAsset` by the solver.
	PendingDispense,
	/// Sell asset is in the solver's custody; proceeds pending.
	DispensedPendingProceeds,
	/// Terminal success: proceeds deposited back.
	ProceedsReceived,
}

impl AgiStatus {
	/// The numeric status as stored by the contract.
	pub fn as_u8(&self) -> u8 {
		match self {
			AgiStatus::PendingDispense => 0,
			AgiStatus::DispensedPendingProceeds => 1,
			AgiStatus::ProceedsReceived => 2,
		}
	}
}

impl TryFrom<u8> for AgiStatus {
	type Error = String;

	fn try_from(value: u8) -> Result<Self, Self::Error> {
		match value {
			0 => Ok(AgiStatus::PendingDispense),
			1 => Ok(AgiStatus::DispensedPendingProceeds),
			2 => Ok(AgiStatus::ProceedsReceived),
			other => Err(format!("unknown AGI order status: {}", other)),
		}
	}
}

impl fmt::Display for AgiStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_u8())
	}
}

/// Order status extended with the solver's internal swap phases.
///
/// The contract only models statuses 0, 1 and 2; statuses 3 and 4 exist in
/// solver memory while the escrowed asset is being swapped. They are only
/// meaningful on top of contract status 1, after the custody handoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtendedStatus {
	/// Contract status 0: awaiting `withdrawAsset`.
	PendingDispense,
	/// Contract status 1: asset in custody, swap not yet started.
	DispensedPendingProceeds,
	/// Internal status 3: swap in progress or about to be started.
	SwapInitiated,
	/// Internal status 4: swap done, buy amount known, awaiting deposit.
	SwapCompleted,
	/// Contract status 2: terminal success.
	ProceedsReceived,
}

impl ExtendedStatus {
	/// The numeric value used in logs and operator tooling.
	pub fn as_u8(&self) -> u8 {
		match self {
			ExtendedStatus::PendingDispense => 0,
			ExtendedStatus::DispensedPendingProceeds => 1,
			ExtendedStatus::SwapInitiated => 3,
			ExtendedStatus::SwapCompleted => 4,
			ExtendedStatus::ProceedsReceived => 2,
		}
	}

	/// Merges the contract status with the solver's internal overlay.
	///
	/// The contract is the source of truth whenever it can be: the internal
	/// overlay only applies while the contract reports status 1, the unique
	/// point where the solver holds custody and the contract cannot observe
	/// swap progress. For every other contract status the overlay is stale
	/// and is ignored.
	pub fn effective(contract: AgiStatus, overlay: Option<ExtendedStatus>) -> ExtendedStatus {
		match (contract, overlay) {
			(AgiStatus::DispensedPendingProceeds, Some(internal)) => internal,
			(AgiStatus::PendingDispense, _) => ExtendedStatus::PendingDispense,
			(AgiStatus::DispensedPendingProceeds, None) => {
				ExtendedStatus::DispensedPendingProceeds
			},
			(AgiStatus::ProceedsReceived, _) => ExtendedStatus::ProceedsReceived,
		}
	}
}

impl From<AgiStatus> for ExtendedStatus {
	fn from(status: AgiStatus) -> Self {
		match status {
			AgiStatus::PendingDispense => ExtendedStatus::PendingDispense,
			AgiStatus::DispensedPendingProceeds => ExtendedStatus::DispensedPendingProceeds,
			AgiStatus::ProceedsReceived => ExtendedStatus::ProceedsReceived,
		}
	}
}

impl fmt::Display for ExtendedStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.as_u8())
	}
}

/// On-chain view of a published intent, as returned by `viewAGI`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Agi {
	/// Intent type; only [`TRADE_INTENT_TYPE`] is supported.
	pub intent_type: u8,
	/// Asset the agent wants to sell (zero address = native asset).
	pub asset_to_sell: Address,
	/// Amount to sell. Carried as a 256-bit integer end to end.
	pub amount_to_sell: U256,
	/// Asset the agent wants to buy.
	pub asset_to_buy: Address,
	/// Monotonically increasing order identifier.
	pub order_id: U256,
	/// Authoritative contract status.
	pub status: AgiStatus,
}

/// Phase of the off-chain swap for one intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapPhase {
	/// A swap call is in flight.
	Pending,
	/// The swap completed and the buy amount is cached.
	Completed,
	/// The most recent swap attempt failed.
	Failed,
}

/// Per-intent swap bookkeeping, keyed by order id.
///
/// The record outlives individual attempts so that a completed result is
/// never recomputed and failed attempts stay countable after eviction.
#[derive(Debug, Clone)]
pub struct SwapRecord {
	/// Current phase of the swap.
	pub phase: SwapPhase,
	/// Buy amount produced by a completed swap.
	pub amount_to_buy: Option<U256>,
	/// Number of swap attempts made. Monotone non-decreasing.
	pub attempts: u32,
}
