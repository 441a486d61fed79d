//! Escrow transaction execution.
//!
//! Wraps the on-chain `withdrawAsset` / `depositAsset` operations with
//! approval handling and receipt confirmation. Every submission goes through
//! simulate-then-write and waits for its receipt; a reverted receipt is
//! surfaced as [`DeliveryError::TransactionReverted`] so callers can tell a
//! definitive rejection from a transaction that is merely pending.

use crate::contracts::{IEscrow, IERC20};
use crate::{ChainInterface, DeliveryError};
use alloy_primitives::{Address as AlloyAddress, U256};
use alloy_sol_types::SolCall;
use solver_types::{Address, Transaction, TransactionReceipt};
use std::sync::Arc;

/// Executes escrow contract calls on behalf of the solver account.
pub struct TransactionExecutor {
	chain: Arc<dyn ChainInterface>,
	escrow_address: Address,
	solver_address: Address,
	chain_id: u64,
}

impl TransactionExecutor {
	pub fn new(
		chain: Arc<dyn ChainInterface>,
		escrow_address: Address,
		solver_address: Address,
		chain_id: u64,
	) -> Self {
		Self {
			chain,
			escrow_address,
			solver_address,
			chain_id,
		}
	}

	/// The solver account address transactions are sent from.
	pub fn solver_address(&self) -> &Address {
		&self.solver_address
	}

	/// The escrow contract address.
	pub fn escrow_address(&self) -> &Address {
		&self.escrow_address
	}

	/// Calls `withdrawAsset(orderId)` and waits for the receipt.
	///
	/// On success the contract flips the order status from 0 to 1; the
	/// solver keeps no internal state for this step.
	pub async fn withdraw_asset(&self, order_id: U256) -> Result<TransactionReceipt, DeliveryError> {
		let data = IEscrow::withdrawAssetCall { orderId: order_id }.abi_encode();
		let tx = self.contract_tx(self.escrow_address.clone(), data, U256::ZERO);

		tracing::debug!(order_id = %order_id, "submitting withdrawAsset");
		self.send_and_confirm(tx, "withdrawAsset").await
	}

	/// Calls `depositAsset(orderId, amount)` and waits for the receipt.
	///
	/// The escrow pulls the buy asset from the solver, so the ERC-20
	/// allowance is topped up first when it does not cover `amount`. A zero
	/// buy-asset address denotes the native asset, which travels as call
	/// value instead of an allowance.
	pub async fn deposit_asset(
		&self,
		order_id: U256,
		asset_to_buy: &Address,
		amount: U256,
	) -> Result<TransactionReceipt, DeliveryError> {
		let mut value = U256::ZERO;

		if asset_to_buy.is_zero() {
			value = amount;
		} else {
			let allowance = self
				.chain
				.get_allowance(&self.solver_address, &self.escrow_address, asset_to_buy)
				.await?;
			if allowance < amount {
				tracing::debug!(
					order_id = %order_id,
					token = %asset_to_buy,
					%allowance,
					%amount,
					"allowance below deposit amount, approving"
				);
				self.approve_erc20(asset_to_buy, &self.escrow_address, amount)
					.await?;
			}
		}

		let data = IEscrow::depositAssetCall {
			orderId: order_id,
			amount,
		}
		.abi_encode();
		let tx = self.contract_tx(self.escrow_address.clone(), data, value);

		tracing::debug!(order_id = %order_id, amount = %amount, "submitting depositAsset");
		self.send_and_confirm(tx, "depositAsset").await
	}

	/// Calls ERC-20 `approve(spender, amount)` and waits for the receipt.
	pub async fn approve_erc20(
		&self,
		token: &Address,
		spender: &Address,
		amount: U256,
	) -> Result<TransactionReceipt, DeliveryError> {
		let data = IERC20::approveCall {
			spender: to_alloy(spender),
			amount,
		}
		.abi_encode();
		let tx = self.contract_tx(token.clone(), data, U256::ZERO);

		self.send_and_confirm(tx, "approve").await
	}

	fn contract_tx(&self, to: Address, data: Vec<u8>, value: U256) -> Transaction {
		Transaction {
			to: Some(to),
			data,
			value,
			chain_id: self.chain_id,
			nonce: None,
			gas_limit: None,
		}
	}

	async fn send_and_confirm(
		&self,
		tx: Transaction,
		label: &str,
	) -> Result<TransactionReceipt, DeliveryError> {
		let hash = self.chain.simulate_and_send(tx).await?;
		let receipt = self.chain.wait_for_receipt(&hash).await?;

		if !receipt.success {
			return Err(DeliveryError::TransactionReverted(format!(
				"{} reverted in transaction {}",
				label, receipt.hash
			)));
		}

		tracing::info!(tx_hash = %receipt.hash, block = receipt.block_number, "{} confirmed", label);
		Ok(receipt)
	}
}

fn to_alloy(address: &Address) -> AlloyAddress {
	AlloyAddress::from_slice(&address.0)
}
