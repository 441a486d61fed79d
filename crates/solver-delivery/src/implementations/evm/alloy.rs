//! Alloy-based implementation of the chain interface.
//!
//! Uses the Alloy library to read escrow state and submit transactions on
//! an EVM chain. The provider carries the solver wallet, nonce and gas
//! fillers, and a retry backoff layer for transient RPC failures; receipt
//! lookups poll with bounded retries so node lag does not abort a step.

use crate::contracts::{IEscrow, IERC20};
use crate::{ChainInterface, DeliveryError};
use alloy_network::EthereumWallet;
use alloy_primitives::{Address as AlloyAddress, FixedBytes, U256};
use alloy_provider::{
	fillers::{ChainIdFiller, GasFiller, NonceFiller, SimpleNonceManager},
	DynProvider, Provider, ProviderBuilder,
};
use alloy_rpc_client::RpcClient;
use alloy_rpc_types::TransactionRequest;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use alloy_transport::layers::RetryBackoffLayer;
use async_trait::async_trait;
use solver_types::{
	Address, Agi, AgiStatus, Transaction as SolverTransaction, TransactionHash,
	TransactionReceipt,
};
use std::time::Duration;

/// Alloy-based EVM chain implementation.
pub struct AlloyChain {
	/// Wallet-carrying provider for the escrow chain.
	provider: DynProvider,
	/// Escrow contract address.
	escrow: AlloyAddress,
	/// Interval between receipt polls.
	receipt_poll_interval: Duration,
	/// Maximum number of receipt polls before giving up.
	receipt_poll_max_attempts: u32,
}

impl AlloyChain {
	/// Creates a new AlloyChain instance.
	///
	/// Configures an Alloy provider for the given RPC URL with the solver
	/// signer for transaction submission.
	pub fn new(
		http_url: &str,
		chain_id: u64,
		escrow_address: &Address,
		signer: PrivateKeySigner,
		receipt_poll_interval: Duration,
		receipt_poll_max_attempts: u32,
	) -> Result<Self, DeliveryError> {
		let url = http_url
			.parse()
			.map_err(|e| DeliveryError::Network(format!("Invalid RPC URL: {}", e)))?;

		let chain_signer = signer.with_chain_id(Some(chain_id));
		let wallet = EthereumWallet::from(chain_signer);

		// Retry layer for network errors and rate limits
		let retry_layer = RetryBackoffLayer::new(
			5,    // max_retry: retry up to 5 times
			1000, // backoff: initial backoff in milliseconds
			10,   // cups: compute units per second
		);

		let client = RpcClient::builder().layer(retry_layer).http(url);

		let provider = ProviderBuilder::new()
			.filler(NonceFiller::new(SimpleNonceManager::default()))
			.filler(GasFiller)
			.filler(ChainIdFiller::default())
			.wallet(wallet)
			.connect_client(client);

		if escrow_address.0.len() != 20 {
			return Err(DeliveryError::InvalidData(
				"Invalid escrow address length".to_string(),
			));
		}

		Ok(Self {
			provider: provider.erased(),
			escrow: AlloyAddress::from_slice(&escrow_address.0),
			receipt_poll_interval,
			receipt_poll_max_attempts,
		})
	}

	/// Executes a read-only call against the escrow contract and returns the
	/// raw return data.
	async fn escrow_call(&self, calldata: Vec<u8>) -> Result<Vec<u8>, DeliveryError> {
		let request = TransactionRequest::default()
			.to(self.escrow)
			.input(calldata.into());

		let bytes = self
			.provider
			.call(request)
			.await
			.map_err(|e| DeliveryError::Network(format!("Contract read failed: {}", e)))?;

		Ok(bytes.to_vec())
	}
}

#[async_trait]
impl ChainInterface for AlloyChain {
	async fn read_agi(&self, order_id: U256) -> Result<Agi, DeliveryError> {
		let calldata = IEscrow::viewAGICall { orderId: order_id }.abi_encode();
		let bytes = self.escrow_call(calldata).await?;

		let ret = IEscrow::viewAGICall::abi_decode_returns(&bytes, true)
			.map_err(|e| DeliveryError::InvalidData(format!("Failed to decode viewAGI: {}", e)))?;

		let status = AgiStatus::try_from(ret.orderStatus).map_err(DeliveryError::InvalidData)?;

		Ok(Agi {
			intent_type: ret.intentType,
			asset_to_sell: ret.assetToSell.into(),
			amount_to_sell: ret.amountToSell,
			asset_to_buy: ret.assetToBuy.into(),
			order_id: ret.id,
			status,
		})
	}

	async fn simulate_and_send(
		&self,
		tx: SolverTransaction,
	) -> Result<TransactionHash, DeliveryError> {
		let request: TransactionRequest = tx.into();

		// Simulate first so contract rejections surface before any gas is
		// spent and before the nonce advances.
		self.provider
			.call(request.clone())
			.await
			.map_err(|e| DeliveryError::Simulation(e.to_string()))?;

		let pending = self.provider.send_transaction(request).await.map_err(|e| {
			DeliveryError::Network(format!("Failed to send transaction: {}", e))
		})?;

		let tx_hash = *pending.tx_hash();
		tracing::debug!(tx_hash = %tx_hash, "transaction submitted");

		Ok(TransactionHash(tx_hash.0.to_vec()))
	}

	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		if hash.0.len() != 32 {
			return Err(DeliveryError::InvalidData(
				"Invalid transaction hash length".to_string(),
			));
		}
		let tx_hash = FixedBytes::<32>::from_slice(&hash.0);

		for attempt in 1..=self.receipt_poll_max_attempts {
			match self.provider.get_transaction_receipt(tx_hash).await {
				Ok(Some(receipt)) => {
					return Ok(TransactionReceipt {
						hash: TransactionHash(receipt.transaction_hash.0.to_vec()),
						block_number: receipt.block_number.unwrap_or(0),
						success: receipt.status(),
					});
				},
				Ok(None) => {
					tracing::trace!(tx_hash = %hash, attempt, "receipt not yet available");
				},
				Err(e) => {
					tracing::debug!(tx_hash = %hash, attempt, "receipt query failed: {}", e);
				},
			}

			tokio::time::sleep(self.receipt_poll_interval).await;
		}

		Err(DeliveryError::Network(format!(
			"No receipt for {} after {} attempts",
			hash, self.receipt_poll_max_attempts
		)))
	}

	async fn get_allowance(
		&self,
		owner: &Address,
		spender: &Address,
		token: &Address,
	) -> Result<U256, DeliveryError> {
		let calldata = IERC20::allowanceCall {
			owner: AlloyAddress::from_slice(&owner.0),
			spender: AlloyAddress::from_slice(&spender.0),
		}
		.abi_encode();

		let request = TransactionRequest::default()
			.to(AlloyAddress::from_slice(&token.0))
			.input(calldata.into());

		let bytes = self
			.provider
			.call(request)
			.await
			.map_err(|e| DeliveryError::Network(format!("Failed to call allowance: {}", e)))?;

		let ret = IERC20::allowanceCall::abi_decode_returns(&bytes, true).map_err(|e| {
			DeliveryError::InvalidData(format!("Failed to decode allowance: {}", e))
		})?;

		Ok(ret.remaining)
	}

	async fn next_order_id(&self) -> Result<U256, DeliveryError> {
		let bytes = self
			.escrow_call(IEscrow::nextOrderIdCall {}.abi_encode())
			.await?;
		let ret = IEscrow::nextOrderIdCall::abi_decode_returns(&bytes, true).map_err(|e| {
			DeliveryError::InvalidData(format!("Failed to decode nextOrderId: {}", e))
		})?;
		Ok(ret.next)
	}

	async fn processed_agis_length(&self) -> Result<U256, DeliveryError> {
		let bytes = self
			.escrow_call(IEscrow::processedAGIsLengthCall {}.abi_encode())
			.await?;
		let ret =
			IEscrow::processedAGIsLengthCall::abi_decode_returns(&bytes, true).map_err(|e| {
				DeliveryError::InvalidData(format!("Failed to decode processedAGIsLength: {}", e))
			})?;
		Ok(ret.length)
	}

	async fn get_processed_agis(
		&self,
		start: U256,
		end: U256,
	) -> Result<Vec<U256>, DeliveryError> {
		let bytes = self
			.escrow_call(IEscrow::getProcessedAGIsCall { start, end }.abi_encode())
			.await?;
		let ret = IEscrow::getProcessedAGIsCall::abi_decode_returns(&bytes, true).map_err(|e| {
			DeliveryError::InvalidData(format!("Failed to decode getProcessedAGIs: {}", e))
		})?;
		Ok(ret.ids)
	}
}
