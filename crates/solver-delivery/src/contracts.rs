//! Contract bindings for the escrow and ERC-20 surfaces.

use alloy_sol_types::sol;

sol! {
	/// Escrow contract surface used by the solver.
	///
	/// `withdrawAsset` requires contract status 0 and is callable only by
	/// the registered solver; `depositAsset` requires status 1 and pulls the
	/// buy asset from the caller via a prior allowance.
	interface IEscrow {
		function viewAGI(uint256 orderId) external view returns (
			uint8 intentType,
			address assetToSell,
			uint256 amountToSell,
			address assetToBuy,
			uint256 id,
			uint8 orderStatus
		);
		function withdrawAsset(uint256 orderId) external;
		function depositAsset(uint256 orderId, uint256 amount) external;
		function nextOrderId() external view returns (uint256 next);
		function processedAGIsLength() external view returns (uint256 length);
		function getProcessedAGIs(uint256 start, uint256 end) external view returns (uint256[] memory ids);
	}

	/// Minimal ERC-20 surface needed for deposit allowances.
	interface IERC20 {
		function approve(address spender, uint256 amount) external returns (bool ok);
		function allowance(address owner, address spender) external view returns (uint256 remaining);
	}
}
