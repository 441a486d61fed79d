//! Scenario tests for the queue manager.
//!
//! These drive the manager over a stateful fake escrow chain and a scripted
//! swap backend, covering the full lifecycle: dispense, swap, deposit,
//! cleanup, retry schedules, eviction, and restart recovery.

use crate::manager::QueueManager;
use crate::retry::RetryPolicy;
use alloy_primitives::U256;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use solver_delivery::contracts::IEscrow;
use solver_delivery::{ChainInterface, DeliveryError, TransactionExecutor};
use solver_storage::implementations::memory::MemoryFailedSwapStore;
use solver_storage::{FailedSwapStore, StoreError};
use solver_swap::{SwapCoordinator, SwapError, SwapInterface, SwapRequest};
use solver_types::{
	parse_address, Address, Agi, AgiStatus, ExtendedStatus, FailedSwap, SwapPhase, Transaction,
	TransactionHash, TransactionReceipt,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Stateful fake of the escrow chain: decodes submitted calldata and applies
/// the contract's status transitions.
struct FakeChain {
	agis: Mutex<HashMap<U256, Agi>>,
	allowance: Mutex<U256>,
	/// Receipt waits that fail before the next one succeeds.
	fail_receipts: Mutex<u32>,
	read_calls: AtomicU32,
	withdraw_calls: AtomicU32,
	deposit_calls: AtomicU32,
	approve_calls: AtomicU32,
	in_flight: AtomicU32,
	max_in_flight: AtomicU32,
}

impl FakeChain {
	fn new() -> Self {
		Self {
			agis: Mutex::new(HashMap::new()),
			allowance: Mutex::new(U256::MAX),
			fail_receipts: Mutex::new(0),
			read_calls: AtomicU32::new(0),
			withdraw_calls: AtomicU32::new(0),
			deposit_calls: AtomicU32::new(0),
			approve_calls: AtomicU32::new(0),
			in_flight: AtomicU32::new(0),
			max_in_flight: AtomicU32::new(0),
		}
	}

	fn insert_agi(&self, agi: Agi) {
		self.agis.lock().unwrap().insert(agi.order_id, agi);
	}

	fn status(&self, order_id: U256) -> AgiStatus {
		self.agis.lock().unwrap()[&order_id].status
	}

	fn fail_next_receipts(&self, count: u32) {
		*self.fail_receipts.lock().unwrap() = count;
	}

	fn enter(&self) {
		let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
		self.max_in_flight.fetch_max(current, Ordering::SeqCst);
	}

	fn exit(&self) {
		self.in_flight.fetch_sub(1, Ordering::SeqCst);
	}
}

#[async_trait]
impl ChainInterface for FakeChain {
	async fn read_agi(&self, order_id: U256) -> Result<Agi, DeliveryError> {
		self.enter();
		self.read_calls.fetch_add(1, Ordering::SeqCst);
		tokio::time::sleep(Duration::from_millis(5)).await;
		let result = self
			.agis
			.lock()
			.unwrap()
			.get(&order_id)
			.cloned()
			.ok_or_else(|| DeliveryError::InvalidData(format!("unknown AGI {}", order_id)));
		self.exit();
		result
	}

	async fn simulate_and_send(&self, tx: Transaction) -> Result<TransactionHash, DeliveryError> {
		self.enter();
		let selector: [u8; 4] = tx.data[..4].try_into().expect("calldata too short");

		let result = if selector == IEscrow::withdrawAssetCall::SELECTOR {
			let call = IEscrow::withdrawAssetCall::abi_decode(&tx.data, true)
				.expect("bad withdraw calldata");
			let mut agis = self.agis.lock().unwrap();
			let agi = agis.get_mut(&call.orderId).expect("withdraw of unknown AGI");
			if agi.status != AgiStatus::PendingDispense {
				Err(DeliveryError::Simulation(
					"order not pending dispense".to_string(),
				))
			} else {
				agi.status = AgiStatus::DispensedPendingProceeds;
				self.withdraw_calls.fetch_add(1, Ordering::SeqCst);
				Ok(TransactionHash(vec![0x11; 32]))
			}
		} else if selector == IEscrow::depositAssetCall::SELECTOR {
			let call = IEscrow::depositAssetCall::abi_decode(&tx.data, true)
				.expect("bad deposit calldata");
			let mut agis = self.agis.lock().unwrap();
			let agi = agis.get_mut(&call.orderId).expect("deposit of unknown AGI");
			if agi.status != AgiStatus::DispensedPendingProceeds {
				Err(DeliveryError::Simulation(
					"order not awaiting proceeds".to_string(),
				))
			} else {
				agi.status = AgiStatus::ProceedsReceived;
				self.deposit_calls.fetch_add(1, Ordering::SeqCst);
				Ok(TransactionHash(vec![0x22; 32]))
			}
		} else {
			// ERC-20 approve
			self.approve_calls.fetch_add(1, Ordering::SeqCst);
			Ok(TransactionHash(vec![0x33; 32]))
		};

		self.exit();
		result
	}

	async fn wait_for_receipt(
		&self,
		hash: &TransactionHash,
	) -> Result<TransactionReceipt, DeliveryError> {
		{
			let mut failures = self.fail_receipts.lock().unwrap();
			if *failures > 0 {
				*failures -= 1;
				return Err(DeliveryError::Network(
					"no receipt within the polling budget".to_string(),
				));
			}
		}
		Ok(TransactionReceipt {
			hash: hash.clone(),
			block_number: 1,
			success: true,
		})
	}

	async fn get_allowance(
		&self,
		_owner: &Address,
		_spender: &Address,
		_token: &Address,
	) -> Result<U256, DeliveryError> {
		Ok(*self.allowance.lock().unwrap())
	}

	async fn next_order_id(&self) -> Result<U256, DeliveryError> {
		Ok(U256::ZERO)
	}

	async fn processed_agis_length(&self) -> Result<U256, DeliveryError> {
		Ok(U256::ZERO)
	}

	async fn get_processed_agis(
		&self,
		_start: U256,
		_end: U256,
	) -> Result<Vec<U256>, DeliveryError> {
		Ok(Vec::new())
	}
}

/// Swap backend that pops one scripted result per call.
struct ScriptedSwap {
	results: Mutex<VecDeque<Result<U256, SwapError>>>,
	calls: AtomicU32,
}

impl ScriptedSwap {
	fn new(results: Vec<Result<U256, SwapError>>) -> Self {
		Self {
			results: Mutex::new(results.into()),
			calls: AtomicU32::new(0),
		}
	}
}

#[async_trait]
impl SwapInterface for ScriptedSwap {
	async fn execute(&self, _request: &SwapRequest) -> Result<U256, SwapError> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.results
			.lock()
			.unwrap()
			.pop_front()
			.unwrap_or_else(|| Err(SwapError::Rejected("script exhausted".to_string())))
	}
}

/// Failed-swap store that counts record/delete attempts.
struct CountingStore {
	inner: MemoryFailedSwapStore,
	records: AtomicU32,
	deletes: AtomicU32,
}

impl CountingStore {
	fn new() -> Self {
		Self {
			inner: MemoryFailedSwapStore::new(),
			records: AtomicU32::new(0),
			deletes: AtomicU32::new(0),
		}
	}
}

#[async_trait]
impl FailedSwapStore for CountingStore {
	async fn record(&self, failure: &FailedSwap) -> Result<(), StoreError> {
		self.records.fetch_add(1, Ordering::SeqCst);
		self.inner.record(failure).await
	}

	async fn delete(&self, order_id: U256) -> Result<(), StoreError> {
		self.deletes.fetch_add(1, Ordering::SeqCst);
		self.inner.delete(order_id).await
	}

	async fn contains(&self, order_id: U256) -> Result<bool, StoreError> {
		self.inner.contains(order_id).await
	}

	async fn all(&self) -> Result<Vec<FailedSwap>, StoreError> {
		self.inner.all().await
	}
}

struct Harness {
	manager: Arc<QueueManager>,
	chain: Arc<FakeChain>,
	backend: Arc<ScriptedSwap>,
	swaps: Arc<SwapCoordinator>,
	store: Arc<CountingStore>,
}

fn escrow() -> Address {
	parse_address("0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee").unwrap()
}

fn solver() -> Address {
	parse_address("0x5011e25011e25011e25011e25011e25011e25011").unwrap()
}

fn token_a() -> Address {
	parse_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap()
}

fn token_b() -> Address {
	parse_address("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap()
}

fn trade_agi(order_id: u64, status: AgiStatus) -> Agi {
	Agi {
		intent_type: 0,
		asset_to_sell: token_a(),
		amount_to_sell: U256::from(100u64),
		asset_to_buy: token_b(),
		order_id: U256::from(order_id),
		status,
	}
}

fn harness(swap_results: Vec<Result<U256, SwapError>>) -> Harness {
	let chain = Arc::new(FakeChain::new());
	let backend = Arc::new(ScriptedSwap::new(swap_results));
	let swaps = Arc::new(SwapCoordinator::new(backend.clone(), 0.05));
	let store = Arc::new(CountingStore::new());
	let executor = Arc::new(TransactionExecutor::new(
		chain.clone(),
		escrow(),
		solver(),
		31337,
	));
	let manager = QueueManager::new(
		chain.clone(),
		executor,
		swaps.clone(),
		store.clone(),
		RetryPolicy::default(),
		Duration::from_secs(2),
	);
	Harness {
		manager,
		chain,
		backend,
		swaps,
		store,
	}
}

/// Advances past the success delay, imitating one ticker period.
async fn tick() {
	tokio::time::advance(Duration::from_secs(2)).await;
}

#[tokio::test(start_paused = true)]
async fn test_happy_path_trade() {
	let h = harness(vec![Ok(U256::from(100u64))]);
	let id = U256::from(7u64);
	h.chain.insert_agi(trade_agi(7, AgiStatus::PendingDispense));
	h.manager.add(id).await;
	h.manager.stop_ticker().await;

	// Tick 1: withdraw, contract status flips to 1, no internal overlay.
	h.manager.step(id).await;
	assert_eq!(h.chain.withdraw_calls.load(Ordering::SeqCst), 1);
	assert_eq!(h.chain.status(id), AgiStatus::DispensedPendingProceeds);
	assert_eq!(h.manager.progress_of(id).unwrap().ext_status, None);

	// Tick 2: bookkeeping only, internal status moves to SwapInitiated.
	tick().await;
	h.manager.step(id).await;
	assert_eq!(
		h.manager.progress_of(id).unwrap().ext_status,
		Some(ExtendedStatus::SwapInitiated)
	);
	assert_eq!(h.backend.calls.load(Ordering::SeqCst), 0);

	// Tick 3: swap executes and caches the buy amount.
	tick().await;
	h.manager.step(id).await;
	assert_eq!(h.backend.calls.load(Ordering::SeqCst), 1);
	let record = h.swaps.record(id).unwrap();
	assert_eq!(record.phase, SwapPhase::Completed);
	assert_eq!(record.amount_to_buy, Some(U256::from(100u64)));
	assert_eq!(
		h.manager.progress_of(id).unwrap().ext_status,
		Some(ExtendedStatus::SwapCompleted)
	);

	// Tick 4: deposit, contract reaches terminal status 2. The standing
	// allowance covers the amount, so no approve is submitted.
	tick().await;
	h.manager.step(id).await;
	assert_eq!(h.chain.deposit_calls.load(Ordering::SeqCst), 1);
	assert_eq!(h.chain.approve_calls.load(Ordering::SeqCst), 0);
	assert_eq!(h.chain.status(id), AgiStatus::ProceedsReceived);

	// Tick 5: cleanup; one delete attempted, nothing recorded.
	tick().await;
	h.manager.step(id).await;
	assert!(h.manager.queue_snapshot().is_empty());
	assert!(h.manager.progress_of(id).is_none());
	assert!(h.swaps.record(id).is_none());
	assert_eq!(h.store.deletes.load(Ordering::SeqCst), 1);
	assert_eq!(h.store.records.load(Ordering::SeqCst), 0);
	assert!(h.store.all().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_swap_retry_then_success() {
	let h = harness(vec![
		Err(SwapError::Network("aggregator timeout".to_string())),
		Ok(U256::from(95u64)),
	]);
	let id = U256::from(8u64);
	h.chain
		.insert_agi(trade_agi(8, AgiStatus::DispensedPendingProceeds));
	h.manager.add(id).await;
	h.manager.stop_ticker().await;

	// Contract is at 1 with no overlay: bookkeeping step first.
	h.manager.step(id).await;
	tick().await;

	// Tick A: swap fails, attempts = 1, long delay armed.
	h.manager.step(id).await;
	assert_eq!(h.swaps.attempts(id), 1);
	assert_eq!(h.swaps.record(id).unwrap().phase, SwapPhase::Failed);
	let progress = h.manager.progress_of(id).unwrap();
	assert_eq!(progress.required_delay, Duration::from_secs(30));
	assert!(h.manager.queue_snapshot().contains(&id));

	// Tick B (before 30 s): the gate skips without touching the backend.
	tick().await;
	h.manager.step(id).await;
	assert_eq!(h.backend.calls.load(Ordering::SeqCst), 1);

	// Tick C (after 30 s): swap succeeds, attempts = 2.
	tokio::time::advance(Duration::from_secs(29)).await;
	h.manager.step(id).await;
	assert_eq!(h.swaps.attempts(id), 2);
	assert_eq!(h.swaps.record(id).unwrap().phase, SwapPhase::Completed);

	// Deposit and cleanup proceed; no failure is ever recorded.
	tick().await;
	h.manager.step(id).await;
	tick().await;
	h.manager.step(id).await;
	assert_eq!(h.chain.deposit_calls.load(Ordering::SeqCst), 1);
	assert!(h.manager.queue_snapshot().is_empty());
	assert_eq!(h.store.records.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_swap_ceiling_evicts_and_records() {
	let h = harness(vec![
		Err(SwapError::Rejected("no route".to_string())),
		Err(SwapError::Rejected("no route".to_string())),
	]);
	let id = U256::from(9u64);
	h.chain
		.insert_agi(trade_agi(9, AgiStatus::DispensedPendingProceeds));
	h.manager.add(id).await;
	h.manager.stop_ticker().await;

	h.manager.step(id).await; // bookkeeping: internal status 3
	tick().await;
	h.manager.step(id).await; // first failure, attempts = 1
	assert!(h.manager.queue_snapshot().contains(&id));

	tokio::time::advance(Duration::from_secs(31)).await;
	h.manager.step(id).await; // second failure, attempts = 2: eviction

	// Evicted: queue and progress cleared, swap record retained.
	assert!(h.manager.queue_snapshot().is_empty());
	assert!(h.manager.progress_of(id).is_none());
	assert_eq!(h.swaps.record(id).unwrap().phase, SwapPhase::Failed);

	// Exactly one durable row with the final attempt in the message.
	assert_eq!(h.store.records.load(Ordering::SeqCst), 1);
	let rows = h.store.all().await.unwrap();
	assert_eq!(rows.len(), 1);
	assert_eq!(rows[0].error_message, "Swap failed for AGI 9 at attempt 2");
	assert_eq!(rows[0].amount_to_sell, "100");
	assert_eq!(rows[0].order_status, 1);

	// The report lists the exhausted intent.
	let report = h.manager.failed_swap_report();
	assert_eq!(report.count, 1);
	assert_eq!(report.order_ids, vec![id]);

	// Re-admission is refused while the failure stands.
	h.manager.add(id).await;
	assert!(h.manager.queue_snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_transport_flake_on_withdraw_receipt() {
	let h = harness(vec![Ok(U256::from(100u64))]);
	let id = U256::from(10u64);
	h.chain.insert_agi(trade_agi(10, AgiStatus::PendingDispense));
	h.chain.fail_next_receipts(1);
	h.manager.add(id).await;
	h.manager.stop_ticker().await;

	// The withdraw lands on-chain but the receipt wait exhausts its budget:
	// a non-swap error with the generic delay, no swap state touched.
	h.manager.step(id).await;
	assert_eq!(h.chain.withdraw_calls.load(Ordering::SeqCst), 1);
	assert!(h.manager.queue_snapshot().contains(&id));
	assert!(h.swaps.record(id).is_none());
	assert_eq!(h.swaps.attempts(id), 0);
	let progress = h.manager.progress_of(id).unwrap();
	assert_eq!(progress.required_delay, Duration::from_secs(1));

	// The next read reconciles: contract already at 1, no second withdraw.
	tick().await;
	h.manager.step(id).await;
	assert_eq!(h.chain.withdraw_calls.load(Ordering::SeqCst), 1);
	assert_eq!(
		h.manager.progress_of(id).unwrap().ext_status,
		Some(ExtendedStatus::SwapInitiated)
	);

	// And the intent completes normally.
	for _ in 0..3 {
		tick().await;
		h.manager.step(id).await;
	}
	assert_eq!(h.chain.deposit_calls.load(Ordering::SeqCst), 1);
	assert!(h.manager.queue_snapshot().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_restart_recovery_after_withdraw() {
	let chain = Arc::new(FakeChain::new());
	chain.insert_agi(trade_agi(10, AgiStatus::PendingDispense));
	let id = U256::from(10u64);

	// First solver run: withdraw succeeds, then the process dies.
	{
		let backend = Arc::new(ScriptedSwap::new(vec![]));
		let swaps = Arc::new(SwapCoordinator::new(backend, 0.05));
		let store = Arc::new(CountingStore::new());
		let executor = Arc::new(TransactionExecutor::new(
			chain.clone(),
			escrow(),
			solver(),
			31337,
		));
		let manager = QueueManager::new(
			chain.clone(),
			executor,
			swaps,
			store,
			RetryPolicy::default(),
			Duration::from_secs(2),
		);
		manager.add(id).await;
		manager.stop_ticker().await;
		manager.step(id).await;
		assert_eq!(chain.status(id), AgiStatus::DispensedPendingProceeds);
	}

	// Second run: fresh in-memory state, same chain. The backlog re-admits
	// the id; reconciliation resumes from contract status 1.
	let backend = Arc::new(ScriptedSwap::new(vec![Ok(U256::from(100u64))]));
	let swaps = Arc::new(SwapCoordinator::new(backend.clone(), 0.05));
	let store = Arc::new(CountingStore::new());
	let executor = Arc::new(TransactionExecutor::new(
		chain.clone(),
		escrow(),
		solver(),
		31337,
	));
	let manager = QueueManager::new(
		chain.clone(),
		executor,
		swaps,
		store,
		RetryPolicy::default(),
		Duration::from_secs(2),
	);
	manager.add(id).await;
	manager.stop_ticker().await;

	manager.step(id).await;
	assert_eq!(
		manager.progress_of(id).unwrap().ext_status,
		Some(ExtendedStatus::SwapInitiated)
	);

	for _ in 0..3 {
		tick().await;
		manager.step(id).await;
	}

	// No duplicate withdraw across the restart.
	assert_eq!(chain.withdraw_calls.load(Ordering::SeqCst), 1);
	assert_eq!(chain.deposit_calls.load(Ordering::SeqCst), 1);
	assert_eq!(chain.status(id), AgiStatus::ProceedsReceived);
}

#[tokio::test(start_paused = true)]
async fn test_readmission_of_completed_intent() {
	let h = harness(vec![Ok(U256::from(100u64))]);
	let id = U256::from(7u64);
	h.chain.insert_agi(trade_agi(7, AgiStatus::PendingDispense));
	h.manager.add(id).await;
	h.manager.stop_ticker().await;

	for _ in 0..5 {
		h.manager.step(id).await;
		tick().await;
	}
	assert!(h.manager.queue_snapshot().is_empty());
	assert_eq!(h.store.deletes.load(Ordering::SeqCst), 1);

	// The event handler re-emits the id after completion: it is appended
	// again, observed terminal, and removed without any on-chain action.
	h.manager.add(id).await;
	assert!(h.manager.queue_snapshot().contains(&id));

	h.manager.step(id).await;
	assert!(h.manager.queue_snapshot().is_empty());
	assert_eq!(h.chain.withdraw_calls.load(Ordering::SeqCst), 1);
	assert_eq!(h.chain.deposit_calls.load(Ordering::SeqCst), 1);
	assert_eq!(h.store.deletes.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_add_is_idempotent_for_queued_ids() {
	let h = harness(vec![]);
	h.chain.insert_agi(trade_agi(1, AgiStatus::PendingDispense));
	let id = U256::from(1u64);

	h.manager.add(id).await;
	h.manager.add(id).await;
	assert_eq!(h.manager.queue_snapshot(), vec![id]);
	h.manager.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_gate_skips_without_chain_reads() {
	let h = harness(vec![]);
	let id = U256::from(2u64);
	h.chain.insert_agi(trade_agi(2, AgiStatus::PendingDispense));
	h.manager.add(id).await;
	h.manager.stop_ticker().await;

	h.manager.step(id).await;
	let reads = h.chain.read_calls.load(Ordering::SeqCst);

	// The gate is armed with the success delay; an immediate step is a
	// fast no-op that never reaches the contract.
	h.manager.step(id).await;
	assert_eq!(h.chain.read_calls.load(Ordering::SeqCst), reads);
}

#[tokio::test(start_paused = true)]
async fn test_backoff_does_not_block_other_intents() {
	let h = harness(vec![
		Err(SwapError::Rejected("no route".to_string())),
		Ok(U256::from(100u64)),
	]);
	let stuck = U256::from(20u64);
	let fast = U256::from(21u64);
	h.chain
		.insert_agi(trade_agi(20, AgiStatus::DispensedPendingProceeds));
	h.chain.insert_agi(trade_agi(21, AgiStatus::PendingDispense));
	h.manager.add(stuck).await;
	h.manager.add(fast).await;
	h.manager.stop_ticker().await;

	// The stuck intent enters its 30-second swap backoff.
	h.manager.step(stuck).await;
	tick().await;
	h.manager.step(stuck).await;
	assert_eq!(h.swaps.attempts(stuck), 1);

	// The fast intent runs to completion while the other one waits.
	for _ in 0..5 {
		h.manager.step(fast).await;
		tick().await;
	}
	assert_eq!(h.chain.deposit_calls.load(Ordering::SeqCst), 1);
	assert_eq!(h.manager.queue_snapshot(), vec![stuck]);
}

#[tokio::test(start_paused = true)]
async fn test_unsupported_intent_type_is_evicted() {
	let h = harness(vec![]);
	let id = U256::from(30u64);
	let mut agi = trade_agi(30, AgiStatus::PendingDispense);
	agi.intent_type = 1;
	h.chain.insert_agi(agi);
	h.manager.add(id).await;
	h.manager.stop_ticker().await;

	h.manager.step(id).await;

	assert!(h.manager.queue_snapshot().is_empty());
	assert_eq!(h.chain.withdraw_calls.load(Ordering::SeqCst), 0);
	// Not a swap failure: nothing is recorded durably.
	assert_eq!(h.store.records.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_ticker_drives_intent_and_stops_on_empty_queue() {
	let h = harness(vec![Ok(U256::from(100u64))]);
	let id = U256::from(7u64);
	h.chain.insert_agi(trade_agi(7, AgiStatus::PendingDispense));

	h.manager.add(id).await;
	assert!(h.manager.is_running().await);

	// The paused clock auto-advances whenever the runtime goes idle, so the
	// ticker churns through the whole lifecycle quickly.
	tokio::time::timeout(Duration::from_secs(600), async {
		while !h.manager.queue_snapshot().is_empty() {
			tokio::time::sleep(Duration::from_millis(100)).await;
		}
	})
	.await
	.expect("intent did not complete");

	assert_eq!(h.chain.deposit_calls.load(Ordering::SeqCst), 1);

	// The ticker parks itself once it observes the empty queue.
	tokio::time::timeout(Duration::from_secs(60), async {
		while h.manager.is_running().await {
			tokio::time::sleep(Duration::from_millis(100)).await;
		}
	})
	.await
	.expect("ticker did not stop");

	// A later add restarts it.
	h.manager.add(id).await;
	assert!(h.manager.is_running().await);
	h.manager.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_steps_never_overlap_under_ticker() {
	let h = harness(vec![
		Ok(U256::from(100u64)),
		Ok(U256::from(100u64)),
		Ok(U256::from(100u64)),
	]);
	for n in 40..43u64 {
		h.chain.insert_agi(trade_agi(n, AgiStatus::PendingDispense));
		h.manager.add(U256::from(n)).await;
	}

	tokio::time::timeout(Duration::from_secs(600), async {
		while !h.manager.queue_snapshot().is_empty() {
			tokio::time::sleep(Duration::from_millis(100)).await;
		}
	})
	.await
	.expect("intents did not complete");

	assert_eq!(h.chain.deposit_calls.load(Ordering::SeqCst), 3);
	assert_eq!(h.chain.max_in_flight.load(Ordering::SeqCst), 1);
	h.manager.close().await;
}

#[tokio::test(start_paused = true)]
async fn test_close_prevents_new_admissions() {
	let h = harness(vec![]);
	h.chain.insert_agi(trade_agi(50, AgiStatus::PendingDispense));

	h.manager.close().await;
	assert!(!h.manager.is_running().await);

	h.manager.add(U256::from(50u64)).await;
	assert!(h.manager.queue_snapshot().is_empty());
	assert!(!h.manager.is_running().await);
}
