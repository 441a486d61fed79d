//! AGI queue manager.
//!
//! Owns the ordered set of work and drives one processing step at a time
//! from a periodic ticker. Each step reconciles internal progress with the
//! contract's authoritative status, dispatches to the handler for the
//! effective status, and folds errors into retry state instead of letting
//! them escape the worker. An intent leaves the queue in exactly two ways:
//! contract status 2 is observed, or its swap retries are exhausted.

use crate::queue::IntentQueue;
use crate::retry::{RetryPolicy, StepError};
use crate::state::IntentProgress;
use alloy_primitives::U256;
use solver_delivery::{ChainInterface, TransactionExecutor};
use solver_storage::FailedSwapStore;
use solver_swap::SwapCoordinator;
use solver_types::{
	current_timestamp, Agi, ExtendedStatus, FailedSwap, SwapPhase, TRADE_INTENT_TYPE,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Summary of intents whose swaps are failed and exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedSwapReport {
	/// Number of exhausted intents.
	pub count: usize,
	/// Their order ids, ascending.
	pub order_ids: Vec<U256>,
}

/// Queue and progress maps. Mutated by the ticker worker; `add` only
/// appends to the queue, so a plain mutex suffices.
#[derive(Default)]
struct SolverState {
	queue: IntentQueue,
	progress: HashMap<U256, IntentProgress>,
}

/// Concurrency-safe scheduler owning the per-intent state machine.
///
/// One ticker task executes all steps, so two steps never overlap and the
/// per-intent maps need no cross-intent locking. `add` is safe to call from
/// any task; it restarts the ticker when the queue was drained.
pub struct QueueManager {
	chain: Arc<dyn ChainInterface>,
	executor: Arc<TransactionExecutor>,
	swaps: Arc<SwapCoordinator>,
	failed_swaps: Arc<dyn FailedSwapStore>,
	policy: RetryPolicy,
	check_interval: Duration,
	state: Mutex<SolverState>,
	ticker: AsyncMutex<Option<JoinHandle<()>>>,
	stop_signal: Mutex<Option<broadcast::Sender<()>>>,
	closed: AtomicBool,
	/// Handle to ourselves for spawning the ticker worker.
	self_ref: Weak<QueueManager>,
}

impl QueueManager {
	pub fn new(
		chain: Arc<dyn ChainInterface>,
		executor: Arc<TransactionExecutor>,
		swaps: Arc<SwapCoordinator>,
		failed_swaps: Arc<dyn FailedSwapStore>,
		policy: RetryPolicy,
		check_interval: Duration,
	) -> Arc<Self> {
		Arc::new_cyclic(|self_ref| Self {
			chain,
			executor,
			swaps,
			failed_swaps,
			policy,
			check_interval,
			state: Mutex::new(SolverState::default()),
			ticker: AsyncMutex::new(None),
			stop_signal: Mutex::new(None),
			closed: AtomicBool::new(false),
			self_ref: self_ref.clone(),
		})
	}

	/// Admits an intent into the queue and ensures the ticker is running.
	///
	/// Re-admission of a queued id is a no-op; an id whose swap retries are
	/// exhausted is refused until an operator clears its failure record.
	pub async fn add(&self, order_id: U256) {
		if self.closed.load(Ordering::SeqCst) {
			tracing::warn!(order_id = %order_id, "queue manager closed, refusing AGI");
			return;
		}
		if self.swaps.is_exhausted(order_id, self.policy.max_retries) {
			tracing::warn!(
				order_id = %order_id,
				"refusing AGI whose swap retries are exhausted"
			);
			return;
		}

		{
			let mut state = self.state.lock().unwrap();
			if !state.queue.push(order_id) {
				tracing::debug!(order_id = %order_id, "AGI already queued");
				return;
			}
			state.progress.entry(order_id).or_default();
			tracing::info!(order_id = %order_id, queued = state.queue.len(), "AGI admitted");
		}

		self.ensure_ticker().await;
	}

	/// Stops the ticker and prevents new steps. An in-flight step completes;
	/// there is no per-step cancellation, because tearing down a step that
	/// has submitted a transaction would break the at-most-once guarantee.
	pub async fn close(&self) {
		self.closed.store(true, Ordering::SeqCst);

		if let Some(stop_tx) = self.stop_signal.lock().unwrap().take() {
			let _ = stop_tx.send(());
		}

		let handle = self.ticker.lock().await.take();
		if let Some(handle) = handle {
			let _ = handle.await;
		}

		tracing::info!("queue manager closed");
	}

	/// Count and ids of intents whose swap phase is failed with attempts at
	/// or beyond the retry ceiling.
	pub fn failed_swap_report(&self) -> FailedSwapReport {
		let order_ids = self.swaps.failed_exhausted(self.policy.max_retries);
		FailedSwapReport {
			count: order_ids.len(),
			order_ids,
		}
	}

	/// Whether the ticker worker is currently running.
	pub async fn is_running(&self) -> bool {
		self.ticker.lock().await.is_some()
	}

	/// Snapshot of the queue order, head first.
	pub fn queue_snapshot(&self) -> Vec<U256> {
		self.state.lock().unwrap().queue.snapshot()
	}

	/// Snapshot of the progress record for one intent.
	#[cfg(test)]
	pub(crate) fn progress_of(&self, order_id: U256) -> Option<IntentProgress> {
		self.state.lock().unwrap().progress.get(&order_id).cloned()
	}

	/// Stops the ticker worker without closing the manager, so tests can
	/// drive steps deterministically.
	#[cfg(test)]
	pub(crate) async fn stop_ticker(&self) {
		if let Some(stop_tx) = self.stop_signal.lock().unwrap().take() {
			let _ = stop_tx.send(());
		}
		if let Some(handle) = self.ticker.lock().await.take() {
			let _ = handle.await;
		}
	}

	/// Spawns the ticker worker if none is running.
	async fn ensure_ticker(&self) {
		let Some(manager) = self.self_ref.upgrade() else {
			return;
		};

		let mut ticker = self.ticker.lock().await;
		if ticker.is_some() {
			return;
		}

		let (stop_tx, stop_rx) = broadcast::channel(1);
		*self.stop_signal.lock().unwrap() = Some(stop_tx);

		*ticker = Some(tokio::spawn(async move {
			manager.run_ticker(stop_rx).await;
		}));
		tracing::debug!("ticker started");
	}

	/// Ticker loop: one intent per tick, head rotated to the tail before its
	/// step runs. Exits when the queue drains or a stop is signalled.
	async fn run_ticker(self: Arc<Self>, mut stop_rx: broadcast::Receiver<()>) {
		let mut interval = tokio::time::interval(self.check_interval);
		interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
		// Consume the immediate first tick
		interval.tick().await;

		loop {
			tokio::select! {
				_ = interval.tick() => {
					let next = self.state.lock().unwrap().queue.rotate();
					match next {
						Some(order_id) => self.step(order_id).await,
						None => {
							// Hold the ticker slot while re-checking so an
							// add() racing the shutdown sees either a live
							// worker or an empty slot it can refill.
							let mut ticker = self.ticker.lock().await;
							if self.state.lock().unwrap().queue.is_empty() {
								*ticker = None;
								tracing::debug!("queue empty, stopping ticker");
								break;
							}
						},
					}
				}
				_ = stop_rx.recv() => {
					tracing::debug!("ticker stop signalled");
					break;
				}
			}
		}
	}

	/// Processes one step for an intent: gate, reconcile, dispatch, record.
	pub(crate) async fn step(&self, order_id: U256) {
		{
			let state = self.state.lock().unwrap();
			if let Some(progress) = state.progress.get(&order_id) {
				if progress.is_gated(Instant::now()) {
					tracing::debug!(order_id = %order_id, "retry delay not elapsed, skipping");
					return;
				}
			}
		}

		let agi = match self.chain.read_agi(order_id).await {
			Ok(agi) => agi,
			Err(e) => {
				self.note_failure(order_id, None, StepError::Chain(e)).await;
				return;
			},
		};

		let effective = {
			let state = self.state.lock().unwrap();
			let overlay = state.progress.get(&order_id).and_then(|p| p.ext_status);
			ExtendedStatus::effective(agi.status, overlay)
		};
		tracing::debug!(
			order_id = %order_id,
			contract_status = %agi.status,
			effective_status = %effective,
			"processing AGI"
		);

		match self.dispatch(order_id, &agi, effective).await {
			// Terminal handlers clean up their own state.
			Ok(true) => {},
			Ok(false) => self.note_success(order_id),
			Err(e) => self.note_failure(order_id, Some(&agi), e).await,
		}
	}

	/// Routes to the handler for the effective status. Returns true when the
	/// intent reached a terminal state and left the queue.
	async fn dispatch(
		&self,
		order_id: U256,
		agi: &Agi,
		effective: ExtendedStatus,
	) -> Result<bool, StepError> {
		if agi.intent_type != TRADE_INTENT_TYPE {
			return Err(StepError::UnsupportedIntentType {
				order_id,
				intent_type: agi.intent_type,
			});
		}

		match effective {
			ExtendedStatus::PendingDispense => {
				self.handle_pending_dispense(order_id).await?;
				Ok(false)
			},
			ExtendedStatus::DispensedPendingProceeds => {
				self.handle_dispensed(order_id);
				Ok(false)
			},
			ExtendedStatus::SwapInitiated => {
				self.handle_swap_initiated(order_id, agi).await?;
				Ok(false)
			},
			ExtendedStatus::SwapCompleted => {
				self.handle_swap_completed(order_id, agi).await?;
				Ok(false)
			},
			ExtendedStatus::ProceedsReceived => {
				self.handle_proceeds_received(order_id).await?;
				Ok(true)
			},
		}
	}

	/// Status 0: withdraw the sell asset. The contract flips its status to 1
	/// on success; no internal status is set.
	async fn handle_pending_dispense(&self, order_id: U256) -> Result<(), StepError> {
		self.executor.withdraw_asset(order_id).await?;
		tracing::info!(order_id = %order_id, "sell asset withdrawn from escrow");
		Ok(())
	}

	/// Status 1 without overlay: custody is ours, mark the swap as the next
	/// move. The following rotation performs it.
	fn handle_dispensed(&self, order_id: U256) {
		let mut state = self.state.lock().unwrap();
		if let Some(progress) = state.progress.get_mut(&order_id) {
			progress.ext_status = Some(ExtendedStatus::SwapInitiated);
		}
	}

	/// Status 3: run the swap unless one is already in flight, already
	/// completed, or already exhausted.
	async fn handle_swap_initiated(&self, order_id: U256, agi: &Agi) -> Result<(), StepError> {
		if let Some(record) = self.swaps.record(order_id) {
			match record.phase {
				SwapPhase::Pending => {
					tracing::debug!(order_id = %order_id, "swap already in flight");
					return Ok(());
				},
				SwapPhase::Completed => {
					self.set_ext_status(order_id, ExtendedStatus::SwapCompleted);
					return Ok(());
				},
				SwapPhase::Failed if record.attempts >= self.policy.max_retries => {
					// Eviction happens on the error path; nothing to do here.
					tracing::debug!(order_id = %order_id, "swap already exhausted");
					return Ok(());
				},
				SwapPhase::Failed => {},
			}
		}

		let amount_to_buy = self
			.swaps
			.execute(order_id, agi, self.executor.solver_address())
			.await?;
		self.set_ext_status(order_id, ExtendedStatus::SwapCompleted);
		tracing::info!(order_id = %order_id, amount_to_buy = %amount_to_buy, "swap completed");
		Ok(())
	}

	/// Status 4: deposit the cached swap result. The cached amount is the
	/// only value consistent with swap idempotency; it is never requoted.
	async fn handle_swap_completed(&self, order_id: U256, agi: &Agi) -> Result<(), StepError> {
		let amount_to_buy = self
			.swaps
			.record(order_id)
			.and_then(|record| record.amount_to_buy)
			.ok_or(StepError::MissingSwapResult(order_id))?;

		self.executor
			.deposit_asset(order_id, &agi.asset_to_buy, amount_to_buy)
			.await?;
		self.set_ext_status(order_id, ExtendedStatus::ProceedsReceived);
		tracing::info!(order_id = %order_id, amount = %amount_to_buy, "proceeds deposited");
		Ok(())
	}

	/// Status 2: terminal success. Clears the failed-swap record and every
	/// piece of in-memory state for the intent.
	async fn handle_proceeds_received(&self, order_id: U256) -> Result<(), StepError> {
		self.failed_swaps.delete(order_id).await?;
		self.remove_intent(order_id);
		self.swaps.clear(order_id);
		tracing::info!(order_id = %order_id, "AGI completed");
		Ok(())
	}

	fn set_ext_status(&self, order_id: U256, status: ExtendedStatus) {
		let mut state = self.state.lock().unwrap();
		if let Some(progress) = state.progress.get_mut(&order_id) {
			progress.ext_status = Some(status);
		}
	}

	fn remove_intent(&self, order_id: U256) {
		let mut state = self.state.lock().unwrap();
		state.queue.remove(&order_id);
		state.progress.remove(&order_id);
	}

	fn note_success(&self, order_id: U256) {
		let mut state = self.state.lock().unwrap();
		if let Some(progress) = state.progress.get_mut(&order_id) {
			progress.note_attempt(Instant::now(), self.policy.retry_delay);
		}
	}

	/// Folds a step error into retry state. Swap errors at the ceiling evict
	/// the intent and persist a failure record; everything else re-arms the
	/// gate and leaves the intent at the queue tail.
	async fn note_failure(&self, order_id: U256, agi: Option<&Agi>, error: StepError) {
		if let StepError::UnsupportedIntentType { intent_type, .. } = &error {
			tracing::warn!(
				order_id = %order_id,
				intent_type = *intent_type,
				"unsupported intent type, evicting"
			);
			self.remove_intent(order_id);
			self.swaps.clear(order_id);
			return;
		}

		if error.is_swap() {
			let attempts = self.swaps.attempts(order_id);
			tracing::warn!(
				order_id = %order_id,
				attempts,
				max_retries = self.policy.max_retries,
				error = %error,
				"swap attempt failed"
			);
			if attempts >= self.policy.max_retries {
				self.evict_exhausted(order_id, agi, attempts).await;
				return;
			}
		} else {
			tracing::warn!(order_id = %order_id, error = %error, "step failed, will retry");
		}

		let delay = self.policy.delay_for(&error);
		let mut state = self.state.lock().unwrap();
		if let Some(progress) = state.progress.get_mut(&order_id) {
			progress.note_attempt(Instant::now(), delay);
		}
	}

	/// Evicts an intent whose swap retries are exhausted: one durable
	/// failure row, queue and progress cleared, swap record retained for
	/// the failed-swap report.
	async fn evict_exhausted(&self, order_id: U256, agi: Option<&Agi>, attempts: u32) {
		tracing::error!(
			order_id = %order_id,
			attempts,
			"swap retries exhausted, evicting AGI"
		);

		if let Some(agi) = agi {
			let failure = FailedSwap {
				timestamp: current_timestamp(),
				order_id,
				error_message: format!(
					"Swap failed for AGI {} at attempt {}",
					order_id, attempts
				),
				intent_type: agi.intent_type,
				asset_to_sell: agi.asset_to_sell.clone(),
				amount_to_sell: agi.amount_to_sell.to_string(),
				asset_to_buy: agi.asset_to_buy.clone(),
				order_status: agi.status.as_u8(),
			};
			if let Err(e) = self.failed_swaps.record(&failure).await {
				tracing::error!(
					order_id = %order_id,
					"failed to persist failed-swap record: {}",
					e
				);
			}
		}

		self.remove_intent(order_id);
	}
}
