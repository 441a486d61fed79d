//! Retry policy and step error classification.
//!
//! Two delay regimes govern re-processing: a short generic delay after
//! successes and transport-class failures, and a long swap delay after
//! failures of the swap capability. Only swap failures count toward the
//! eviction ceiling; transport and contract-timing issues self-heal and
//! retry unboundedly.

use alloy_primitives::U256;
use solver_delivery::DeliveryError;
use solver_storage::StoreError;
use solver_swap::SwapError;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while processing one intent step.
#[derive(Debug, Error)]
pub enum StepError {
	/// The swap capability failed. Counts toward the retry ceiling.
	#[error(transparent)]
	Swap(#[from] SwapError),
	/// A chain read, simulation, submission, or receipt failed.
	#[error(transparent)]
	Chain(#[from] DeliveryError),
	/// The failed-swap store rejected an operation.
	#[error(transparent)]
	Store(#[from] StoreError),
	/// The intent carries a type the solver does not execute.
	#[error("unsupported intent type {intent_type} for AGI {order_id}")]
	UnsupportedIntentType { order_id: U256, intent_type: u8 },
	/// Internal inconsistency: a deposit was requested without a completed
	/// swap result.
	#[error("no completed swap result for AGI {0}")]
	MissingSwapResult(U256),
}

impl StepError {
	/// Whether this error counts toward the swap retry ceiling.
	pub fn is_swap(&self) -> bool {
		matches!(self, StepError::Swap(_))
	}
}

/// Per-intent backoff and retry-limit parameters.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
	/// Delay after a successful step or a non-swap error.
	pub retry_delay: Duration,
	/// Delay after a swap-class error.
	pub swap_retry_delay: Duration,
	/// Swap-error ceiling before an intent is evicted.
	pub max_retries: u32,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			retry_delay: Duration::from_millis(1000),
			swap_retry_delay: Duration::from_millis(30000),
			max_retries: 2,
		}
	}
}

impl RetryPolicy {
	/// The delay to apply after `error` before the intent is eligible again.
	pub fn delay_for(&self, error: &StepError) -> Duration {
		if error.is_swap() {
			self.swap_retry_delay
		} else {
			self.retry_delay
		}
	}
}
