//! Core queue manager for the AGI solver system.
//!
//! This crate contains the concurrency-safe scheduler that owns the
//! per-intent state machine: an ordered, deduplicated queue of order ids
//! driven by a single-flight ticker, a reconciliation step that merges
//! internal progress with on-chain state, and a retry policy that treats
//! swap failures differently from transport failures.

pub mod manager;
pub mod queue;
pub mod retry;
pub mod state;

pub use manager::{FailedSwapReport, QueueManager};
pub use retry::{RetryPolicy, StepError};
pub use state::IntentProgress;

#[cfg(test)]
mod manager_tests;
