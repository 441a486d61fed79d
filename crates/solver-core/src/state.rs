//! Per-intent progress tracking.
//!
//! The progress record is the solver-side overlay over contract state: the
//! internal extended status plus the retry gate (last attempt time and the
//! delay that must elapse before the next one). Swap bookkeeping lives in
//! the swap coordinator, keyed by the same order id.

use solver_types::ExtendedStatus;
use std::time::Duration;
use tokio::time::Instant;

/// In-memory progress for one queued intent.
#[derive(Debug, Clone, Default)]
pub struct IntentProgress {
	/// Internal status overlay; only meaningful over contract status 1.
	pub ext_status: Option<ExtendedStatus>,
	/// When the last processing attempt finished.
	pub last_attempt_at: Option<Instant>,
	/// How long after `last_attempt_at` the intent stays ineligible.
	pub required_delay: Duration,
}

impl IntentProgress {
	pub fn new() -> Self {
		Self::default()
	}

	/// Whether the retry gate is still closed at `now`.
	pub fn is_gated(&self, now: Instant) -> bool {
		match self.last_attempt_at {
			Some(last) => now.duration_since(last) < self.required_delay,
			None => false,
		}
	}

	/// Records an attempt and arms the gate with `delay`.
	pub fn note_attempt(&mut self, now: Instant, delay: Duration) {
		self.last_attempt_at = Some(now);
		self.required_delay = delay;
	}
}
