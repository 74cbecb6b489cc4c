// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for relay activity.
#[derive(Debug, Default)]
pub struct RelayMetrics {
	relays: AtomicU64,
	refresh_attempts: AtomicU64,
	refresh_failures: AtomicU64,
	retries: AtomicU64,
}
impl RelayMetrics {
	/// Returns the number of relay requests handled.
	pub fn relays(&self) -> u64 {
		self.relays.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh grants sent.
	pub fn refresh_attempts(&self) -> u64 {
		self.refresh_attempts.load(Ordering::Relaxed)
	}

	/// Returns the number of refresh grants that did not yield a session.
	pub fn refresh_failures(&self) -> u64 {
		self.refresh_failures.load(Ordering::Relaxed)
	}

	/// Returns the number of resource calls retried with a refreshed token.
	pub fn retries(&self) -> u64 {
		self.retries.load(Ordering::Relaxed)
	}

	pub(crate) fn record_relay(&self) {
		self.relays.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_attempt(&self) {
		self.refresh_attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_refresh_failure(&self) {
		self.refresh_failures.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_retry(&self) {
		self.retries.fetch_add(1, Ordering::Relaxed);
	}
}
