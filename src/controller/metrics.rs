// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for one broker.
#[derive(Debug, Default)]
pub struct AdmissionMetrics {
	admissions: AtomicU64,
	admitted: AtomicU64,
	failed: AtomicU64,
	logins: AtomicU64,
	cache_hits: AtomicU64,
	candidates: AtomicU64,
}
impl AdmissionMetrics {
	/// Total `admit` calls.
	pub fn admissions(&self) -> u64 {
		self.admissions.load(Ordering::Relaxed)
	}

	/// Calls that ended with the client admitted.
	pub fn admitted(&self) -> u64 {
		self.admitted.load(Ordering::Relaxed)
	}

	/// Calls that ended in a login or authorize failure.
	pub fn failed(&self) -> u64 {
		self.failed.load(Ordering::Relaxed)
	}

	/// Login attempts, retries included.
	pub fn logins(&self) -> u64 {
		self.logins.load(Ordering::Relaxed)
	}

	/// Admissions that started from a cached session.
	pub fn cache_hits(&self) -> u64 {
		self.cache_hits.load(Ordering::Relaxed)
	}

	/// Authorize candidates sent.
	pub fn candidates(&self) -> u64 {
		self.candidates.load(Ordering::Relaxed)
	}

	pub(crate) fn record_admission(&self) {
		self.admissions.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_admitted(&self) {
		self.admitted.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failed(&self) {
		self.failed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_login(&self) {
		self.logins.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cache_hit(&self) {
		self.cache_hits.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_candidate(&self) {
		self.candidates.fetch_add(1, Ordering::Relaxed);
	}
}
