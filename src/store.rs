//! Key-value storage contract shared by the credit ledger and the controller session cache,
//! plus the built-in in-memory and file-backed implementations.
//!
//! Values are opaque strings (callers store JSON). Three shapes exist per key: a plain value,
//! a field map, and an append-only list. Any key may carry a TTL; expired keys read as absent.

pub mod file;
pub mod memory;

mod state;

pub use file::FileStore;
pub use memory::MemoryStore;

// self
use crate::{
	_prelude::*,
	model::{ControllerId, MemberId},
};

/// Boxed future returned by every [`KvStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract.
///
/// Implementations must make [`compare_and_swap`](Self::compare_and_swap) and
/// [`hash_set_if_absent`](Self::hash_set_if_absent) atomic with respect to concurrent callers;
/// the ledger's at-most-once debit guarantee rests on them.
pub trait KvStore
where
	Self: Send + Sync,
{
	/// Reads a plain value.
	fn get<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>>;

	/// Writes a plain value, replacing whatever the key held. `ttl` of `None` never expires.
	fn set<'a>(
		&'a self,
		key: &'a StoreKey,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, ()>;

	/// Removes a key of any shape, returning whether it existed.
	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, bool>;

	/// Replaces a plain value only if it currently equals `expected`.
	///
	/// With `expected == None` the write succeeds only when the key is absent.
	fn compare_and_swap<'a>(
		&'a self,
		key: &'a StoreKey,
		expected: Option<&'a str>,
		replacement: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, CompareAndSwapOutcome>;

	/// Sets `field` in the field map at `key` only if the field is absent. The TTL is refreshed
	/// whenever a field is inserted.
	fn hash_set_if_absent<'a>(
		&'a self,
		key: &'a StoreKey,
		field: &'a str,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, SetIfAbsentOutcome>;

	/// Reads every field of the map at `key`; absent keys yield an empty map.
	fn hash_get_all<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, BTreeMap<String, String>>;

	/// Appends to the list at `key`, returning the new length.
	fn list_append<'a>(&'a self, key: &'a StoreKey, value: String) -> StoreFuture<'a, usize>;

	/// Reads the list at `key` in insertion order.
	fn list_items<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Vec<String>>;
}

/// Result of a compare-and-swap attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompareAndSwapOutcome {
	/// The current value matched and was replaced (or the key was absent and got created).
	Updated,
	/// The key exists but holds a different value than expected.
	ValueMismatch,
	/// A specific value was expected but the key is absent.
	Missing,
}

/// Result of a set-if-absent field write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SetIfAbsentOutcome {
	/// The field was absent and has been written.
	Inserted,
	/// The field already existed; nothing changed.
	AlreadyPresent,
}

/// Error type produced by [`KvStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend or its callers.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

/// Namespaced storage key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoreKey(String);
impl StoreKey {
	/// Wraps a raw key.
	pub fn new(raw: impl Into<String>) -> Self {
		Self(raw.into())
	}

	/// Ledger entry for one member in one billing cycle.
	pub fn ledger(cycle: impl Display, member: &MemberId) -> Self {
		Self(format!("ledger:{cycle}:{member}"))
	}

	/// Per-day debit record for one member.
	pub fn debits(date: impl Display, member: &MemberId) -> Self {
		Self(format!("debits:{date}:{member}"))
	}

	/// Cached operator session for one controller.
	pub fn controller_session(controller: &ControllerId) -> Self {
		Self(format!("controller:session:{controller}"))
	}

	/// Audit trail for one billing cycle.
	pub fn audit(cycle: impl Display) -> Self {
		Self(format!("audit:{cycle}"))
	}

	/// Borrows the raw key.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl Display for StoreKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
