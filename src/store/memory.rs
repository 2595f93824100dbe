//! Thread-safe in-memory [`KvStore`] implementation for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{
		CompareAndSwapOutcome, KvStore, SetIfAbsentOutcome, StoreError, StoreFuture, StoreKey,
		state::StoreState,
	},
};

type SharedState = Arc<RwLock<StoreState>>;

/// Process-local keyspace; clones share the same data.
///
/// Every operation runs under one write lock, which makes compare-and-swap and
/// set-if-absent atomic across tasks within the process.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore(SharedState);
impl MemoryStore {
	fn apply_now<T>(
		state: &SharedState,
		op: impl FnOnce(&mut StoreState, OffsetDateTime) -> Result<T, StoreError>,
	) -> Result<T, StoreError> {
		op(&mut state.write(), OffsetDateTime::now_utc())
	}
}
impl KvStore for MemoryStore {
	fn get<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { Self::apply_now(&self.0, |s, now| s.get(key, now)) })
	}

	fn set<'a>(
		&'a self,
		key: &'a StoreKey,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			Self::apply_now(&self.0, |s, now| {
				s.set(key, value, ttl, now);

				Ok(())
			})
		})
	}

	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { Self::apply_now(&self.0, |s, now| Ok(s.delete(key, now))) })
	}

	fn compare_and_swap<'a>(
		&'a self,
		key: &'a StoreKey,
		expected: Option<&'a str>,
		replacement: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			Self::apply_now(&self.0, |s, now| {
				s.compare_and_swap(key, expected, replacement, ttl, now)
			})
		})
	}

	fn hash_set_if_absent<'a>(
		&'a self,
		key: &'a StoreKey,
		field: &'a str,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, SetIfAbsentOutcome> {
		Box::pin(async move {
			Self::apply_now(&self.0, |s, now| s.hash_set_if_absent(key, field, value, ttl, now))
		})
	}

	fn hash_get_all<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, BTreeMap<String, String>> {
		Box::pin(async move { Self::apply_now(&self.0, |s, now| s.hash_get_all(key, now)) })
	}

	fn list_append<'a>(&'a self, key: &'a StoreKey, value: String) -> StoreFuture<'a, usize> {
		Box::pin(async move { Self::apply_now(&self.0, |s, now| s.list_append(key, value, now)) })
	}

	fn list_items<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Vec<String>> {
		Box::pin(async move { Self::apply_now(&self.0, |s, now| s.list_items(key, now)) })
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[tokio::test]
	async fn clones_share_the_keyspace() {
		let store = MemoryStore::default();
		let clone = store.clone();
		let key = StoreKey::new("shared");

		store.set(&key, "v".into(), None).await.expect("Set should succeed.");

		assert_eq!(clone.get(&key).await, Ok(Some("v".into())));
		assert_eq!(clone.delete(&key).await, Ok(true));
		assert_eq!(store.get(&key).await, Ok(None));
	}

	#[tokio::test]
	async fn concurrent_set_if_absent_inserts_once() {
		let store = MemoryStore::default();
		let key = StoreKey::new("debits:2025-09-03:m-1");
		let mut handles = Vec::new();

		for i in 0..16 {
			let store = store.clone();
			let key = key.clone();

			handles.push(tokio::spawn(async move {
				store.hash_set_if_absent(&key, "daily", i.to_string(), None).await
			}));
		}

		let mut inserted = 0;

		for handle in handles {
			if handle.await.expect("Task should join.") == Ok(SetIfAbsentOutcome::Inserted) {
				inserted += 1;
			}
		}

		assert_eq!(inserted, 1);
	}
}
