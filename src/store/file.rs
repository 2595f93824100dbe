//! Simple file-backed [`KvStore`] for single-node deployments.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	store::{
		CompareAndSwapOutcome, KvStore, SetIfAbsentOutcome, StoreError, StoreFuture, StoreKey,
		state::{StoreState, StoredEntry},
	},
};

/// Persists the keyspace to a JSON file after each mutation.
///
/// Expired entries are dropped from the snapshot on every write.
#[derive(Clone, Debug)]
pub struct FileStore {
	path: PathBuf,
	inner: Arc<RwLock<StoreState>>,
}
impl FileStore {
	/// Opens (or creates) a store at the provided path, eagerly loading existing data.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		Self::ensure_parent_exists(&path)?;

		let snapshot = Self::load_snapshot(&path)?;

		Ok(Self { path, inner: Arc::new(RwLock::new(snapshot)) })
	}

	fn load_snapshot(path: &Path) -> Result<StoreState, StoreError> {
		if !path.exists() {
			return Ok(StoreState::default());
		}

		let bytes = fs::read(path).map_err(|e| StoreError::Backend {
			message: format!("Failed to read {}: {e}", path.display()),
		})?;

		if bytes.is_empty() {
			return Ok(StoreState::default());
		}

		let entries: Vec<(StoreKey, StoredEntry)> =
			serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization {
				message: format!("Failed to parse {}: {e}", path.display()),
			})?;

		Ok(StoreState::from_entries(entries))
	}

	fn ensure_parent_exists(path: &Path) -> Result<(), StoreError> {
		if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
			fs::create_dir_all(parent).map_err(|e| StoreError::Backend {
				message: format!("Failed to create store directory {}: {e}", parent.display()),
			})?;
		}

		Ok(())
	}

	fn persist_locked(&self, state: &StoreState, now: OffsetDateTime) -> Result<(), StoreError> {
		let serialized = serde_json::to_vec_pretty(&state.live_entries(now)).map_err(|e| {
			StoreError::Serialization { message: format!("Failed to serialize store snapshot: {e}") }
		})?;
		let mut tmp_path = self.path.clone();

		tmp_path.set_extension("tmp");

		{
			let mut file = File::create(&tmp_path).map_err(|e| StoreError::Backend {
				message: format!("Failed to create {}: {e}", tmp_path.display()),
			})?;

			file.write_all(&serialized).map_err(|e| StoreError::Backend {
				message: format!("Failed to write {}: {e}", tmp_path.display()),
			})?;
			file.sync_all().map_err(|e| StoreError::Backend {
				message: format!("Failed to sync {}: {e}", tmp_path.display()),
			})?;
		}

		fs::rename(&tmp_path, &self.path).map_err(|e| StoreError::Backend {
			message: format!("Failed to replace {}: {e}", self.path.display()),
		})
	}

	fn read_now<T>(
		&self,
		op: impl FnOnce(&mut StoreState, OffsetDateTime) -> Result<T, StoreError>,
	) -> Result<T, StoreError> {
		op(&mut self.inner.write(), OffsetDateTime::now_utc())
	}

	fn mutate_now<T>(
		&self,
		op: impl FnOnce(&mut StoreState, OffsetDateTime) -> Result<T, StoreError>,
	) -> Result<T, StoreError> {
		let now = OffsetDateTime::now_utc();
		let mut guard = self.inner.write();
		let value = op(&mut guard, now)?;

		self.persist_locked(&guard, now)?;

		Ok(value)
	}
}
impl KvStore for FileStore {
	fn get<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		Box::pin(async move { self.read_now(|s, now| s.get(key, now)) })
	}

	fn set<'a>(
		&'a self,
		key: &'a StoreKey,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, ()> {
		Box::pin(async move {
			self.mutate_now(|s, now| {
				s.set(key, value, ttl, now);

				Ok(())
			})
		})
	}

	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, bool> {
		Box::pin(async move { self.mutate_now(|s, now| Ok(s.delete(key, now))) })
	}

	fn compare_and_swap<'a>(
		&'a self,
		key: &'a StoreKey,
		expected: Option<&'a str>,
		replacement: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async move {
			self.mutate_now(|s, now| s.compare_and_swap(key, expected, replacement, ttl, now))
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
			self.mutate_now(|s, now| s.hash_set_if_absent(key, field, value, ttl, now))
		})
	}

	fn hash_get_all<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, BTreeMap<String, String>> {
		Box::pin(async move { self.read_now(|s, now| s.hash_get_all(key, now)) })
	}

	fn list_append<'a>(&'a self, key: &'a StoreKey, value: String) -> StoreFuture<'a, usize> {
		Box::pin(async move { self.mutate_now(|s, now| s.list_append(key, value, now)) })
	}

	fn list_items<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Vec<String>> {
		Box::pin(async move { self.read_now(|s, now| s.list_items(key, now)) })
	}
}
