//! Shared keyspace used by [`MemoryStore`](super::MemoryStore) and
//! [`FileStore`](super::FileStore).

// self
use crate::{
	_prelude::*,
	store::{CompareAndSwapOutcome, SetIfAbsentOutcome, StoreError, StoreKey},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub(crate) enum StoredValue {
	Text(String),
	Hash(BTreeMap<String, String>),
	List(Vec<String>),
}
impl StoredValue {
	fn kind(&self) -> &'static str {
		match self {
			Self::Text(_) => "text",
			Self::Hash(_) => "hash",
			Self::List(_) => "list",
		}
	}
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct StoredEntry {
	pub(crate) value: StoredValue,
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub(crate) expires_at: Option<OffsetDateTime>,
}
impl StoredEntry {
	fn is_live(&self, now: OffsetDateTime) -> bool {
		self.expires_at.is_none_or(|at| at > now)
	}
}

/// Keyspace with lazy expiry. Every operation takes `now` so callers control the clock.
///
/// Reads drop the expired key they touch. Writes also sweep the whole keyspace once the
/// earliest recorded expiry has passed, so keys nobody reads again do not accumulate.
#[derive(Clone, Debug, Default)]
pub(crate) struct StoreState {
	entries: HashMap<StoreKey, StoredEntry>,
	next_expiry: Option<OffsetDateTime>,
}
impl StoreState {
	pub(crate) fn from_entries(entries: impl IntoIterator<Item = (StoreKey, StoredEntry)>) -> Self {
		let entries: HashMap<_, _> = entries.into_iter().collect();
		let next_expiry = entries.values().filter_map(|e| e.expires_at).min();

		Self { entries, next_expiry }
	}

	/// Live entries, for persistence.
	pub(crate) fn live_entries(&self, now: OffsetDateTime) -> Vec<(&StoreKey, &StoredEntry)> {
		let mut entries: Vec<_> = self.entries.iter().filter(|(_, e)| e.is_live(now)).collect();

		entries.sort_by(|a, b| a.0.cmp(b.0));

		entries
	}

	fn live(&mut self, key: &StoreKey, now: OffsetDateTime) -> Option<&mut StoredEntry> {
		if self.entries.get(key).is_some_and(|e| !e.is_live(now)) {
			self.entries.remove(key);
		}

		self.entries.get_mut(key)
	}

	fn sweep(&mut self, now: OffsetDateTime) {
		if self.next_expiry.is_none_or(|at| at > now) {
			return;
		}

		self.entries.retain(|_, e| e.is_live(now));
		self.next_expiry = self.entries.values().filter_map(|e| e.expires_at).min();
	}

	fn track_expiry(&mut self, expires_at: Option<OffsetDateTime>) {
		if let Some(at) = expires_at {
			self.next_expiry = Some(self.next_expiry.map_or(at, |next| next.min(at)));
		}
	}

	pub(crate) fn get(
		&mut self,
		key: &StoreKey,
		now: OffsetDateTime,
	) -> Result<Option<String>, StoreError> {
		match self.live(key, now) {
			Some(StoredEntry { value: StoredValue::Text(text), .. }) => Ok(Some(text.clone())),
			Some(other) => Err(wrong_type(key, "text", &other.value)),
			None => Ok(None),
		}
	}

	pub(crate) fn set(
		&mut self,
		key: &StoreKey,
		value: String,
		ttl: Option<Duration>,
		now: OffsetDateTime,
	) {
		let expires_at = ttl.map(|t| now + t);

		self.sweep(now);
		self.track_expiry(expires_at);
		self.entries.insert(key.clone(), StoredEntry { value: StoredValue::Text(value), expires_at });
	}

	pub(crate) fn delete(&mut self, key: &StoreKey, now: OffsetDateTime) -> bool {
		self.sweep(now);

		self.live(key, now).is_some() && self.entries.remove(key).is_some()
	}

	pub(crate) fn compare_and_swap(
		&mut self,
		key: &StoreKey,
		expected: Option<&str>,
		replacement: String,
		ttl: Option<Duration>,
		now: OffsetDateTime,
	) -> Result<CompareAndSwapOutcome, StoreError> {
		let outcome = match (self.live(key, now), expected) {
			(Some(StoredEntry { value: StoredValue::Text(current), .. }), Some(expected))
				if current.as_str() == expected =>
				CompareAndSwapOutcome::Updated,
			(Some(StoredEntry { value: StoredValue::Text(_), .. }), _) =>
				CompareAndSwapOutcome::ValueMismatch,
			(Some(other), _) => return Err(wrong_type(key, "text", &other.value)),
			(None, None) => CompareAndSwapOutcome::Updated,
			(None, Some(_)) => CompareAndSwapOutcome::Missing,
		};

		if outcome == CompareAndSwapOutcome::Updated {
			self.set(key, replacement, ttl, now);
		}

		Ok(outcome)
	}

	pub(crate) fn hash_set_if_absent(
		&mut self,
		key: &StoreKey,
		field: &str,
		value: String,
		ttl: Option<Duration>,
		now: OffsetDateTime,
	) -> Result<SetIfAbsentOutcome, StoreError> {
		let expires_at = ttl.map(|t| now + t);

		self.sweep(now);

		match self.live(key, now) {
			Some(StoredEntry { value: StoredValue::Hash(fields), expires_at: entry_expiry }) => {
				if fields.contains_key(field) {
					return Ok(SetIfAbsentOutcome::AlreadyPresent);
				}

				fields.insert(field.to_owned(), value);
				*entry_expiry = expires_at;
			},
			Some(other) => return Err(wrong_type(key, "hash", &other.value)),
			None => {
				self.entries.insert(
					key.clone(),
					StoredEntry {
						value: StoredValue::Hash(BTreeMap::from([(field.to_owned(), value)])),
						expires_at,
					},
				);
			},
		}

		self.track_expiry(expires_at);

		Ok(SetIfAbsentOutcome::Inserted)
	}

	pub(crate) fn hash_get_all(
		&mut self,
		key: &StoreKey,
		now: OffsetDateTime,
	) -> Result<BTreeMap<String, String>, StoreError> {
		match self.live(key, now) {
			Some(StoredEntry { value: StoredValue::Hash(fields), .. }) => Ok(fields.clone()),
			Some(other) => Err(wrong_type(key, "hash", &other.value)),
			None => Ok(BTreeMap::new()),
		}
	}

	pub(crate) fn list_append(
		&mut self,
		key: &StoreKey,
		value: String,
		now: OffsetDateTime,
	) -> Result<usize, StoreError> {
		self.sweep(now);

		match self.live(key, now) {
			Some(StoredEntry { value: StoredValue::List(items), .. }) => {
				items.push(value);

				Ok(items.len())
			},
			Some(other) => Err(wrong_type(key, "list", &other.value)),
			None => {
				self.entries.insert(
					key.clone(),
					StoredEntry { value: StoredValue::List(vec![value]), expires_at: None },
				);

				Ok(1)
			},
		}
	}

	pub(crate) fn list_items(
		&mut self,
		key: &StoreKey,
		now: OffsetDateTime,
	) -> Result<Vec<String>, StoreError> {
		match self.live(key, now) {
			Some(StoredEntry { value: StoredValue::List(items), .. }) => Ok(items.clone()),
			Some(other) => Err(wrong_type(key, "list", &other.value)),
			None => Ok(Vec::new()),
		}
	}
}

fn wrong_type(key: &StoreKey, wanted: &str, found: &StoredValue) -> StoreError {
	StoreError::Backend {
		message: format!("Key {key} holds a {} value, not a {wanted}", found.kind()),
	}
}
