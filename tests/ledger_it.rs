// crates.io
use time::macros::{date, datetime};
// self
use portal_broker::{
	_preludet::*,
	error::ErrorKind,
	ledger::{CreditLedger, DateKey, LedgerSettings},
	model::MemberId,
	policy::{ChargeCode, ChargeSchedule},
	store::{
		CompareAndSwapOutcome, KvStore, MemoryStore, SetIfAbsentOutcome, StoreFuture, StoreKey,
	},
};

const NOW: OffsetDateTime = datetime!(2025-09-03 14:00 UTC);

/// Store whose compare-and-swap always loses, as if another writer kept racing it.
#[derive(Default)]
struct ContendedStore(MemoryStore);
impl KvStore for ContendedStore {
	fn get<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Option<String>> {
		self.0.get(key)
	}

	fn set<'a>(
		&'a self,
		key: &'a StoreKey,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, ()> {
		self.0.set(key, value, ttl)
	}

	fn delete<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, bool> {
		self.0.delete(key)
	}

	fn compare_and_swap<'a>(
		&'a self,
		_: &'a StoreKey,
		_: Option<&'a str>,
		_: String,
		_: Option<Duration>,
	) -> StoreFuture<'a, CompareAndSwapOutcome> {
		Box::pin(async { Ok(CompareAndSwapOutcome::ValueMismatch) })
	}

	fn hash_set_if_absent<'a>(
		&'a self,
		key: &'a StoreKey,
		field: &'a str,
		value: String,
		ttl: Option<Duration>,
	) -> StoreFuture<'a, SetIfAbsentOutcome> {
		self.0.hash_set_if_absent(key, field, value, ttl)
	}

	fn hash_get_all<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, BTreeMap<String, String>> {
		self.0.hash_get_all(key)
	}

	fn list_append<'a>(&'a self, key: &'a StoreKey, value: String) -> StoreFuture<'a, usize> {
		self.0.list_append(key, value)
	}

	fn list_items<'a>(&'a self, key: &'a StoreKey) -> StoreFuture<'a, Vec<String>> {
		self.0.list_items(key)
	}
}

fn member() -> MemberId {
	MemberId::new("m-1").expect("Member fixture should be valid.")
}

fn today() -> DateKey {
	DateKey::new(date!(2025 - 09 - 03))
}

#[tokio::test]
async fn concurrent_requests_debit_once() {
	let ledger = CreditLedger::new(Arc::new(MemoryStore::default()), LedgerSettings::default());
	let charge = ChargeSchedule::default().charge(ChargeCode::Daily);
	let mut handles = Vec::new();

	for _ in 0..16 {
		let ledger = ledger.clone();
		let charge = charge.clone();

		handles.push(tokio::spawn(async move {
			ledger.apply_charge_if_absent(today(), &member(), &charge, NOW).await
		}));
	}

	let mut applied = 0;

	for handle in handles {
		let outcome = handle
			.await
			.expect("Charge task should join.")
			.expect("Charge should be recorded or skipped.");

		if outcome.applied {
			applied += 1;
		}
	}

	assert_eq!(applied, 1);

	let entry = ledger
		.get_or_init(today().cycle(), &member(), NOW)
		.await
		.expect("Ledger entry should be readable.");

	assert_eq!(entry.remaining_cents, 9_500);
	assert_eq!(entry.spent_cents, 500);
	assert_eq!(entry.checkins, 1);
}

#[tokio::test]
async fn days_are_charged_independently() {
	let ledger = CreditLedger::new(Arc::new(MemoryStore::default()), LedgerSettings::default());
	let charge = ChargeSchedule::default().charge(ChargeCode::Daily);
	let tomorrow = DateKey::new(date!(2025 - 09 - 04));

	for date in [today(), today(), tomorrow] {
		ledger
			.apply_charge_if_absent(date, &member(), &charge, NOW)
			.await
			.expect("Charge should be recorded or skipped.");
	}

	let entry = ledger
		.get_or_init(today().cycle(), &member(), NOW)
		.await
		.expect("Ledger entry should be readable.");
	let record =
		ledger.debit_record(tomorrow, &member()).await.expect("Debit record should be readable.");

	assert_eq!(entry.spent_cents, 1_000);
	assert_eq!(entry.checkins, 2);
	assert_eq!(record.amount(ChargeCode::Daily), Some(500));
	assert!(!record.contains(ChargeCode::Early));
}

#[tokio::test]
async fn lost_cycle_updates_surface_as_unavailable_without_double_debits() {
	let ledger = CreditLedger::new(Arc::new(ContendedStore::default()), LedgerSettings::default());
	let charge = ChargeSchedule::default().charge(ChargeCode::Daily);
	let err = ledger
		.apply_charge_if_absent(today(), &member(), &charge, NOW)
		.await
		.expect_err("Contended cycle update should fail.");

	assert_eq!(err.kind(), ErrorKind::LedgerUnavailable);
	assert_eq!(err.kind().http_status(), 502);

	let record =
		ledger.debit_record(today(), &member()).await.expect("Debit record should be readable.");

	assert!(record.contains(ChargeCode::Daily), "The debit field should stay in place.");

	let retry = ledger
		.apply_charge_if_absent(today(), &member(), &charge, NOW)
		.await
		.expect("Retried charge should be skipped.");

	assert!(!retry.applied);
}

#[tokio::test]
async fn stored_entries_below_the_cap_are_topped_up() {
	let store = Arc::new(MemoryStore::default());
	let ledger = CreditLedger::new(
		store.clone(),
		LedgerSettings { monthly_cap_cents: 12_000, ..Default::default() },
	);
	let key = StoreKey::ledger(today().cycle(), &member());
	let stale = serde_json::json!({
		"memberId": "m-1",
		"cycleKey": "2025-09",
		"remainingCents": 9_000,
		"spentCents": 1_000,
		"checkins": 2,
		"lastUpdated": "2025-09-01T14:00:00Z",
	});

	store.set(&key, stale.to_string(), None).await.expect("Ledger fixture should be stored.");

	let entry = ledger
		.get_or_init(today().cycle(), &member(), NOW)
		.await
		.expect("Ledger entry should be readable.");

	assert_eq!(entry.remaining_cents, 11_000);
	assert_eq!(entry.last_updated, NOW);

	let persisted = store.get(&key).await.expect("Stored entry should be readable.");

	assert!(persisted.is_some_and(|raw| raw.contains("11000")), "The top-up should be persisted.");
}
