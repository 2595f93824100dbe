//! Credit Ledger: a monthly spending cap per member and at-most-once debits per charge code per
//! local calendar day.
//!
//! Two store shapes back the ledger. The cycle entry (`ledger:{cycle}:{member}`) is a JSON
//! document updated through compare-and-swap. The debit record (`debits:{date}:{member}`) is a
//! field map whose fields are charge codes; inserting a field with the store's atomic
//! set-if-absent is the only thing that decides whether a charge is applied.

// crates.io
use time::Date;
// self
use crate::{
	_prelude::*,
	model::MemberId,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, log_event},
	policy::{Charge, ChargeCode, Phase},
	store::{CompareAndSwapOutcome, KvStore, SetIfAbsentOutcome, StoreError, StoreKey},
};

/// Billing cycle, one calendar month (`YYYY-MM`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CycleKey {
	year: i32,
	month: u8,
}
impl CycleKey {
	/// Cycle containing `date`.
	pub fn of(date: Date) -> Self {
		Self { year: date.year(), month: date.month() as u8 }
	}
}
impl Display for CycleKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{:04}-{:02}", self.year, self.month)
	}
}

/// Local calendar day (`YYYY-MM-DD`) debits are keyed by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(Date);
impl DateKey {
	/// Wraps a local date.
	pub const fn new(date: Date) -> Self {
		Self(date)
	}

	/// Cycle the day belongs to.
	pub fn cycle(&self) -> CycleKey {
		CycleKey::of(self.0)
	}

	/// Underlying date.
	pub const fn date(&self) -> Date {
		self.0
	}
}
impl Display for DateKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{:04}-{:02}-{:02}", self.0.year(), self.0.month() as u8, self.0.day())
	}
}

/// One member's balance for one billing cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
	/// Owning member.
	pub member_id: MemberId,
	/// `YYYY-MM` cycle label.
	pub cycle_key: String,
	/// Cents left this cycle.
	pub remaining_cents: i64,
	/// Cents debited this cycle.
	pub spent_cents: i64,
	/// Debits applied this cycle.
	pub checkins: u32,
	/// Last write.
	#[serde(with = "time::serde::rfc3339")]
	pub last_updated: OffsetDateTime,
}
impl LedgerEntry {
	fn seed(cycle: CycleKey, member: &MemberId, cap_cents: i64, now: OffsetDateTime) -> Self {
		Self {
			member_id: member.clone(),
			cycle_key: cycle.to_string(),
			remaining_cents: cap_cents,
			spent_cents: 0,
			checkins: 0,
			last_updated: now,
		}
	}

	fn debit(&mut self, amount_cents: i64, now: OffsetDateTime) {
		self.remaining_cents -= amount_cents;
		self.spent_cents += amount_cents;
		self.checkins += 1;
		self.last_updated = now;
	}
}

/// Charges already applied for one member on one day.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DebitRecord(BTreeMap<String, i64>);
impl DebitRecord {
	/// Whether `code` was already charged.
	pub fn contains(&self, code: ChargeCode) -> bool {
		self.0.contains_key(code.as_str())
	}

	/// Amount charged for `code`, if any.
	pub fn amount(&self, code: ChargeCode) -> Option<i64> {
		self.0.get(code.as_str()).copied()
	}

	/// Charges from `charges` that are not yet in the record.
	pub fn outstanding<'a>(&self, charges: &'a [Charge]) -> Vec<&'a Charge> {
		charges.iter().filter(|c| !self.contains(c.code)).collect()
	}

	/// Number of fields.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether nothing was charged.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}
}

/// Result of [`CreditLedger::apply_charge_if_absent`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeOutcome {
	/// Charge code.
	pub code: ChargeCode,
	/// Cents.
	pub amount_cents: i64,
	/// `false` when the code was already charged today.
	pub applied: bool,
}

/// Audit trail entry appended after a successful admission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
	/// When the admission completed.
	#[serde(with = "time::serde::rfc3339")]
	pub at: OffsetDateTime,
	/// Inbound request id.
	pub request_id: String,
	/// Member admitted.
	pub member_id: MemberId,
	/// Email fingerprint.
	pub email_tag: String,
	/// Client hardware-address fingerprint.
	pub client_tag: String,
	/// Network the client joined.
	pub network: Option<String>,
	/// Policy phase.
	pub phase: Phase,
	/// Admission length in milliseconds.
	pub session_duration_ms: i64,
	/// Codes debited by this request.
	pub applied: Vec<ChargeCode>,
	/// Codes skipped because they were already charged today.
	pub skipped: Vec<ChargeCode>,
}

/// Ledger tunables.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerSettings {
	/// Credit granted per cycle.
	pub monthly_cap_cents: i64,
	/// TTL of each day's debit record.
	pub debit_retention: Duration,
	/// Compare-and-swap retries before the ledger is reported unavailable.
	pub max_cas_attempts: u32,
}
impl Default for LedgerSettings {
	fn default() -> Self {
		Self { monthly_cap_cents: 10_000, debit_retention: Duration::days(60), max_cas_attempts: 5 }
	}
}

/// Ledger operations over a shared [`KvStore`].
#[derive(Clone)]
pub struct CreditLedger {
	store: Arc<dyn KvStore>,
	settings: LedgerSettings,
}
impl CreditLedger {
	/// Creates a ledger over `store`.
	pub fn new(store: Arc<dyn KvStore>, settings: LedgerSettings) -> Self {
		Self { store, settings }
	}

	/// Active settings.
	pub fn settings(&self) -> &LedgerSettings {
		&self.settings
	}

	/// Tops `remaining_cents` up when `remaining + spent` fell below the configured cap.
	///
	/// Returns whether the entry changed. Never lowers a balance.
	pub fn reconcile(&self, entry: &mut LedgerEntry) -> bool {
		let shortfall =
			self.settings.monthly_cap_cents - (entry.remaining_cents + entry.spent_cents);

		if shortfall > 0 {
			entry.remaining_cents += shortfall;

			true
		} else {
			false
		}
	}

	/// Whether `entry` can cover `required_cents`.
	pub fn has_sufficient_balance(&self, entry: &LedgerEntry, required_cents: i64) -> bool {
		entry.remaining_cents >= required_cents
	}

	/// Reads the cycle entry, seeding it with the monthly cap when absent and persisting any
	/// reconciliation top-up.
	pub async fn get_or_init(
		&self,
		cycle: CycleKey,
		member: &MemberId,
		now: OffsetDateTime,
	) -> Result<LedgerEntry> {
		let key = StoreKey::ledger(cycle, member);

		for _ in 0..self.settings.max_cas_attempts {
			let current = self.store.get(&key).await?;
			let mut entry = match &current {
				Some(raw) => decode_entry(raw)?,
				None => LedgerEntry::seed(cycle, member, self.settings.monthly_cap_cents, now),
			};
			let changed = self.reconcile(&mut entry);

			if current.is_some() && !changed {
				return Ok(entry);
			}

			if changed {
				entry.last_updated = now;

				log_event!(
					info,
					cycle = %cycle,
					member = %member,
					"Ledger entry topped up to the monthly cap."
				);
			}

			let replacement = encode_entry(&entry)?;

			match self.store.compare_and_swap(&key, current.as_deref(), replacement, None).await? {
				CompareAndSwapOutcome::Updated => return Ok(entry),
				CompareAndSwapOutcome::ValueMismatch | CompareAndSwapOutcome::Missing => continue,
			}
		}

		Err(contention(&key).into())
	}

	/// Current debit record for `member` on `date`.
	pub async fn debit_record(&self, date: DateKey, member: &MemberId) -> Result<DebitRecord> {
		let key = StoreKey::debits(date, member);
		let fields = self.store.hash_get_all(&key).await?;
		let mut record = BTreeMap::new();

		for (field, value) in fields {
			let amount = value.parse::<i64>().map_err(|e| StoreError::Serialization {
				message: format!("Debit field {field} in {key} is not an amount: {e}"),
			})?;

			record.insert(field, amount);
		}

		Ok(DebitRecord(record))
	}

	/// Applies `charge` for `member` on `date` unless that code was already charged that day.
	///
	/// The debit-record field is inserted first with the store's atomic set-if-absent; only the
	/// caller that inserted it updates the cycle entry. A cycle update that keeps losing its
	/// compare-and-swap surfaces as [`Error::LedgerUnavailable`] with the field left in place, so
	/// a retried request never debits twice.
	pub async fn apply_charge_if_absent(
		&self,
		date: DateKey,
		member: &MemberId,
		charge: &Charge,
		now: OffsetDateTime,
	) -> Result<ChargeOutcome> {
		const KIND: FlowKind = FlowKind::Ledger;

		let span = FlowSpan::new(KIND, "apply_charge_if_absent");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<ChargeOutcome> = span
			.instrument(async move {
				let debits = StoreKey::debits(date, member);
				let inserted = self
					.store
					.hash_set_if_absent(
						&debits,
						charge.code.as_str(),
						charge.amount_cents.to_string(),
						Some(self.settings.debit_retention),
					)
					.await?;
				let mut outcome = ChargeOutcome {
					code: charge.code,
					amount_cents: charge.amount_cents,
					applied: false,
				};

				if inserted == SetIfAbsentOutcome::AlreadyPresent {
					log_event!(debug, code = %charge.code, %date, "Charge already applied today.");

					return Ok(outcome);
				}

				self.debit_cycle(date.cycle(), member, charge.amount_cents, now).await?;

				outcome.applied = true;

				log_event!(
					info,
					code = %charge.code,
					amount_cents = charge.amount_cents,
					%date,
					"Charge applied."
				);

				Ok(outcome)
			})
			.await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	/// Appends `event` to the cycle's audit trail.
	pub async fn record_audit(&self, cycle: CycleKey, event: &AuditEvent) -> Result<()> {
		let payload = serde_json::to_string(event).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode audit event: {e}"),
		})?;

		self.store.list_append(&StoreKey::audit(cycle), payload).await?;

		Ok(())
	}

	/// Audit trail of `cycle`, oldest first.
	pub async fn audit_events(&self, cycle: CycleKey) -> Result<Vec<AuditEvent>> {
		self.store
			.list_items(&StoreKey::audit(cycle))
			.await?
			.iter()
			.map(|raw| {
				serde_json::from_str(raw).map_err(|e| {
					Error::from(StoreError::Serialization {
						message: format!("Failed to decode audit event: {e}"),
					})
				})
			})
			.collect()
	}

	async fn debit_cycle(
		&self,
		cycle: CycleKey,
		member: &MemberId,
		amount_cents: i64,
		now: OffsetDateTime,
	) -> Result<LedgerEntry> {
		let key = StoreKey::ledger(cycle, member);

		for attempt in 1..=self.settings.max_cas_attempts {
			let current = self.store.get(&key).await?;
			let mut entry = match &current {
				Some(raw) => decode_entry(raw)?,
				None => LedgerEntry::seed(cycle, member, self.settings.monthly_cap_cents, now),
			};

			self.reconcile(&mut entry);
			entry.debit(amount_cents, now);

			let replacement = encode_entry(&entry)?;

			match self.store.compare_and_swap(&key, current.as_deref(), replacement, None).await? {
				CompareAndSwapOutcome::Updated => return Ok(entry),
				CompareAndSwapOutcome::ValueMismatch | CompareAndSwapOutcome::Missing => {
					log_event!(debug, attempt, key = %key, "Ledger entry changed; retrying.");
				},
			}
		}

		log_event!(
			error,
			key = %key,
			"Ledger entry update exhausted its retries after the debit was recorded."
		);

		Err(contention(&key).into())
	}
}
impl Debug for CreditLedger {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("CreditLedger").field("settings", &self.settings).finish_non_exhaustive()
	}
}

fn decode_entry(raw: &str) -> Result<LedgerEntry, StoreError> {
	serde_json::from_str(raw).map_err(|e| StoreError::Serialization {
		message: format!("Failed to decode ledger entry: {e}"),
	})
}

fn encode_entry(entry: &LedgerEntry) -> Result<String, StoreError> {
	serde_json::to_string(entry).map_err(|e| StoreError::Serialization {
		message: format!("Failed to encode ledger entry: {e}"),
	})
}

fn contention(key: &StoreKey) -> StoreError {
	StoreError::Backend { message: format!("Ledger entry {key} kept changing during update") }
}
