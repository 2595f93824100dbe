//! Charge codes and the configurable price list.

// self
use crate::{_prelude::*, policy::PolicyError};

/// Canonical reason for a debit; each code is independently idempotent per day.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargeCode {
	/// Access before the early-start boundary.
	Early,
	/// Standard daily allotment.
	Daily,
	/// Access or extension after the day-end boundary.
	AfterHours,
}
impl ChargeCode {
	/// Every code in ledger order.
	pub const ALL: [ChargeCode; 3] = [ChargeCode::Early, ChargeCode::Daily, ChargeCode::AfterHours];

	/// Stable label used as the debit-record field name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Early => "early",
			Self::Daily => "daily",
			Self::AfterHours => "after_hours",
		}
	}
}
impl Display for ChargeCode {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
impl FromStr for ChargeCode {
	type Err = PolicyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|code| code.as_str() == s)
			.ok_or_else(|| PolicyError::UnknownChargeCode { code: s.to_owned() })
	}
}

/// One priced line of an access decision.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Charge {
	/// Charge code.
	pub code: ChargeCode,
	/// Amount in cents.
	pub amount_cents: i64,
	/// Member-facing description.
	pub label: String,
}

/// Price and label configured for one charge code.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRate {
	/// Amount in cents.
	pub amount_cents: i64,
	/// Member-facing description.
	pub label: String,
}
impl ChargeRate {
	/// Creates a rate.
	pub fn new(amount_cents: i64, label: impl Into<String>) -> Self {
		Self { amount_cents, label: label.into() }
	}
}

/// Price list keyed by charge code.
///
/// Codes absent from the schedule price at zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChargeSchedule(BTreeMap<ChargeCode, ChargeRate>);
impl ChargeSchedule {
	/// Empty schedule; every code prices at zero.
	pub fn empty() -> Self {
		Self(BTreeMap::new())
	}

	/// Sets the rate for `code`.
	pub fn with_rate(mut self, code: ChargeCode, rate: ChargeRate) -> Self {
		self.0.insert(code, rate);

		self
	}

	/// Prices `code`.
	pub fn charge(&self, code: ChargeCode) -> Charge {
		match self.0.get(&code) {
			Some(rate) =>
				Charge { code, amount_cents: rate.amount_cents, label: rate.label.clone() },
			None => Charge { code, amount_cents: 0, label: code.as_str().to_owned() },
		}
	}

	/// Rejects negative amounts.
	pub fn validate(&self) -> Result<(), PolicyError> {
		match self.0.iter().find(|(_, rate)| rate.amount_cents < 0) {
			Some((code, rate)) =>
				Err(PolicyError::NegativeCharge { code: *code, amount_cents: rate.amount_cents }),
			None => Ok(()),
		}
	}
}
impl Default for ChargeSchedule {
	fn default() -> Self {
		Self::empty()
			.with_rate(ChargeCode::Early, ChargeRate::new(500, "Early access before 8:50"))
			.with_rate(ChargeCode::Daily, ChargeRate::new(500, "Day access 9:00 to 4:10"))
			.with_rate(ChargeCode::AfterHours, ChargeRate::new(500, "After hours 4:10 to 5:15"))
	}
}
