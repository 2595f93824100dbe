//! Access Policy Engine: turns wall-clock time and an extension flag into an allow/deny decision,
//! a session duration, and the charges the session costs.
//!
//! [`AccessPolicy::plan`] is pure. Evaluation happens at minute resolution in the configured
//! [`LocalZone`], so every second within a local minute yields the same decision.

pub mod charge;
pub mod clock;

pub use charge::*;
pub use clock::*;

// crates.io
use time::Date;
// self
use crate::_prelude::*;

/// Errors raised while building or validating a policy.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum PolicyError {
	/// A time-of-day value could not be parsed.
	#[error("Invalid time of day `{value}`; expected HH:MM.")]
	InvalidTime {
		/// Offending input.
		value: String,
	},
	/// Window boundaries are not strictly increasing.
	#[error("Policy window must satisfy {early_start} < {day_end} < {hard_cutoff}.")]
	WindowOrder {
		/// Early-start boundary.
		early_start: MinuteOfDay,
		/// Day-end boundary.
		day_end: MinuteOfDay,
		/// Hard-cutoff boundary.
		hard_cutoff: MinuteOfDay,
	},
	/// Zone offset is out of range.
	#[error("Zone offset of {minutes} minutes is out of range.")]
	InvalidOffset {
		/// Offending offset.
		minutes: i16,
	},
	/// A charge code label is not recognized.
	#[error("Unknown charge code `{code}`.")]
	UnknownChargeCode {
		/// Offending label.
		code: String,
	},
	/// A configured charge is negative.
	#[error("Charge `{code}` has a negative amount ({amount_cents}).")]
	NegativeCharge {
		/// Charge code.
		code: ChargeCode,
		/// Configured amount.
		amount_cents: i64,
	},
	/// The after-hours session cap must be at least one minute.
	#[error("Extension cap must be at least one minute.")]
	ExtensionCapTooShort,
}

/// Classification of the moment a request was evaluated at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
	/// Outside every access window.
	Closed,
	/// Before the early-start boundary.
	Early,
	/// Between early start and day end.
	Day,
	/// Between day end and the hard cutoff.
	AfterHours,
}
impl Phase {
	/// Stable label.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Closed => "closed",
			Self::Early => "early",
			Self::Day => "day",
			Self::AfterHours => "after_hours",
		}
	}
}
impl Display for Phase {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome of one policy evaluation.
///
/// A denied decision always has a zero duration and no charges.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessDecision {
	/// Whether the client may be admitted.
	pub allowed: bool,
	/// Member-facing reason, present when denied.
	pub deny_reason: Option<String>,
	/// How long the controller should admit the client for.
	pub session_duration: Duration,
	/// Charges in the order they should be applied.
	pub charges: Vec<Charge>,
	/// Phase the request fell in.
	pub phase: Phase,
}
impl AccessDecision {
	fn allow(phase: Phase, duration: Duration, charges: Vec<Charge>) -> Self {
		Self {
			allowed: true,
			deny_reason: None,
			session_duration: duration.max(Duration::MINUTE),
			charges,
			phase,
		}
	}

	fn deny(phase: Phase, reason: impl Into<String>) -> Self {
		Self {
			allowed: false,
			deny_reason: Some(reason.into()),
			session_duration: Duration::ZERO,
			charges: Vec::new(),
			phase,
		}
	}

	/// Session duration in whole milliseconds.
	pub fn session_duration_ms(&self) -> i64 {
		self.session_duration.whole_milliseconds() as i64
	}

	/// Sum of every charge.
	pub fn total_cents(&self) -> i64 {
		self.charges.iter().map(|c| c.amount_cents).sum()
	}

	/// Instant the session granted at `now` ends.
	pub fn cutoff(&self, now: OffsetDateTime) -> OffsetDateTime {
		now + self.session_duration
	}
}

/// Ordered daily boundaries: `early_start < day_end < hard_cutoff`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow", into = "RawWindow")]
pub struct PolicyWindow {
	early_start: MinuteOfDay,
	day_end: MinuteOfDay,
	hard_cutoff: MinuteOfDay,
}
impl PolicyWindow {
	/// Validates and builds a window.
	pub fn new(
		early_start: MinuteOfDay,
		day_end: MinuteOfDay,
		hard_cutoff: MinuteOfDay,
	) -> Result<Self, PolicyError> {
		if early_start >= day_end || day_end >= hard_cutoff {
			return Err(PolicyError::WindowOrder { early_start, day_end, hard_cutoff });
		}

		Ok(Self { early_start, day_end, hard_cutoff })
	}

	/// Parses `HH:MM` boundaries.
	pub fn parse(early_start: &str, day_end: &str, hard_cutoff: &str) -> Result<Self, PolicyError> {
		Self::new(
			MinuteOfDay::parse(early_start)?,
			MinuteOfDay::parse(day_end)?,
			MinuteOfDay::parse(hard_cutoff)?,
		)
	}

	/// Early-start boundary.
	pub const fn early_start(&self) -> MinuteOfDay {
		self.early_start
	}

	/// Day-end boundary; extensions open here.
	pub const fn day_end(&self) -> MinuteOfDay {
		self.day_end
	}

	/// Hard cutoff; nothing is admitted at or after it.
	pub const fn hard_cutoff(&self) -> MinuteOfDay {
		self.hard_cutoff
	}
}
impl Default for PolicyWindow {
	fn default() -> Self {
		Self {
			early_start: MinuteOfDay(8 * 60 + 50),
			day_end: MinuteOfDay(16 * 60 + 10),
			hard_cutoff: MinuteOfDay(17 * 60 + 15),
		}
	}
}

#[derive(Serialize, Deserialize)]
struct RawWindow {
	early_start: MinuteOfDay,
	day_end: MinuteOfDay,
	hard_cutoff: MinuteOfDay,
}
impl TryFrom<RawWindow> for PolicyWindow {
	type Error = PolicyError;

	fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
		Self::new(raw.early_start, raw.day_end, raw.hard_cutoff)
	}
}
impl From<PolicyWindow> for RawWindow {
	fn from(w: PolicyWindow) -> Self {
		Self { early_start: w.early_start, day_end: w.day_end, hard_cutoff: w.hard_cutoff }
	}
}

/// Time-of-day access policy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessPolicy {
	window: PolicyWindow,
	extension_cap: Duration,
	closed_on_weekends: bool,
	zone: LocalZone,
	schedule: ChargeSchedule,
}
impl AccessPolicy {
	/// Policy over `window` with a 60-minute after-hours cap, weekends closed, US Eastern time,
	/// and the default price list.
	pub fn new(window: PolicyWindow) -> Self {
		Self {
			window,
			extension_cap: Duration::minutes(60),
			closed_on_weekends: true,
			zone: LocalZone::default(),
			schedule: ChargeSchedule::default(),
		}
	}

	/// Overrides the after-hours session cap.
	pub fn with_extension_cap(mut self, cap: Duration) -> Result<Self, PolicyError> {
		if cap < Duration::MINUTE {
			return Err(PolicyError::ExtensionCapTooShort);
		}

		self.extension_cap = cap;

		Ok(self)
	}

	/// Toggles weekend closure.
	pub fn with_weekends_closed(mut self, closed: bool) -> Self {
		self.closed_on_weekends = closed;

		self
	}

	/// Overrides the evaluation zone.
	pub fn with_zone(mut self, zone: LocalZone) -> Result<Self, PolicyError> {
		zone.validate()?;

		self.zone = zone;

		Ok(self)
	}

	/// Overrides the price list.
	pub fn with_schedule(mut self, schedule: ChargeSchedule) -> Result<Self, PolicyError> {
		schedule.validate()?;

		self.schedule = schedule;

		Ok(self)
	}

	/// Daily boundaries.
	pub const fn window(&self) -> &PolicyWindow {
		&self.window
	}

	/// Evaluation zone.
	pub const fn zone(&self) -> LocalZone {
		self.zone
	}

	/// Local calendar date of `now`; debit records are keyed by it.
	pub fn local_date(&self, now: OffsetDateTime) -> Date {
		self.zone.to_local(now).date()
	}

	/// Decides whether a client may come online at `now`.
	pub fn plan(&self, now: OffsetDateTime, is_extension: bool) -> AccessDecision {
		let PolicyWindow { early_start, day_end, hard_cutoff } = self.window;
		let minute = MinuteOfDay::of(self.zone.to_local(now));
		let closed_reason = || format!("Access ends at {}", hard_cutoff.to_12h());

		if self.closed_on_weekends && self.zone.is_weekend(now) {
			return AccessDecision::deny(Phase::Closed, "Access is closed on weekends");
		}
		if minute >= hard_cutoff {
			return AccessDecision::deny(Phase::Closed, closed_reason());
		}
		if is_extension && minute < day_end {
			let phase = if minute < early_start { Phase::Early } else { Phase::Day };

			return AccessDecision::deny(
				phase,
				format!("Extend is available after {}", day_end.to_12h()),
			);
		}
		if minute >= day_end {
			let remaining = Duration::minutes(minute.minutes_until(hard_cutoff).into());

			if remaining <= Duration::ZERO {
				return AccessDecision::deny(Phase::Closed, closed_reason());
			}

			return AccessDecision::allow(
				Phase::AfterHours,
				remaining.min(self.extension_cap),
				vec![self.schedule.charge(ChargeCode::AfterHours)],
			);
		}

		let to_day_end = Duration::minutes(minute.minutes_until(day_end).into());

		if minute < early_start {
			AccessDecision::allow(
				Phase::Early,
				to_day_end,
				vec![self.schedule.charge(ChargeCode::Early), self.schedule.charge(ChargeCode::Daily)],
			)
		} else {
			AccessDecision::allow(Phase::Day, to_day_end, vec![self.schedule.charge(ChargeCode::Daily)])
		}
	}
}
impl Default for AccessPolicy {
	fn default() -> Self {
		Self::new(PolicyWindow::default())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn window_rejects_inverted_boundaries() {
		assert!(PolicyWindow::parse("08:50", "16:10", "17:15").is_ok());
		assert!(matches!(
			PolicyWindow::parse("16:10", "08:50", "17:15"),
			Err(PolicyError::WindowOrder { .. })
		));
		assert!(PolicyWindow::parse("08:50", "17:15", "17:15").is_err());
	}

	#[test]
	fn window_deserializes_through_validation() {
		let window: PolicyWindow = serde_json::from_str(
			r#"{"early_start":"07:30","day_end":"15:00","hard_cutoff":"18:00"}"#,
		)
		.expect("Window should deserialize.");

		assert_eq!(window.day_end().to_string(), "15:00");
		assert!(
			serde_json::from_str::<PolicyWindow>(
				r#"{"early_start":"18:00","day_end":"15:00","hard_cutoff":"07:30"}"#
			)
			.is_err()
		);
	}

	#[test]
	fn denied_decisions_carry_no_duration_or_charges() {
		let policy = AccessPolicy::default();
		// Wednesday 18:00 EDT.
		let decision = policy.plan(datetime!(2025-09-03 22:00 UTC), false);

		assert!(!decision.allowed);
		assert_eq!(decision.session_duration, Duration::ZERO);
		assert!(decision.charges.is_empty());
		assert_eq!(decision.total_cents(), 0);
	}

	#[test]
	fn extension_cap_is_validated() {
		assert_eq!(
			AccessPolicy::default().with_extension_cap(Duration::seconds(30)),
			Err(PolicyError::ExtensionCapTooShort)
		);
	}

	#[test]
	fn short_caps_still_grant_a_minute() {
		let policy = AccessPolicy::default()
			.with_extension_cap(Duration::MINUTE)
			.expect("One-minute cap should be accepted.");
		// Wednesday 17:14 EDT.
		let decision = policy.plan(datetime!(2025-09-03 21:14 UTC), true);

		assert!(decision.allowed);
		assert_eq!(decision.session_duration_ms(), 60_000);
	}
}
