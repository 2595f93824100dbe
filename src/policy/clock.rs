//! Wall-clock helpers: minute-of-day values and the local zone the policy is evaluated in.

// crates.io
use time::{Date, Month, PrimitiveDateTime, Time, UtcOffset, Weekday};
// self
use crate::{_prelude::*, policy::PolicyError};

/// Minutes since local midnight, `0..1440`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MinuteOfDay(pub(super) u16);
impl MinuteOfDay {
	/// Builds a value from an hour and minute on the 24-hour clock.
	pub fn new(hour: u8, minute: u8) -> Result<Self, PolicyError> {
		if hour >= 24 || minute >= 60 {
			return Err(PolicyError::InvalidTime { value: format!("{hour:02}:{minute:02}") });
		}

		Ok(Self(hour as u16 * 60 + minute as u16))
	}

	/// Parses `H:MM` or `HH:MM` on the 24-hour clock.
	pub fn parse(value: &str) -> Result<Self, PolicyError> {
		let invalid = || PolicyError::InvalidTime { value: value.to_owned() };
		let (hour, minute) = value.trim().split_once(':').ok_or_else(invalid)?;

		if minute.len() != 2 {
			return Err(invalid());
		}

		let hour = hour.parse::<u8>().map_err(|_| invalid())?;
		let minute = minute.parse::<u8>().map_err(|_| invalid())?;

		Self::new(hour, minute).map_err(|_| invalid())
	}

	/// Minute of the local day `at` falls in.
	pub fn of(at: OffsetDateTime) -> Self {
		Self(at.hour() as u16 * 60 + at.minute() as u16)
	}

	/// Minutes since midnight.
	pub const fn minutes(self) -> u16 {
		self.0
	}

	/// Whole minutes from `self` until `later`, zero when `later` is not after `self`.
	pub const fn minutes_until(self, later: MinuteOfDay) -> u16 {
		later.0.saturating_sub(self.0)
	}

	/// Member-facing 12-hour rendering such as `5:15 pm`.
	pub fn to_12h(self) -> String {
		let (hour, minute) = (self.0 / 60, self.0 % 60);
		let suffix = if hour < 12 { "am" } else { "pm" };
		let hour = match hour % 12 {
			0 => 12,
			h => h,
		};

		format!("{hour}:{minute:02} {suffix}")
	}
}
impl Display for MinuteOfDay {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
	}
}
impl FromStr for MinuteOfDay {
	type Err = PolicyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl TryFrom<String> for MinuteOfDay {
	type Error = PolicyError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(&value)
	}
}
impl From<MinuteOfDay> for String {
	fn from(value: MinuteOfDay) -> Self {
		value.to_string()
	}
}

/// Zone the policy windows are expressed in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LocalZone {
	/// Constant offset from UTC.
	Fixed {
		/// Offset in minutes east of UTC.
		offset_minutes: i16,
	},
	/// Standard offset plus one hour of daylight saving from the second Sunday of March
	/// (02:00 standard) to the first Sunday of November (02:00 daylight).
	NorthAmerican {
		/// Standard-time offset in minutes east of UTC (US Eastern is `-300`).
		standard_offset_minutes: i16,
	},
}
impl LocalZone {
	/// US Eastern time.
	pub const US_EASTERN: LocalZone = LocalZone::NorthAmerican { standard_offset_minutes: -300 };
	/// UTC.
	pub const UTC: LocalZone = LocalZone::Fixed { offset_minutes: 0 };

	/// Rejects offsets outside ±18 hours.
	pub fn validate(&self) -> Result<(), PolicyError> {
		let minutes = match *self {
			Self::Fixed { offset_minutes } => offset_minutes,
			Self::NorthAmerican { standard_offset_minutes } => standard_offset_minutes,
		};

		offset(minutes).map(|_| ()).ok_or(PolicyError::InvalidOffset { minutes })
	}

	/// UTC offset in effect at `instant`.
	pub fn offset_at(&self, instant: OffsetDateTime) -> UtcOffset {
		match *self {
			Self::Fixed { offset_minutes } => offset(offset_minutes).unwrap_or(UtcOffset::UTC),
			Self::NorthAmerican { standard_offset_minutes } => {
				let Some(standard) = offset(standard_offset_minutes) else {
					return UtcOffset::UTC;
				};
				let in_dst = daylight_bounds(instant.to_offset(standard).year(), standard)
					.is_some_and(|(start, end)| instant >= start && instant < end);

				if in_dst {
					offset(standard_offset_minutes.saturating_add(60)).unwrap_or(standard)
				} else {
					standard
				}
			},
		}
	}

	/// Converts `instant` into local wall-clock time.
	pub fn to_local(&self, instant: OffsetDateTime) -> OffsetDateTime {
		instant.to_offset(self.offset_at(instant))
	}

	/// Whether `instant` falls on a local Saturday or Sunday.
	pub fn is_weekend(&self, instant: OffsetDateTime) -> bool {
		matches!(self.to_local(instant).weekday(), Weekday::Saturday | Weekday::Sunday)
	}
}
impl Default for LocalZone {
	fn default() -> Self {
		Self::US_EASTERN
	}
}

const MAX_OFFSET_MINUTES: u16 = 18 * 60;

fn offset(minutes: i16) -> Option<UtcOffset> {
	if minutes.unsigned_abs() > MAX_OFFSET_MINUTES {
		return None;
	}

	UtcOffset::from_whole_seconds(minutes as i32 * 60).ok()
}

fn daylight_bounds(year: i32, standard: UtcOffset) -> Option<(OffsetDateTime, OffsetDateTime)> {
	let start = nth_sunday(year, Month::March, 2)?;
	let end = nth_sunday(year, Month::November, 1)?;
	let start = PrimitiveDateTime::new(start, Time::from_hms(2, 0, 0).ok()?).assume_offset(standard);
	// 02:00 daylight is 01:00 standard.
	let end = PrimitiveDateTime::new(end, Time::from_hms(1, 0, 0).ok()?).assume_offset(standard);

	Some((start, end))
}

fn nth_sunday(year: i32, month: Month, n: u8) -> Option<Date> {
	let first = Date::from_calendar_date(year, month, 1).ok()?;
	let to_sunday = (7 - first.weekday().number_days_from_sunday()) % 7;

	Date::from_calendar_date(year, month, 1 + to_sunday + 7 * (n - 1)).ok()
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros::datetime;
	// self
	use super::*;

	#[test]
	fn minute_of_day_parses_and_renders() {
		let cutoff = MinuteOfDay::parse("17:15").expect("Cutoff should parse.");

		assert_eq!(cutoff.minutes(), 17 * 60 + 15);
		assert_eq!(cutoff.to_string(), "17:15");
		assert_eq!(cutoff.to_12h(), "5:15 pm");
		assert_eq!(MinuteOfDay::parse("8:50").map(MinuteOfDay::to_12h), Ok("8:50 am".into()));
		assert_eq!(MinuteOfDay::parse("0:05").map(MinuteOfDay::to_12h), Ok("12:05 am".into()));
		assert_eq!(MinuteOfDay::parse("12:00").map(MinuteOfDay::to_12h), Ok("12:00 pm".into()));
		assert!(MinuteOfDay::parse("24:00").is_err());
		assert!(MinuteOfDay::parse("9:5").is_err());
		assert!(MinuteOfDay::parse("nine").is_err());
	}

	#[test]
	fn eastern_offsets_follow_daylight_rules() {
		let zone = LocalZone::US_EASTERN;

		assert_eq!(zone.offset_at(datetime!(2025-01-15 15:00 UTC)).whole_hours(), -5);
		assert_eq!(zone.offset_at(datetime!(2025-07-01 15:00 UTC)).whole_hours(), -4);
		// 2025-03-09 02:00 EST == 07:00 UTC.
		assert_eq!(zone.offset_at(datetime!(2025-03-09 06:59 UTC)).whole_hours(), -5);
		assert_eq!(zone.offset_at(datetime!(2025-03-09 07:00 UTC)).whole_hours(), -4);
		// 2025-11-02 02:00 EDT == 06:00 UTC.
		assert_eq!(zone.offset_at(datetime!(2025-11-02 05:59 UTC)).whole_hours(), -4);
		assert_eq!(zone.offset_at(datetime!(2025-11-02 06:00 UTC)).whole_hours(), -5);
	}

	#[test]
	fn weekend_detection_uses_local_date() {
		let zone = LocalZone::US_EASTERN;

		// Saturday 01:00 UTC is still Friday evening in New York.
		assert!(!zone.is_weekend(datetime!(2025-09-06 01:00 UTC)));
		assert!(zone.is_weekend(datetime!(2025-09-06 14:00 UTC)));
	}

	#[test]
	fn fixed_zone_rejects_absurd_offsets() {
		assert!(LocalZone::Fixed { offset_minutes: 120 }.validate().is_ok());
		assert!(LocalZone::Fixed { offset_minutes: -18 * 60 }.validate().is_ok());
		assert_eq!(
			LocalZone::NorthAmerican { standard_offset_minutes: 19 * 60 }.validate(),
			Err(PolicyError::InvalidOffset { minutes: 19 * 60 })
		);
		assert_eq!(
			LocalZone::Fixed { offset_minutes: 24 * 60 }.validate(),
			Err(PolicyError::InvalidOffset { minutes: 24 * 60 })
		);
	}
}
