// crates.io
use time::macros::datetime;
// self
use portal_broker::{
	_preludet::*,
	policy::{AccessDecision, AccessPolicy, ChargeCode, LocalZone, Phase},
};

fn utc_policy() -> AccessPolicy {
	AccessPolicy::default().with_zone(LocalZone::UTC).expect("UTC zone should be valid.")
}

fn codes(decision: &AccessDecision) -> Vec<ChargeCode> {
	decision.charges.iter().map(|c| c.code).collect()
}

#[test]
fn phases_change_exactly_at_each_boundary() {
	let policy = utc_policy();
	// Wednesday.
	let early = policy.plan(datetime!(2025-09-03 08:49 UTC), false);
	let day = policy.plan(datetime!(2025-09-03 08:50 UTC), false);
	let after_hours = policy.plan(datetime!(2025-09-03 16:10 UTC), false);
	let last_minute = policy.plan(datetime!(2025-09-03 17:14 UTC), false);
	let closed = policy.plan(datetime!(2025-09-03 17:15 UTC), false);

	assert_eq!(early.phase, Phase::Early);
	assert_eq!(codes(&early), vec![ChargeCode::Early, ChargeCode::Daily]);
	assert_eq!(early.session_duration, Duration::minutes(441));

	assert_eq!(day.phase, Phase::Day);
	assert_eq!(codes(&day), vec![ChargeCode::Daily]);
	assert_eq!(day.session_duration, Duration::minutes(440));

	assert_eq!(after_hours.phase, Phase::AfterHours);
	assert_eq!(codes(&after_hours), vec![ChargeCode::AfterHours]);
	assert_eq!(after_hours.session_duration, Duration::minutes(60));

	assert_eq!(last_minute.session_duration, Duration::minutes(1));

	assert_eq!(closed.phase, Phase::Closed);
	assert!(!closed.allowed);
	assert_eq!(closed.deny_reason.as_deref(), Some("Access ends at 5:15 pm"));
}

#[test]
fn extensions_are_refused_before_day_end() {
	let policy = utc_policy();

	for (at, phase) in [
		(datetime!(2025-09-03 07:00 UTC), Phase::Early),
		(datetime!(2025-09-03 12:00 UTC), Phase::Day),
		(datetime!(2025-09-03 16:09 UTC), Phase::Day),
	] {
		let decision = policy.plan(at, true);

		assert!(!decision.allowed);
		assert_eq!(decision.phase, phase);
		assert_eq!(decision.deny_reason.as_deref(), Some("Extend is available after 4:10 pm"));
		assert!(decision.charges.is_empty());
	}

	let extended = policy.plan(datetime!(2025-09-03 16:10 UTC), true);

	assert!(extended.allowed);
	assert_eq!(extended.phase, Phase::AfterHours);
}

#[test]
fn weekends_close_unless_configured_open() {
	// Sunday noon.
	let sunday = datetime!(2025-09-07 12:00 UTC);
	let closed = utc_policy().plan(sunday, false);
	let open = utc_policy().with_weekends_closed(false).plan(sunday, false);

	assert_eq!(closed.phase, Phase::Closed);
	assert_eq!(closed.deny_reason.as_deref(), Some("Access is closed on weekends"));
	assert_eq!(open.phase, Phase::Day);
}

#[test]
fn plans_are_deterministic() {
	let policy = AccessPolicy::default();
	let now = datetime!(2025-09-03 20:45 UTC);

	assert_eq!(policy.plan(now, true), policy.plan(now, true));
	assert_eq!(policy.plan(now, false), policy.plan(now, false));
}

#[test]
fn eastern_time_follows_daylight_saving() {
	let policy = AccessPolicy::default();
	// 13:30 UTC is 08:30 EST in January but 09:30 EDT in July.
	let winter = policy.plan(datetime!(2025-01-15 13:30 UTC), false);
	let summer = policy.plan(datetime!(2025-07-16 13:30 UTC), false);

	assert_eq!(winter.phase, Phase::Early);
	assert_eq!(summer.phase, Phase::Day);
}
