//! Observability helpers for portal flows.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `portal_broker.flow` with the `flow` and
//!   `stage` fields, plus the events logged through [`log_event!`](crate::obs::log_event).
//! - Enable `metrics` to increment `portal_broker_flow_total` (labeled by `flow` + `outcome`) and
//!   `portal_broker_authorize_attempt_total` (labeled by `verdict`).
//!
//! Personal data never reaches a log line; callers pass [`fingerprint`](crate::model::fingerprint)
//! tags instead of raw emails or hardware addresses.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Flow kinds observed by the portal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowKind {
	/// One inbound authorization request, end to end.
	Authorize,
	/// Warm-up plus operator login against the controller.
	Login,
	/// Variant negotiation against the authorize endpoint.
	Admit,
	/// Ledger reads and debits.
	Ledger,
}
impl FlowKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowKind::Authorize => "authorize",
			FlowKind::Login => "login",
			FlowKind::Admit => "admit",
			FlowKind::Ledger => "ledger",
		}
	}
}
impl Display for FlowKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FlowOutcome {
	/// Entry to a flow.
	Attempt,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl FlowOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			FlowOutcome::Attempt => "attempt",
			FlowOutcome::Success => "success",
			FlowOutcome::Failure => "failure",
		}
	}

	/// Maps a result onto its terminal outcome.
	pub fn of<T, E>(result: &Result<T, E>) -> Self {
		if result.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure }
	}
}
impl Display for FlowOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Emits a `tracing` event at the given level; without the `tracing` feature the field values
/// are still evaluated by reference so nothing goes unused.
macro_rules! log_event {
	(@discard $msg:literal $(, $arg:expr)* $(,)?) => {
		$(let _ = &$arg;)*
	};
	(@discard $field:ident = %$value:expr, $($rest:tt)+) => {
		let _ = &$value;
		$crate::obs::log_event!(@discard $($rest)+);
	};
	(@discard $field:ident = ?$value:expr, $($rest:tt)+) => {
		let _ = &$value;
		$crate::obs::log_event!(@discard $($rest)+);
	};
	(@discard $field:ident = $value:expr, $($rest:tt)+) => {
		let _ = &$value;
		$crate::obs::log_event!(@discard $($rest)+);
	};
	(@discard %$field:ident, $($rest:tt)+) => {
		let _ = &$field;
		$crate::obs::log_event!(@discard $($rest)+);
	};
	(@discard ?$field:ident, $($rest:tt)+) => {
		let _ = &$field;
		$crate::obs::log_event!(@discard $($rest)+);
	};
	(@discard $field:ident, $($rest:tt)+) => {
		let _ = &$field;
		$crate::obs::log_event!(@discard $($rest)+);
	};
	($level:ident, $($arg:tt)+) => {{
		#[cfg(feature = "tracing")]
		{
			::tracing::$level!($($arg)+);
		}
		#[cfg(not(feature = "tracing"))]
		{
			$crate::obs::log_event!(@discard $($arg)+);
		}
	}};
}
pub(crate) use log_event;
