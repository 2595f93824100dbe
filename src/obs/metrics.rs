// self
use crate::obs::{FlowKind, FlowOutcome};

/// Records a flow outcome via the global metrics recorder (when enabled).
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!(
			"portal_broker_flow_total",
			"flow" => kind.as_str(),
			"outcome" => outcome.as_str()
		)
		.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = (kind, outcome);
	}
}

/// Counts one controller authorize call by its classified verdict.
pub fn record_authorize_attempt(verdict: &'static str) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("portal_broker_authorize_attempt_total", "verdict" => verdict)
			.increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = verdict;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_are_safe_without_an_installed_recorder() {
		record_flow_outcome(FlowKind::Admit, FlowOutcome::Failure);
		record_authorize_attempt("retryable_mismatch");
	}
}
