//! Controller strategy hooks that classify authorize responses.
//!
//! Implementations decide, per candidate, whether negotiation succeeded, should move on to the
//! next variant, or must stop, without tying the broker to any particular HTTP client.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{_prelude::*, controller::AuthorizeCandidate, http::ControllerResponse};

/// Application-level code the controller uses for "wrong address/type combination".
pub const DEFAULT_MISMATCH_CODE: i64 = -1001;

/// Strategy hook that lets deployments adapt negotiation to their controller build.
///
/// Override only what you need; `augment_authorize_body` has a default no-op implementation.
pub trait ControllerStrategy: Send + Sync {
	/// Maps one authorize response (or transport failure) to a verdict.
	fn classify_authorize(&self, ctx: &AuthorizeContext) -> AuthorizeVerdict;

	/// Gives deployments a chance to add fields to the authorize body before dispatch.
	fn augment_authorize_body(
		&self,
		_candidate: &AuthorizeCandidate<'_>,
		_body: &mut Map<String, Value>,
	) {
	}
}

/// Outcome of one authorize candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizeVerdict {
	/// Client admitted; stop negotiating.
	Success,
	/// Controller rejected this shape; try the next candidate.
	RetryableMismatch,
	/// Any other failure; abandon the remaining candidates.
	HardFailure,
}
impl AuthorizeVerdict {
	/// Stable label for metrics and diagnostics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Success => "success",
			Self::RetryableMismatch => "retryable_mismatch",
			Self::HardFailure => "hard_failure",
		}
	}
}
impl Display for AuthorizeVerdict {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Primitive view of an authorize response handed to strategies.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AuthorizeContext {
	/// HTTP status, when a response arrived.
	pub http_status: Option<u16>,
	/// Controller `errorCode`, when the body carried one.
	pub error_code: Option<i64>,
	/// Controller `msg`, when the body carried one.
	pub message: Option<String>,
	/// Whether the call failed below HTTP.
	pub network_error: bool,
}
impl AuthorizeContext {
	/// Context for a transport failure.
	pub fn network_failure() -> Self {
		Self { network_error: true, ..Default::default() }
	}

	/// Attaches a human-readable message.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = Some(message.into());

		self
	}

	/// Extracts status, `errorCode`, and `msg` from a response. Non-JSON bodies leave the code
	/// empty.
	pub fn from_response(response: &ControllerResponse) -> Self {
		let body = serde_json::from_slice::<Value>(&response.body).ok();
		let field = |name: &str| body.as_ref().and_then(|b| b.get(name));
		let error_code = field("errorCode").and_then(|v| match v {
			Value::Number(n) => n.as_i64(),
			Value::String(s) => s.trim().parse().ok(),
			_ => None,
		});
		let message = field("msg").and_then(Value::as_str).map(str::to_owned);

		Self { http_status: Some(response.status), error_code, message, network_error: false }
	}

	/// One-line description for error reasons.
	pub fn describe(&self) -> String {
		if self.network_error {
			return match self.message.as_deref() {
				Some(message) => format!("transport failure ({message})"),
				None => "transport failure".into(),
			};
		}

		let mut out = match self.http_status {
			Some(status) => format!("HTTP {status}"),
			None => "no response".into(),
		};

		if let Some(code) = self.error_code {
			out.push_str(&format!(", errorCode {code}"));
		}
		if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
			out.push_str(&format!(" ({message})"));
		}

		out
	}
}

/// Default strategy for hotspot-style controllers.
///
/// Success is `errorCode == 0` or a 302/303 redirect. The configured mismatch codes and HTTP
/// 404/405 (endpoint variant not served) move on to the next candidate. Everything else,
/// including transport failures, aborts the pass.
#[derive(Clone, Debug)]
pub struct DefaultControllerStrategy {
	mismatch_codes: Vec<i64>,
}
impl DefaultControllerStrategy {
	/// Strategy treating `codes` as "try another variant".
	pub fn with_mismatch_codes(codes: impl IntoIterator<Item = i64>) -> Self {
		Self { mismatch_codes: codes.into_iter().collect() }
	}

	/// Configured mismatch codes.
	pub fn mismatch_codes(&self) -> &[i64] {
		&self.mismatch_codes
	}
}
impl Default for DefaultControllerStrategy {
	fn default() -> Self {
		Self::with_mismatch_codes([DEFAULT_MISMATCH_CODE])
	}
}
impl Display for DefaultControllerStrategy {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("default-controller-strategy")
	}
}
impl ControllerStrategy for DefaultControllerStrategy {
	fn classify_authorize(&self, ctx: &AuthorizeContext) -> AuthorizeVerdict {
		if ctx.network_error {
			return AuthorizeVerdict::HardFailure;
		}
		if matches!(ctx.http_status, Some(302 | 303)) || ctx.error_code == Some(0) {
			return AuthorizeVerdict::Success;
		}
		if ctx.error_code.is_some_and(|code| self.mismatch_codes.contains(&code)) {
			return AuthorizeVerdict::RetryableMismatch;
		}

		match ctx.http_status {
			Some(404 | 405) => AuthorizeVerdict::RetryableMismatch,
			_ => AuthorizeVerdict::HardFailure,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn ctx(status: u16, body: &str) -> AuthorizeContext {
		AuthorizeContext::from_response(&ControllerResponse::new(status, body.as_bytes().to_vec()))
	}

	#[test]
	fn default_strategy_classifies_codes_and_statuses() {
		let strategy = DefaultControllerStrategy::default();
		let cases = [
			(ctx(200, r#"{"errorCode":0}"#), AuthorizeVerdict::Success),
			(ctx(302, ""), AuthorizeVerdict::Success),
			(ctx(200, r#"{"errorCode":-1001,"msg":"Invalid"}"#), AuthorizeVerdict::RetryableMismatch),
			(ctx(200, r#"{"errorCode":"-1001"}"#), AuthorizeVerdict::RetryableMismatch),
			(ctx(404, "<html>Not Found</html>"), AuthorizeVerdict::RetryableMismatch),
			(ctx(200, r#"{"errorCode":-1,"msg":"Session timed out"}"#), AuthorizeVerdict::HardFailure),
			(ctx(500, "oops"), AuthorizeVerdict::HardFailure),
			(AuthorizeContext::network_failure(), AuthorizeVerdict::HardFailure),
		];

		for (ctx, expected) in cases {
			assert_eq!(strategy.classify_authorize(&ctx), expected, "{ctx:?}");
		}
	}

	#[test]
	fn custom_mismatch_codes_replace_the_default() {
		let strategy = DefaultControllerStrategy::with_mismatch_codes([-41501]);

		assert_eq!(
			strategy.classify_authorize(&ctx(200, r#"{"errorCode":-41501}"#)),
			AuthorizeVerdict::RetryableMismatch
		);
		assert_eq!(
			strategy.classify_authorize(&ctx(200, r#"{"errorCode":-1001}"#)),
			AuthorizeVerdict::HardFailure
		);
	}

	#[test]
	fn describe_summarizes_the_response() {
		assert_eq!(
			ctx(200, r#"{"errorCode":-1,"msg":"Session timed out"}"#).describe(),
			"HTTP 200, errorCode -1 (Session timed out)"
		);
		assert_eq!(AuthorizeContext::network_failure().describe(), "transport failure");
	}
}
