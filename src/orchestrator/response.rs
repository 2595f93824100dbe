//! Outbound response shape shared by every authorization outcome.

// self
use crate::{
	_prelude::*, controller::AuthorizationAttempt, error::ErrorKind, ledger::ChargeOutcome,
	policy::Phase,
};

/// Result of one authorization request, ready to serialize for the splash page.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeResponse {
	/// Whether the client was admitted.
	pub ok: bool,
	/// Correlates the response with log lines.
	pub request_id: String,
	/// Where the splash page should send the client.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub redirect_url: Option<String>,
	/// When the granted session ends.
	#[serde(default, skip_serializing_if = "Option::is_none", with = "time::serde::rfc3339::option")]
	pub session_cutoff: Option<OffsetDateTime>,
	/// Whether this admission extended an earlier session.
	#[serde(default)]
	pub extension_applied: bool,
	/// Policy phase the request fell in.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub phase: Option<Phase>,
	/// Granted session length.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub session_duration_ms: Option<i64>,
	/// Charges applied or skipped by this request.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub charges: Vec<ChargeOutcome>,
	/// Failure details.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ResponseError>,
	/// Controller diagnostics, present on controller failures.
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub attempts: Vec<AuthorizationAttempt>,
}
impl AuthorizeResponse {
	/// Failure response for `error`.
	pub fn failure(request_id: impl Into<String>, error: &Error) -> Self {
		Self {
			ok: false,
			request_id: request_id.into(),
			redirect_url: None,
			session_cutoff: None,
			extension_applied: false,
			phase: match error {
				Error::PolicyDenied { phase, .. } => Some(*phase),
				_ => None,
			},
			session_duration_ms: None,
			charges: Vec::new(),
			error: Some(ResponseError::from_error(error)),
			attempts: error.attempts().to_vec(),
		}
	}

	/// HTTP status the response should be sent with.
	pub fn status(&self) -> u16 {
		self.error.as_ref().map_or(200, |e| e.status)
	}
}

/// Error section of a failed [`AuthorizeResponse`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
	/// Stable code such as `PolicyDenied`.
	pub code: String,
	/// Member-facing message.
	pub message: String,
	/// HTTP status equivalent.
	pub status: u16,
}
impl ResponseError {
	/// Maps `error` to its external shape. Internal details stay in the logs.
	pub fn from_error(error: &Error) -> Self {
		let kind = error.kind();
		let message = match kind {
			ErrorKind::Internal => "Something went wrong; please try again.".into(),
			_ => error.to_string(),
		};

		Self { code: kind.as_str().into(), message, status: kind.http_status() }
	}
}
