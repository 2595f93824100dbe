//! Portal-level error types shared across the policy engine, ledger, controller, and stores.

// self
use crate::{_prelude::*, controller::AuthorizationAttempt};

/// Portal-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical portal error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Required input is missing or malformed.
	#[error("Invalid {field}: {reason}.")]
	Validation {
		/// Inbound field name.
		field: &'static str,
		/// Human-readable reason.
		reason: String,
	},
	/// No membership exists for the supplied email.
	#[error("No membership was found for this email.")]
	MembershipNotFound,
	/// Membership exists but carries no tier that qualifies for the network.
	#[error("Your plan does not include access to {network}.")]
	PlanNotEntitled {
		/// Requested network name.
		network: String,
	},
	/// Access policy refused the request at this moment.
	#[error("{reason}")]
	PolicyDenied {
		/// Phase the policy evaluated.
		phase: crate::policy::Phase,
		/// Reason shown to the member verbatim.
		reason: String,
	},
	/// Remaining monthly credit cannot cover the required charges.
	#[error("Insufficient credits: {required_cents} required, {remaining_cents} remaining.")]
	InsufficientCredits {
		/// Cents the session would cost.
		required_cents: i64,
		/// Cents left in the current cycle.
		remaining_cents: i64,
	},
	/// Ledger storage failed.
	#[error("Ledger is unavailable: {0}")]
	LedgerUnavailable(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// No CSRF token could be obtained from the controller.
	#[error("Controller login failed: {reason}.")]
	ControllerLoginFailed {
		/// Last failure observed during login.
		reason: String,
		/// Authorization attempts made before the failing login, if any.
		attempts: Vec<AuthorizationAttempt>,
	},
	/// Every authorization candidate failed or the matrix was aborted.
	#[error("Controller did not authorize the client: {reason}.")]
	ControllerAuthFailed {
		/// Summary of the final failure.
		reason: String,
		/// Every candidate tried, across both passes.
		attempts: Vec<AuthorizationAttempt>,
	},
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Temporary upstream failure; retry with backoff.
	#[error(transparent)]
	Transient(#[from] TransientError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Unexpected failure inside a collaborator.
	#[error("Internal error: {reason}.")]
	Internal {
		/// Operator-facing detail.
		reason: String,
	},
}
impl Error {
	/// Builds a [`Error::Validation`] for the provided field.
	pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
		Self::Validation { field, reason: reason.into() }
	}

	/// Builds an [`Error::Internal`] from any displayable failure.
	pub fn internal(reason: impl Display) -> Self {
		Self::Internal { reason: reason.to_string() }
	}

	/// Stable classification used for external responses and metrics.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Validation { .. } => ErrorKind::Validation,
			Self::MembershipNotFound => ErrorKind::MembershipNotFound,
			Self::PlanNotEntitled { .. } => ErrorKind::PlanNotEntitled,
			Self::PolicyDenied { .. } => ErrorKind::PolicyDenied,
			Self::InsufficientCredits { .. } => ErrorKind::InsufficientCredits,
			Self::LedgerUnavailable(_) => ErrorKind::LedgerUnavailable,
			Self::ControllerLoginFailed { .. } => ErrorKind::ControllerLoginFailed,
			Self::ControllerAuthFailed { .. } => ErrorKind::ControllerAuthFailed,
			Self::Config(_) | Self::Transient(_) | Self::Transport(_) | Self::Internal { .. } =>
				ErrorKind::Internal,
		}
	}

	/// Controller attempts attached to the error, empty for non-controller failures.
	pub fn attempts(&self) -> &[AuthorizationAttempt] {
		match self {
			Self::ControllerLoginFailed { attempts, .. }
			| Self::ControllerAuthFailed { attempts, .. } => attempts,
			_ => &[],
		}
	}
}

/// Stable error classification surfaced to callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
	/// Missing or malformed input.
	Validation,
	/// Email has no membership.
	MembershipNotFound,
	/// Plan does not cover the network.
	PlanNotEntitled,
	/// Policy denied the request.
	PolicyDenied,
	/// Not enough credit left this cycle.
	InsufficientCredits,
	/// Ledger storage failure.
	LedgerUnavailable,
	/// Controller login failure.
	ControllerLoginFailed,
	/// Controller authorize failure.
	ControllerAuthFailed,
	/// Anything unexpected.
	Internal,
}
impl ErrorKind {
	/// Returns the code reported in response bodies.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Validation => "ValidationError",
			Self::MembershipNotFound => "MembershipNotFound",
			Self::PlanNotEntitled => "PlanNotEntitled",
			Self::PolicyDenied => "PolicyDenied",
			Self::InsufficientCredits => "InsufficientCredits",
			Self::LedgerUnavailable => "LedgerUnavailable",
			Self::ControllerLoginFailed => "ControllerLoginFailed",
			Self::ControllerAuthFailed => "ControllerAuthFailed",
			Self::Internal => "InternalError",
		}
	}

	/// HTTP status code equivalent.
	pub const fn http_status(self) -> u16 {
		match self {
			Self::Validation => 400,
			Self::MembershipNotFound | Self::PlanNotEntitled | Self::PolicyDenied => 403,
			Self::InsufficientCredits => 402,
			Self::LedgerUnavailable | Self::ControllerLoginFailed | Self::ControllerAuthFailed =>
				502,
			Self::Internal => 500,
		}
	}

	/// Whether the whole request may be retried later without side effects.
	pub const fn is_retryable(self) -> bool {
		matches!(
			self,
			Self::LedgerUnavailable | Self::ControllerLoginFailed | Self::ControllerAuthFailed
		)
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised while assembling components.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Controller descriptor failed validation.
	#[error(transparent)]
	InvalidDescriptor(#[from] crate::controller::ControllerDescriptorError),
	/// Access policy window or schedule is invalid.
	#[error(transparent)]
	InvalidPolicy(#[from] crate::policy::PolicyError),
	/// A configured URL cannot be parsed.
	#[error("Configured URL `{value}` is invalid.")]
	InvalidUrl {
		/// Raw value.
		value: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// A configured identifier is invalid.
	#[error(transparent)]
	InvalidIdentifier(#[from] crate::model::IdentifierError),
	/// A required setting is absent.
	#[error("Missing required setting `{key}`.")]
	Missing {
		/// Dotted setting path.
		key: &'static str,
	},
	/// A setting has an out-of-range value.
	#[error("Setting `{key}` is invalid: {reason}.")]
	Invalid {
		/// Dotted setting path.
		key: &'static str,
		/// Human-readable reason.
		reason: String,
	},
	/// Configuration sources could not be merged or decoded.
	#[error("Configuration could not be loaded: {message}.")]
	Load {
		/// Loader-provided message.
		message: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Temporary failure variants (safe to retry).
#[derive(Debug, ThisError)]
pub enum TransientError {
	/// Controller returned an unexpected but non-fatal response.
	#[error("Controller returned an unexpected response: {message}.")]
	ControllerEndpoint {
		/// Summary of the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
		/// Retry-After hint from upstream, if supplied.
		retry_after: Option<Duration>,
	},
	/// Controller responded with a body that is not the expected JSON.
	#[error("Controller returned malformed JSON.")]
	ControllerResponseParse {
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
}
impl TransientError {
	/// Upstream retry hint, if any.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::ControllerEndpoint { retry_after, .. } => *retry_after,
			Self::ControllerResponseParse { .. } => None,
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the controller.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Request exceeded its time budget.
	#[error("Controller call timed out.")]
	Timeout,
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the controller.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		if e.is_timeout() { Self::Timeout } else { Self::network(e) }
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::store::StoreError;

	#[test]
	fn kinds_map_to_codes_and_statuses() {
		let cases = [
			(Error::validation("clientMac", "missing"), "ValidationError", 400),
			(Error::MembershipNotFound, "MembershipNotFound", 403),
			(Error::PlanNotEntitled { network: "W2G_Basic".into() }, "PlanNotEntitled", 403),
			(
				Error::InsufficientCredits { required_cents: 500, remaining_cents: 0 },
				"InsufficientCredits",
				402,
			),
			(
				Error::ControllerAuthFailed { reason: "exhausted".into(), attempts: Vec::new() },
				"ControllerAuthFailed",
				502,
			),
			(Error::internal("boom"), "InternalError", 500),
			(Error::Transport(TransportError::Timeout), "InternalError", 500),
		];

		for (error, code, status) in cases {
			assert_eq!(error.kind().as_str(), code);
			assert_eq!(error.kind().http_status(), status);
		}
	}

	#[test]
	fn store_error_becomes_ledger_unavailable_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let error: Error = store_error.clone().into();

		assert_eq!(error.kind(), ErrorKind::LedgerUnavailable);
		assert!(error.kind().is_retryable());
		assert!(error.to_string().contains("database unreachable"));

		let source = StdError::source(&error)
			.expect("Ledger error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn policy_denial_displays_reason_verbatim() {
		let error = Error::PolicyDenied {
			phase: crate::policy::Phase::Closed,
			reason: "Access ends at 5:15 pm".into(),
		};

		assert_eq!(error.to_string(), "Access ends at 5:15 pm");
		assert!(error.attempts().is_empty());
	}
}
