// self
use crate::_prelude::*;

/// Controller-specific quirks that influence the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerQuirks {
	/// Header carrying the CSRF token on authorize calls.
	pub csrf_header: String,
	/// Path (below the controller root) sent as `Referer` on the operator login.
	pub login_referer: String,
	/// How long a cached session is trusted without re-verification.
	pub session_ttl: Duration,
}
impl Default for ControllerQuirks {
	fn default() -> Self {
		Self {
			csrf_header: "Csrf-Token".into(),
			login_referer: "/portal".into(),
			session_ttl: Duration::minutes(10),
		}
	}
}
