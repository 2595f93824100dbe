//! Cookie handling and the shared controller session cache.

// self
use crate::{
	_prelude::*,
	controller::ControllerBroker,
	http::{ControllerHttpClient, ControllerResponse},
	model::Secret,
	obs::log_event,
	store::StoreKey,
};

/// Minimal cookie jar: name → value, later responses overwrite earlier ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CookieJar(BTreeMap<String, String>);
impl CookieJar {
	/// Rebuilds a jar from a `Cookie` header value.
	pub fn parse_header(raw: &str) -> Self {
		let mut jar = Self::default();

		for pair in raw.split(';') {
			jar.insert_pair(pair);
		}

		jar
	}

	/// Merges every `Set-Cookie` of `response`. Attributes after the first `;` are ignored.
	pub fn absorb(&mut self, response: &ControllerResponse) {
		for line in response.set_cookies() {
			if let Some(pair) = line.split(';').next() {
				self.insert_pair(pair);
			}
		}
	}

	/// Value of the cookie named `name`, compared case-insensitively.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.0.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
	}

	/// `Cookie` header value, or `None` when empty.
	pub fn header_value(&self) -> Option<String> {
		if self.0.is_empty() {
			return None;
		}

		Some(self.0.iter().map(|(n, v)| format!("{n}={v}")).collect::<Vec<_>>().join("; "))
	}

	/// Number of cookies held.
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Whether the jar holds no cookies.
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	fn insert_pair(&mut self, pair: &str) {
		if let Some((name, value)) = pair.trim().split_once('=') {
			let name = name.trim();

			if !name.is_empty() {
				self.0.insert(name.to_owned(), value.trim().to_owned());
			}
		}
	}
}

/// Authenticated controller session shared through the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerSession {
	/// Token sent in the CSRF header on authorize calls.
	pub csrf_token: Secret,
	/// `Cookie` header captured after login.
	pub cookie_header: String,
	/// When the login completed.
	#[serde(with = "time::serde::rfc3339")]
	pub acquired_at: OffsetDateTime,
}
impl ControllerSession {
	/// Whether the session is still inside `ttl` at `now`.
	pub fn is_fresh(&self, now: OffsetDateTime, ttl: Duration) -> bool {
		self.acquired_at <= now && now < self.acquired_at + ttl
	}

	/// Cookies of the session as a jar.
	pub fn jar(&self) -> CookieJar {
		CookieJar::parse_header(&self.cookie_header)
	}
}

impl<C> ControllerBroker<C>
where
	C: ?Sized + ControllerHttpClient,
{
	/// Reads the cached session. Store failures, undecodable entries, and stale sessions are
	/// all misses.
	pub(crate) async fn cached_session(&self, now: OffsetDateTime) -> Option<ControllerSession> {
		let key = StoreKey::controller_session(&self.descriptor.id);
		let raw = match self.store.get(&key).await {
			Ok(raw) => raw?,
			Err(e) => {
				log_event!(warn, error = %e, "Session cache read failed; logging in.");

				return None;
			},
		};

		match serde_json::from_str::<ControllerSession>(&raw) {
			Ok(session) if session.is_fresh(now, self.descriptor.quirks.session_ttl) =>
				Some(session),
			Ok(_) => None,
			Err(e) => {
				log_event!(warn, error = %e, "Cached session is unreadable; logging in.");

				None
			},
		}
	}

	/// Writes `session` with the descriptor's TTL. Failures are logged only.
	pub(crate) async fn cache_session(&self, session: &ControllerSession) {
		let key = StoreKey::controller_session(&self.descriptor.id);
		let payload = match serde_json::to_string(session) {
			Ok(payload) => payload,
			Err(e) => {
				log_event!(warn, error = %e, "Session could not be encoded for caching.");

				return;
			},
		};

		if let Err(e) =
			self.store.set(&key, payload, Some(self.descriptor.quirks.session_ttl)).await
		{
			log_event!(warn, error = %e, "Session cache write failed.");
		}
	}
}
