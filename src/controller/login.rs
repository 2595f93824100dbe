//! Warm-up + operator login with bounded, jittered retries.

// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	controller::{ControllerBroker, ControllerSession, CookieJar},
	error::TransientError,
	http::{ControllerHttpClient, ControllerResponse, HttpMethod},
	model::Secret,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, log_event},
};

const CSRF_HEADERS: [&str; 2] = ["Csrf-Token", "X-Csrf-Token"];
const CSRF_COOKIES: [&str; 7] = [
	"csrf-token",
	"csrf_token",
	"csrftoken",
	"x-csrf-token",
	"x_csrf_token",
	"portal-csrf",
	"portal_csrf",
];

/// Backoff for the warm-up + login sequence.
///
/// Only transient failures (transport errors, 5xx/429, malformed bodies) are retried; an
/// explicit credential rejection fails immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Total login attempts, including the first.
	pub max_attempts: u32,
	/// Delay before the second attempt; doubles afterwards.
	pub base_delay: Duration,
	/// Upper bound for any single delay, including `Retry-After` hints.
	pub max_delay: Duration,
	/// Whether to pick each delay uniformly from its upper half.
	pub jitter: bool,
}
impl RetryPolicy {
	/// Retries up to `max_attempts` times without sleeping.
	pub fn immediate(max_attempts: u32) -> Self {
		Self { max_attempts, base_delay: Duration::ZERO, max_delay: Duration::ZERO, jitter: false }
	}

	/// Delay after the failed `attempt` (1-based), floored by a capped `retry_after` hint.
	pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
		let doublings = attempt.saturating_sub(1).min(16);
		let mut delay =
			self.base_delay.saturating_mul(1_i32 << doublings).min(self.max_delay).max(Duration::ZERO);

		if self.jitter && delay.is_positive() {
			let upper = u64::try_from(delay.whole_milliseconds()).unwrap_or(u64::MAX);
			let picked = rand::rng().random_range(upper / 2..=upper);

			delay = Duration::milliseconds(i64::try_from(picked).unwrap_or(i64::MAX));
		}

		match retry_after {
			Some(hint) => delay.max(hint.min(self.max_delay)),
			None => delay,
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_attempts: 3,
			base_delay: Duration::milliseconds(250),
			max_delay: Duration::seconds(2),
			jitter: true,
		}
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginBody {
	#[serde(rename = "errorCode")]
	error_code: Option<i64>,
	msg: Option<String>,
	result: Option<LoginResult>,
	token: Option<String>,
}
impl LoginBody {
	fn token(&self) -> Option<String> {
		self.result
			.as_ref()
			.and_then(|r| r.token.as_deref())
			.or(self.token.as_deref())
			.filter(|t| !t.is_empty())
			.map(str::to_owned)
	}

	fn rejection(&self, status: u16) -> String {
		match (self.error_code, self.msg.as_deref()) {
			(Some(code), Some(msg)) if code != 0 =>
				format!("operator login rejected with errorCode {code} ({msg})"),
			(Some(code), None) if code != 0 => format!("operator login rejected with errorCode {code}"),
			_ => format!("login answered HTTP {status} without a CSRF token"),
		}
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginResult {
	token: Option<String>,
}

impl<C> ControllerBroker<C>
where
	C: ?Sized + ControllerHttpClient,
{
	/// Performs warm-up + login, retrying transient failures per [`RetryPolicy`].
	pub(crate) async fn login(&self) -> Result<ControllerSession> {
		const KIND: FlowKind = FlowKind::Login;

		let span = FlowSpan::new(KIND, "login");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<ControllerSession> = span
			.instrument(async move {
				let max_attempts = self.retry_policy.max_attempts.max(1);
				let mut last_error = None;

				for attempt in 1..=max_attempts {
					self.metrics.record_login();

					let error = match self.login_once().await {
						Ok(session) => {
							log_event!(info, attempt, "Controller login succeeded.");

							return Ok(session);
						},
						Err(e @ (Error::Transient(_) | Error::Transport(_))) => e,
						Err(e) => return Err(e),
					};

					if attempt < max_attempts {
						let retry_after = match &error {
							Error::Transient(e) => e.retry_after(),
							_ => None,
						};
						let delay = self.retry_policy.delay_for(attempt, retry_after);

						log_event!(
							warn,
							attempt,
							delay_ms = delay.whole_milliseconds() as u64,
							error = %error,
							"Controller login failed; retrying."
						);
						tokio::time::sleep(delay.unsigned_abs()).await;
					}

					last_error = Some(error);
				}

				let reason = match last_error {
					Some(e) => format!(
						"{} (after {max_attempts} attempts)",
						e.to_string().trim_end_matches('.')
					),
					None => "no login attempt was made".into(),
				};

				Err(Error::ControllerLoginFailed { reason, attempts: Vec::new() })
			})
			.await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	async fn login_once(&self) -> Result<ControllerSession> {
		let now = OffsetDateTime::now_utc();
		let descriptor = &self.descriptor;
		let referer = descriptor.endpoint(&descriptor.quirks.login_referer)?;
		let mut jar = CookieJar::default();
		let warm_up = self
			.http_client
			.execute(self.browser_request(
				HttpMethod::Get,
				descriptor.warm_up_url()?,
				&referer,
				&jar,
				now,
			))
			.await?;

		reject_server_error(&warm_up, "warm-up", now)?;
		jar.absorb(&warm_up);

		let credentials = serde_json::json!({
			"name": descriptor.operator.name,
			"password": descriptor.operator.password.expose(),
		});
		let request = self
			.browser_request(HttpMethod::Post, descriptor.login_url()?, &referer, &jar, now)
			.with_header("X-Requested-With", "XMLHttpRequest")
			.with_json(&credentials);
		let response = self.http_client.execute(request).await?;

		reject_server_error(&response, "login", now)?;
		jar.absorb(&response);

		let parsed = response.json::<LoginBody>();
		let token = parsed
			.as_ref()
			.ok()
			.and_then(LoginBody::token)
			.or_else(|| header_token(&response, &descriptor.quirks.csrf_header))
			.or_else(|| cookie_token(&jar));

		match (token, parsed) {
			(Some(token), _) => Ok(ControllerSession {
				csrf_token: Secret::new(token),
				cookie_header: jar.header_value().unwrap_or_default(),
				acquired_at: now,
			}),
			(None, Err(e)) => Err(e.into()),
			(None, Ok(body)) => Err(Error::ControllerLoginFailed {
				reason: body.rejection(response.status),
				attempts: Vec::new(),
			}),
		}
	}
}

fn reject_server_error(
	response: &ControllerResponse,
	stage: &str,
	now: OffsetDateTime,
) -> Result<(), TransientError> {
	if response.is_server_error() || response.status == 429 {
		Err(TransientError::ControllerEndpoint {
			message: format!("{stage} answered HTTP {}: {}", response.status, response.body_snippet()),
			status: Some(response.status),
			retry_after: response.retry_after(now),
		})
	} else {
		Ok(())
	}
}

fn header_token(response: &ControllerResponse, configured: &str) -> Option<String> {
	std::iter::once(configured)
		.chain(CSRF_HEADERS)
		.find_map(|name| response.header(name).map(str::trim).filter(|t| !t.is_empty()))
		.map(str::to_owned)
}

fn cookie_token(jar: &CookieJar) -> Option<String> {
	CSRF_COOKIES
		.iter()
		.find_map(|name| jar.get(name).filter(|t| !t.is_empty()))
		.map(str::to_owned)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn delays_double_and_respect_the_cap() {
		let policy = RetryPolicy { jitter: false, ..Default::default() };

		assert_eq!(policy.delay_for(1, None), Duration::milliseconds(250));
		assert_eq!(policy.delay_for(2, None), Duration::milliseconds(500));
		assert_eq!(policy.delay_for(5, None), Duration::seconds(2));
		assert_eq!(policy.delay_for(40, None), Duration::seconds(2));
	}

	#[test]
	fn retry_after_floors_the_delay_up_to_the_cap() {
		let policy = RetryPolicy { jitter: false, ..Default::default() };

		assert_eq!(policy.delay_for(1, Some(Duration::seconds(1))), Duration::seconds(1));
		assert_eq!(policy.delay_for(1, Some(Duration::seconds(30))), Duration::seconds(2));
		assert_eq!(RetryPolicy::immediate(3).delay_for(2, Some(Duration::seconds(5))), Duration::ZERO);
	}

	#[test]
	fn jitter_stays_within_the_upper_half() {
		let policy = RetryPolicy::default();

		for _ in 0..64 {
			let delay = policy.delay_for(2, None);

			assert!(delay >= Duration::milliseconds(250) && delay <= Duration::milliseconds(500));
		}
	}

	#[test]
	fn body_token_prefers_result_over_top_level() {
		let body: LoginBody = serde_json::from_str(r#"{"token":"top","result":{"token":"nested"}}"#)
			.expect("Login body fixture should parse.");

		assert_eq!(body.token().as_deref(), Some("nested"));

		let body: LoginBody =
			serde_json::from_str(r#"{"token":"top","result":{}}"#).expect("Fixture should parse.");

		assert_eq!(body.token().as_deref(), Some("top"));
	}

	#[test]
	fn header_and_cookie_tokens_follow_priority() {
		let response = ControllerResponse::new(200, Vec::new())
			.with_header("X-Csrf-Token", "second")
			.with_header("Csrf-Token", "first");

		assert_eq!(header_token(&response, "Csrf-Token").as_deref(), Some("first"));

		let jar = CookieJar::parse_header("portal-csrf=late; csrf_token=early");

		assert_eq!(cookie_token(&jar).as_deref(), Some("early"));
	}

	#[test]
	fn rejection_mentions_the_controller_code() {
		let body: LoginBody =
			serde_json::from_str(r#"{"errorCode":-30109,"msg":"Invalid username or password"}"#)
				.expect("Fixture should parse.");

		assert_eq!(
			body.rejection(200),
			"operator login rejected with errorCode -30109 (Invalid username or password)"
		);
	}
}
