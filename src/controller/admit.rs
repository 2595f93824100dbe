//! Client admission: reuse or obtain a session, then walk the variant matrix.
//!
//! A pass stops at the first candidate classified [`AuthorizeVerdict::Success`], moves on after
//! [`AuthorizeVerdict::RetryableMismatch`], and ends early on [`AuthorizeVerdict::HardFailure`].
//! A failed first pass is followed by one fresh login and a second pass; the authorize call itself
//! is never retried outside the matrix.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	controller::{
		AuthorizeCandidate, AuthorizeContext, AuthorizeVerdict, ControllerBroker, ControllerSession,
	},
	http::{ControllerHttpClient, HttpMethod},
	model::{MacAddress, MacFormat, SiteId},
	obs::{self, FlowKind, FlowOutcome, FlowSpan, log_event},
};

/// Client to admit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmitRequest {
	/// Client hardware address.
	pub client_mac: MacAddress,
	/// Access-point hardware address, when the splash page supplied one.
	pub ap_mac: Option<MacAddress>,
	/// Network (SSID) name.
	pub network_name: Option<String>,
	/// Radio identifier; `0` when unknown.
	pub radio_id: u32,
	/// Controller site.
	pub site_id: SiteId,
	/// Session length granted to the client.
	pub duration: Duration,
}

/// Diagnostic record for one authorize candidate.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationAttempt {
	/// Address rendering sent.
	pub mac_format: MacFormat,
	/// `authType` sent.
	pub auth_type_code: u8,
	/// Authorize path used.
	pub endpoint_path: String,
	/// HTTP status, absent on transport failure.
	pub http_status: Option<u16>,
	/// Controller `errorCode`, when the body carried one.
	pub controller_error_code: Option<i64>,
	/// Classification of the response.
	pub verdict: AuthorizeVerdict,
	/// Negotiation pass (1 or 2).
	pub pass: u8,
}

/// Successful admission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmitOutcome {
	/// Every candidate tried, in order; the last one succeeded.
	pub attempts: Vec<AuthorizationAttempt>,
	/// Whether the winning pass used the cached session.
	pub reused_session: bool,
}
impl AdmitOutcome {
	/// Candidate that admitted the client.
	pub fn winning_attempt(&self) -> Option<&AuthorizationAttempt> {
		self.attempts.last()
	}
}

enum PassOutcome {
	Admitted,
	Failed(String),
}

impl<C> ControllerBroker<C>
where
	C: ?Sized + ControllerHttpClient,
{
	/// Admits `request.client_mac` for `request.duration`.
	///
	/// Failures carry every attempted candidate: [`Error::ControllerLoginFailed`] when no CSRF
	/// token could be obtained, [`Error::ControllerAuthFailed`] when both passes failed.
	pub async fn admit(&self, request: &AdmitRequest) -> Result<AdmitOutcome> {
		const KIND: FlowKind = FlowKind::Admit;

		let span = FlowSpan::new(KIND, "admit");

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result: Result<AdmitOutcome> = span
			.instrument(async move {
				self.metrics.record_admission();

				let mut attempts = Vec::new();
				let cached = self.cached_session(OffsetDateTime::now_utc()).await;
				let reused_session = cached.is_some();
				let session = match cached {
					Some(session) => {
						self.metrics.record_cache_hit();
						log_event!(debug, "Reusing cached controller session.");

						session
					},
					None => {
						log_event!(debug, "No cached controller session; logging in.");

						self.fresh_session(&attempts).await?
					},
				};
				let first_failure = match self.negotiate(&session, request, 1, &mut attempts).await? {
					PassOutcome::Admitted => return Ok(AdmitOutcome { attempts, reused_session }),
					PassOutcome::Failed(reason) => reason,
				};

				log_event!(
					warn,
					reason = %first_failure,
					"First negotiation pass failed; logging in again."
				);

				let session = self.fresh_session(&attempts).await?;

				match self.negotiate(&session, request, 2, &mut attempts).await? {
					PassOutcome::Admitted => Ok(AdmitOutcome { attempts, reused_session: false }),
					PassOutcome::Failed(reason) => Err(Error::ControllerAuthFailed {
						reason: format!("{reason}; first pass: {first_failure}"),
						attempts,
					}),
				}
			})
			.await;

		match &result {
			Ok(_) => self.metrics.record_admitted(),
			Err(_) => self.metrics.record_failed(),
		}

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		result
	}

	async fn fresh_session(&self, attempts: &[AuthorizationAttempt]) -> Result<ControllerSession> {
		match self.login().await {
			Ok(session) => {
				self.cache_session(&session).await;

				Ok(session)
			},
			Err(Error::ControllerLoginFailed { reason, .. }) =>
				Err(Error::ControllerLoginFailed { reason, attempts: attempts.to_vec() }),
			Err(e) => Err(e),
		}
	}

	async fn negotiate(
		&self,
		session: &ControllerSession,
		request: &AdmitRequest,
		pass: u8,
		attempts: &mut Vec<AuthorizationAttempt>,
	) -> Result<PassOutcome> {
		let descriptor = &self.descriptor;
		let total = descriptor.matrix.len();
		let referer = descriptor.warm_up_url()?;
		let mut jar = session.jar();

		for (index, candidate) in descriptor.matrix.candidates().enumerate() {
			let call = self
				.browser_request(
					HttpMethod::Post,
					descriptor.endpoint(candidate.endpoint_path)?,
					&referer,
					&jar,
					OffsetDateTime::now_utc(),
				)
				.with_header("X-Requested-With", "XMLHttpRequest")
				.with_header(descriptor.quirks.csrf_header.as_str(), session.csrf_token.expose())
				.with_json(&self.authorize_body(&candidate, request));

			self.metrics.record_candidate();

			let ctx = match self.http_client.execute(call).await {
				Ok(response) => {
					jar.absorb(&response);

					AuthorizeContext::from_response(&response)
				},
				Err(e) => AuthorizeContext::network_failure().with_message(e.to_string()),
			};
			let verdict = self.strategy.classify_authorize(&ctx);

			obs::record_authorize_attempt(verdict.as_str());
			log_event!(
				info,
				pass,
				candidate = index + 1,
				path = candidate.endpoint_path,
				auth_type = candidate.auth_type,
				mac_format = candidate.mac_format.as_str(),
				status = ?ctx.http_status,
				error_code = ?ctx.error_code,
				verdict = verdict.as_str(),
				"Authorize candidate answered."
			);
			attempts.push(AuthorizationAttempt {
				mac_format: candidate.mac_format,
				auth_type_code: candidate.auth_type,
				endpoint_path: candidate.endpoint_path.to_owned(),
				http_status: ctx.http_status,
				controller_error_code: ctx.error_code,
				verdict,
				pass,
			});

			match verdict {
				AuthorizeVerdict::Success => return Ok(PassOutcome::Admitted),
				AuthorizeVerdict::RetryableMismatch => continue,
				AuthorizeVerdict::HardFailure =>
					return Ok(PassOutcome::Failed(format!(
						"candidate {} of {total} failed with {}",
						index + 1,
						ctx.describe()
					))),
			}
		}

		Ok(PassOutcome::Failed(format!("all {total} request variants were rejected")))
	}

	fn authorize_body(&self, candidate: &AuthorizeCandidate<'_>, request: &AdmitRequest) -> Value {
		let mut body = Map::new();
		let micros = i64::try_from(request.duration.whole_microseconds()).unwrap_or(i64::MAX);

		body.insert("clientMac".into(), request.client_mac.render(candidate.mac_format).into());

		if let Some(ap_mac) = &request.ap_mac {
			body.insert("apMac".into(), ap_mac.render(candidate.mac_format).into());
		}
		if let Some(network) = &request.network_name {
			body.insert("ssidName".into(), network.as_str().into());
		}

		body.insert("radioId".into(), request.radio_id.into());
		body.insert("site".into(), request.site_id.as_str().into());
		body.insert("time".into(), micros.into());
		body.insert("authType".into(), candidate.auth_type.into());

		self.strategy.augment_authorize_body(candidate, &mut body);

		Value::Object(body)
	}
}
