//! Orchestrator: one authorization request in, one [`AuthorizeResponse`] out.
//!
//! The sequence is fixed: validate, look up the membership, check entitlement, ask the access
//! policy, check the balance, admit the client at the controller, then debit and audit. Charges
//! are only applied after the controller confirmed the admission, so a failed request never
//! costs the member anything.

pub mod request;
pub mod response;

pub use request::*;
pub use response::*;

// crates.io
use rand::{Rng, distr::Alphanumeric};
// self
use crate::{
	_prelude::*,
	controller::{AdmitOutcome, AdmitRequest, ControllerBroker},
	http::ControllerHttpClient,
	ledger::{AuditEvent, ChargeOutcome, CreditLedger, DateKey},
	membership::{EntitlementRules, MembershipDirectory},
	model::MemberId,
	obs::{self, FlowKind, FlowOutcome, FlowSpan, log_event},
	policy::{AccessDecision, AccessPolicy},
};

const REQUEST_ID_LEN: usize = 12;

/// Sequences the membership directory, access policy, credit ledger, and controller broker.
#[derive(Clone)]
pub struct Orchestrator<C>
where
	C: ?Sized + ControllerHttpClient,
{
	directory: Arc<dyn MembershipDirectory>,
	rules: EntitlementRules,
	policy: AccessPolicy,
	ledger: CreditLedger,
	broker: ControllerBroker<C>,
}
impl<C> Orchestrator<C>
where
	C: ?Sized + ControllerHttpClient,
{
	/// Wires the collaborators together.
	pub fn new(
		directory: Arc<dyn MembershipDirectory>,
		rules: EntitlementRules,
		policy: AccessPolicy,
		ledger: CreditLedger,
		broker: ControllerBroker<C>,
	) -> Self {
		Self { directory, rules, policy, ledger, broker }
	}

	/// Access policy in effect.
	pub fn policy(&self) -> &AccessPolicy {
		&self.policy
	}

	/// Credit ledger.
	pub fn ledger(&self) -> &CreditLedger {
		&self.ledger
	}

	/// Controller broker.
	pub fn broker(&self) -> &ControllerBroker<C> {
		&self.broker
	}

	/// Authorizes `request` at the current time.
	pub async fn authorize(&self, request: AuthorizeRequest) -> AuthorizeResponse {
		self.authorize_at(request, OffsetDateTime::now_utc()).await
	}

	/// Authorizes `request` as if it arrived at `now`.
	///
	/// Every failure is mapped into the response; nothing is returned as an `Err`.
	pub async fn authorize_at(
		&self,
		request: AuthorizeRequest,
		now: OffsetDateTime,
	) -> AuthorizeResponse {
		const KIND: FlowKind = FlowKind::Authorize;

		let request_id = new_request_id();
		let span = FlowSpan::new(KIND, "authorize").with_request_id(&request_id);

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);

		let result = span.instrument(self.run(&request_id, request, now)).await;

		obs::record_flow_outcome(KIND, FlowOutcome::of(&result));

		match result {
			Ok(response) => response,
			Err(e) => {
				log_event!(
					warn,
					request_id = %request_id,
					code = e.kind().as_str(),
					error = %e,
					"Authorization failed."
				);

				AuthorizeResponse::failure(request_id, &e)
			},
		}
	}

	async fn run(
		&self,
		request_id: &str,
		request: AuthorizeRequest,
		now: OffsetDateTime,
	) -> Result<AuthorizeResponse> {
		let request = request.validate()?;

		log_event!(
			info,
			request_id,
			email = %request.email.fingerprint(),
			client = %request.client_mac.fingerprint(),
			extend = request.extend,
			"Authorization request received."
		);

		let membership = match self.directory.lookup(&request.email).await {
			Ok(Some(membership)) => membership,
			Ok(None) => return Err(Error::MembershipNotFound),
			Err(e @ Error::Internal { .. }) => return Err(e),
			Err(e) => return Err(Error::internal(e)),
		};
		let network = request.network_name.as_deref().unwrap_or_default();

		if !self.rules.is_entitled(&membership, network) {
			return Err(Error::PlanNotEntitled { network: network.to_owned() });
		}

		let decision = self.policy.plan(now, request.extend);

		if !decision.allowed {
			return Err(Error::PolicyDenied {
				phase: decision.phase,
				reason: decision.deny_reason.unwrap_or_default(),
			});
		}

		let date = DateKey::new(self.policy.local_date(now));
		let member = &membership.member_id;
		let entry = self.ledger.get_or_init(date.cycle(), member, now).await?;
		let debits = self.ledger.debit_record(date, member).await?;
		let required_cents: i64 =
			debits.outstanding(&decision.charges).iter().map(|c| c.amount_cents).sum();

		// Charges already taken today cost nothing, even on an overdrawn entry.
		if required_cents > 0 && !self.ledger.has_sufficient_balance(&entry, required_cents) {
			return Err(Error::InsufficientCredits {
				required_cents,
				remaining_cents: entry.remaining_cents,
			});
		}

		let admitted = self
			.broker
			.admit(&AdmitRequest {
				client_mac: request.client_mac,
				ap_mac: request.ap_mac,
				network_name: request.network_name.clone(),
				radio_id: request.radio_id,
				site_id: request.site_id.clone(),
				duration: decision.session_duration,
			})
			.await?;
		let mut charges = Vec::with_capacity(decision.charges.len());

		for charge in &decision.charges {
			charges.push(self.ledger.apply_charge_if_absent(date, member, charge, now).await?);
		}

		self.audit(request_id, &request, &membership.member_id, &decision, &charges, now).await;

		Ok(success(request_id, request, &decision, charges, admitted, now))
	}

	async fn audit(
		&self,
		request_id: &str,
		request: &ValidatedRequest,
		member: &MemberId,
		decision: &AccessDecision,
		charges: &[ChargeOutcome],
		now: OffsetDateTime,
	) {
		let (applied, skipped): (Vec<&ChargeOutcome>, Vec<&ChargeOutcome>) =
			charges.iter().partition(|c| c.applied);
		let event = AuditEvent {
			at: now,
			request_id: request_id.to_owned(),
			member_id: member.clone(),
			email_tag: request.email.fingerprint(),
			client_tag: request.client_mac.fingerprint(),
			network: request.network_name.clone(),
			phase: decision.phase,
			session_duration_ms: decision.session_duration_ms(),
			applied: applied.into_iter().map(|c| c.code).collect(),
			skipped: skipped.into_iter().map(|c| c.code).collect(),
		};
		let cycle = DateKey::new(self.policy.local_date(now)).cycle();

		if let Err(e) = self.ledger.record_audit(cycle, &event).await {
			log_event!(error, request_id, error = %e, "Audit event could not be recorded.");
		}
	}
}
impl<C> Debug for Orchestrator<C>
where
	C: ?Sized + ControllerHttpClient,
{
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("Orchestrator")
			.field("policy", &self.policy)
			.field("rules", &self.rules)
			.field("broker", &self.broker)
			.finish_non_exhaustive()
	}
}

fn success(
	request_id: &str,
	request: ValidatedRequest,
	decision: &AccessDecision,
	charges: Vec<ChargeOutcome>,
	admitted: AdmitOutcome,
	now: OffsetDateTime,
) -> AuthorizeResponse {
	AuthorizeResponse {
		ok: true,
		request_id: request_id.to_owned(),
		redirect_url: Some(request.redirect_url),
		session_cutoff: Some(decision.cutoff(now)),
		extension_applied: request.extend,
		phase: Some(decision.phase),
		session_duration_ms: Some(decision.session_duration_ms()),
		charges,
		error: None,
		attempts: admitted.attempts,
	}
}

/// Short random id correlating one request's log lines and response.
pub fn new_request_id() -> String {
	rand::rng().sample_iter(Alphanumeric).take(REQUEST_ID_LEN).map(char::from).collect()
}
