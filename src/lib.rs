//! Captive-portal access broker: decide whether a Wi-Fi client may come online right now, price
//! the session against a once-per-day credit ledger, and drive the network controller's
//! login/authorize handshake until the client is admitted.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod ledger;
pub mod membership;
pub mod model;
pub mod obs;
pub mod orchestrator;
pub mod policy;
#[cfg(feature = "server")] pub mod server;
pub mod store;

#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// self
	use crate::{
		controller::{ControllerBroker, ControllerDescriptor, DefaultControllerStrategy, RetryPolicy},
		http::{ControllerHttpClient, ControllerRequest, ControllerResponse, HttpFuture},
		ledger::{CreditLedger, LedgerSettings},
		membership::{EntitlementRules, Membership, MemoryDirectory},
		model::{ControllerId, MemberEmail, MemberId},
		orchestrator::Orchestrator,
		policy::AccessPolicy,
		store::{KvStore, MemoryStore},
	};

	/// Operator name used by [`test_descriptor`].
	pub const TEST_OPERATOR: &str = "operator";
	/// Operator password used by [`test_descriptor`].
	pub const TEST_PASSWORD: &str = "operator-pass";
	/// Controller identifier used by [`test_descriptor`].
	pub const TEST_CONTROLLER: &str = "ctrl-test";

	/// Transport that replays queued responses in order and records every request it saw.
	///
	/// An exhausted queue answers with a 599 so a test that under-scripts fails loudly instead
	/// of hanging.
	#[derive(Clone, Default)]
	pub struct ScriptedHttpClient {
		responses: Arc<Mutex<VecDeque<Result<ControllerResponse, crate::error::TransportError>>>>,
		requests: Arc<Mutex<Vec<ControllerRequest>>>,
	}
	impl ScriptedHttpClient {
		/// Queues a response.
		pub fn push(&self, response: ControllerResponse) -> &Self {
			self.responses.lock().push_back(Ok(response));

			self
		}

		/// Queues a transport failure.
		pub fn push_failure(&self, error: crate::error::TransportError) -> &Self {
			self.responses.lock().push_back(Err(error));

			self
		}

		/// Queues the warm-up and a successful operator login carrying `token` in the body.
		pub fn push_handshake(&self, token: &str) -> &Self {
			self.push(warm_up_response());
			self.push(login_response(token))
		}

		/// Returns a snapshot of the recorded requests.
		pub fn requests(&self) -> Vec<ControllerRequest> {
			self.requests.lock().clone()
		}

		/// Returns the recorded requests whose URL path ends with `suffix`.
		pub fn requests_to(&self, suffix: &str) -> Vec<ControllerRequest> {
			self.requests().into_iter().filter(|r| r.url.path().ends_with(suffix)).collect()
		}

		/// Number of responses still queued.
		pub fn remaining(&self) -> usize {
			self.responses.lock().len()
		}
	}
	impl ControllerHttpClient for ScriptedHttpClient {
		fn execute(&self, request: ControllerRequest) -> HttpFuture<'_> {
			self.requests.lock().push(request);

			let next = self.responses.lock().pop_front();

			Box::pin(async move {
				next.unwrap_or_else(|| Ok(ControllerResponse::new(599, b"script exhausted".to_vec())))
			})
		}
	}

	/// Empty 200 response that sets a baseline cookie, as the hotspot login page does.
	pub fn warm_up_response() -> ControllerResponse {
		ControllerResponse::new(200, b"<html></html>".to_vec())
			.with_header("Set-Cookie", "TPOMADA_SESSIONID=warm; Path=/; HttpOnly")
	}

	/// Operator login response carrying `token` under `result.token`.
	pub fn login_response(token: &str) -> ControllerResponse {
		json_response(200, &serde_json::json!({ "errorCode": 0, "result": { "token": token } }))
			.with_header("Set-Cookie", "TPOMADA_SESSIONID=operator; Path=/; HttpOnly")
	}

	/// Authorize response with the given application-level code.
	pub fn authorize_response(error_code: i64) -> ControllerResponse {
		json_response(200, &serde_json::json!({ "errorCode": error_code, "msg": "scripted" }))
	}

	/// JSON response with the given status.
	pub fn json_response(status: u16, body: &serde_json::Value) -> ControllerResponse {
		ControllerResponse::new(status, body.to_string().into_bytes())
			.with_header("Content-Type", "application/json")
	}

	/// Descriptor pointing at `base_url` with the default 12-candidate matrix and no backoff.
	pub fn test_descriptor(base_url: &str) -> ControllerDescriptor {
		let id = ControllerId::new(TEST_CONTROLLER).expect("Controller fixture should be valid.");
		let base = Url::parse(base_url).expect("Controller base URL fixture should parse.");

		ControllerDescriptor::builder(id)
			.base_url(base)
			.operator(TEST_OPERATOR, TEST_PASSWORD)
			.build()
			.expect("Controller descriptor fixture should build.")
	}

	/// Broker over the scripted transport and an in-memory session cache.
	pub fn build_test_broker(
		descriptor: ControllerDescriptor,
		client: ScriptedHttpClient,
		store: Arc<dyn KvStore>,
	) -> ControllerBroker<ScriptedHttpClient> {
		ControllerBroker::with_http_client(
			store,
			descriptor,
			Arc::new(DefaultControllerStrategy::default()),
			client,
		)
		.with_retry_policy(RetryPolicy::immediate(3))
	}

	/// Membership fixture with only the basic tier.
	pub fn basic_member(id: &str, email: &str) -> Membership {
		Membership {
			member_id: MemberId::new(id).expect("Member fixture should be valid."),
			email: MemberEmail::new(email).expect("Email fixture should be valid."),
			has_basic: true,
			has_standard: false,
			has_premium: false,
		}
	}

	/// Orchestrator wired to in-memory collaborators and the scripted transport.
	pub fn build_test_orchestrator(
		client: ScriptedHttpClient,
		members: Vec<Membership>,
	) -> (Orchestrator<ScriptedHttpClient>, Arc<MemoryStore>) {
		let store_backend = Arc::new(MemoryStore::default());
		let store: Arc<dyn KvStore> = store_backend.clone();
		let directory = MemoryDirectory::default();

		for member in members {
			directory.insert(member);
		}

		let broker =
			build_test_broker(test_descriptor("http://controller.test"), client, store.clone());
		let ledger = CreditLedger::new(store, LedgerSettings::default());
		let orchestrator = Orchestrator::new(
			Arc::new(directory),
			EntitlementRules::default(),
			AccessPolicy::default(),
			ledger,
			broker,
		);

		(orchestrator, store_backend)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, figment as _, httpmock as _};
#[cfg(feature = "server")] use color_eyre as _;
