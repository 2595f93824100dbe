#![cfg(feature = "reqwest")]

// crates.io
use httpmock::prelude::*;
// self
use portal_broker::{
	_preludet::*,
	controller::{
		AdmitRequest, AuthorizeVerdict, ControllerStrategy, DefaultControllerStrategy,
		ReqwestControllerBroker, RetryPolicy,
	},
	model::{MacAddress, SiteId},
	store::{KvStore, MemoryStore},
};

fn reqwest_broker(server: &MockServer, timeout: std::time::Duration) -> ReqwestControllerBroker {
	let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());
	let strategy: Arc<dyn ControllerStrategy> = Arc::new(DefaultControllerStrategy::default());

	ReqwestControllerBroker::new(store, test_descriptor(&server.base_url()), strategy, timeout)
		.expect("Reqwest broker should build.")
		.with_retry_policy(RetryPolicy::immediate(3))
}

fn admit_request() -> AdmitRequest {
	AdmitRequest {
		client_mac: MacAddress::parse("AA:BB:CC:DD:EE:FF").expect("Client MAC fixture should parse."),
		ap_mac: None,
		network_name: None,
		radio_id: 0,
		site_id: SiteId::new("site-a").expect("Site fixture should be valid."),
		duration: Duration::minutes(15),
	}
}

#[tokio::test]
async fn reqwest_transport_negotiates_across_endpoint_paths() {
	let server = MockServer::start_async().await;
	let warm_up = server
		.mock_async(|when, then| {
			when.method(GET).path("/ctrl-test/hotspot/login").query_param_exists("_");
			then.status(200)
				.header("Set-Cookie", "TPOMADA_SESSIONID=warm; Path=/; HttpOnly")
				.body("<html></html>");
		})
		.await;
	let login = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/ctrl-test/api/v2/hotspot/login")
				.header("Cookie", "TPOMADA_SESSIONID=warm")
				.header("X-Requested-With", "XMLHttpRequest");
			then.status(200)
				.header("content-type", "application/json")
				.body("{\"errorCode\":0,\"result\":{\"token\":\"csrf-live\"}}");
		})
		.await;
	let hotspot_auth = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/ctrl-test/api/v2/hotspot/extPortal/auth")
				.header("Csrf-Token", "csrf-live");
			then.status(404).body("<html>Not Found</html>");
		})
		.await;
	let portal_auth = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/ctrl-test/api/v2/portal/extPortal/auth")
				.header("Csrf-Token", "csrf-live");
			then.status(302).header("Location", "/ctrl-test/portal/success");
		})
		.await;
	let broker = reqwest_broker(&server, std::time::Duration::from_secs(5));
	let outcome = broker.admit(&admit_request()).await.expect("Second path should admit.");

	warm_up.assert_calls_async(1).await;
	login.assert_calls_async(1).await;
	hotspot_auth.assert_calls_async(6).await;
	portal_auth.assert_calls_async(1).await;

	assert_eq!(outcome.attempts.len(), 7);
	assert_eq!(outcome.attempts[5].verdict, AuthorizeVerdict::RetryableMismatch);
	assert_eq!(outcome.attempts[5].http_status, Some(404));
	assert_eq!(outcome.attempts[6].http_status, Some(302));
	assert_eq!(outcome.attempts[6].endpoint_path, "/api/v2/portal/extPortal/auth");
}

#[tokio::test]
async fn slow_controllers_exhaust_the_login_budget() {
	let server = MockServer::start_async().await;
	let warm_up = server
		.mock_async(|when, then| {
			when.method(GET).path("/ctrl-test/hotspot/login");
			then.status(200).delay(std::time::Duration::from_secs(2));
		})
		.await;
	let broker = reqwest_broker(&server, std::time::Duration::from_millis(200));
	let err = broker.admit(&admit_request()).await.expect_err("Login should time out.");

	warm_up.assert_calls_async(3).await;

	match err {
		Error::ControllerLoginFailed { reason, .. } => {
			assert!(reason.contains("timed out"), "{reason}");
			assert!(reason.contains("after 3 attempts"), "{reason}");
		},
		other => panic!("Expected ControllerLoginFailed, got {other:?}."),
	}
}
