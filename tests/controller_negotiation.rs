// self
use portal_broker::{
	_preludet::*,
	controller::{AdmitRequest, AuthorizeVerdict, ControllerBroker},
	error::TransportError,
	http::ControllerResponse,
	model::{MacAddress, MacFormat, SiteId},
	store::{KvStore, MemoryStore},
};

const AUTHORIZE_SUFFIX: &str = "/extPortal/auth";
const WARM_UP_SUFFIX: &str = "/ctrl-test/hotspot/login";
const LOGIN_SUFFIX: &str = "/api/v2/hotspot/login";

fn broker(client: &ScriptedHttpClient) -> ControllerBroker<ScriptedHttpClient> {
	let store: Arc<dyn KvStore> = Arc::new(MemoryStore::default());

	build_test_broker(test_descriptor("http://controller.test"), client.clone(), store)
}

fn admit_request() -> AdmitRequest {
	AdmitRequest {
		client_mac: MacAddress::parse("aa:bb:cc:dd:ee:ff").expect("Client MAC fixture should parse."),
		ap_mac: Some(MacAddress::parse("11-22-33-44-55-66").expect("AP MAC fixture should parse.")),
		network_name: Some("W2G_Basic".into()),
		radio_id: 1,
		site_id: SiteId::new("site-a").expect("Site fixture should be valid."),
		duration: Duration::minutes(30),
	}
}

#[tokio::test]
async fn negotiation_stops_at_the_first_success() {
	let client = ScriptedHttpClient::default();

	client.push_handshake("csrf-1");

	for _ in 0..4 {
		client.push(authorize_response(-1001));
	}

	client.push(authorize_response(0));

	let broker = broker(&client);
	let outcome = broker.admit(&admit_request()).await.expect("Fifth candidate should admit.");

	assert_eq!(outcome.attempts.len(), 5);
	assert!(!outcome.reused_session);
	assert_eq!(client.requests_to(AUTHORIZE_SUFFIX).len(), 5);
	assert_eq!(client.remaining(), 0);

	let winner = outcome.winning_attempt().expect("Admission should have a winning attempt.");

	assert_eq!(winner.verdict, AuthorizeVerdict::Success);
	assert_eq!(winner.auth_type_code, 2);
	assert_eq!(winner.mac_format, MacFormat::HyphenUpper);
	assert_eq!(winner.endpoint_path, "/api/v2/hotspot/extPortal/auth");
	assert!(outcome.attempts[..4].iter().all(|a| a.verdict == AuthorizeVerdict::RetryableMismatch));

	let last = client.requests_to(AUTHORIZE_SUFFIX).pop().expect("Authorize call should be recorded.");
	let body = last.json_body().expect("Authorize body should be JSON.");

	assert_eq!(last.header("Csrf-Token"), Some("csrf-1"));
	assert_eq!(last.header("X-Requested-With"), Some("XMLHttpRequest"));
	assert_eq!(body["clientMac"], "AA-BB-CC-DD-EE-FF");
	assert_eq!(body["apMac"], "11-22-33-44-55-66");
	assert_eq!(body["ssidName"], "W2G_Basic");
	assert_eq!(body["radioId"], 1);
	assert_eq!(body["site"], "site-a");
	assert_eq!(body["authType"], 2);
	assert_eq!(body["time"], 1_800_000_000_i64);
	assert_eq!(broker.metrics.candidates(), 5);
	assert_eq!(broker.metrics.admitted(), 1);
}

#[tokio::test]
async fn redirect_status_counts_as_success() {
	let client = ScriptedHttpClient::default();

	client.push_handshake("csrf-1");
	client.push(ControllerResponse::new(302, Vec::new()).with_header("Location", "/portal/ok"));

	let outcome =
		broker(&client).admit(&admit_request()).await.expect("Redirect should admit the client.");

	assert_eq!(outcome.attempts.len(), 1);
	assert_eq!(outcome.attempts[0].http_status, Some(302));
}

#[tokio::test]
async fn hard_failures_abort_the_pass_and_trigger_one_relogin() {
	let client = ScriptedHttpClient::default();

	client.push_handshake("csrf-1");
	client.push(authorize_response(-1001));
	client.push(authorize_response(-1));
	client.push_handshake("csrf-2");
	client.push(authorize_response(0));

	let outcome =
		broker(&client).admit(&admit_request()).await.expect("Second pass should admit.");
	let passes: Vec<_> = outcome.attempts.iter().map(|a| (a.pass, a.verdict)).collect();

	assert_eq!(
		passes,
		vec![
			(1, AuthorizeVerdict::RetryableMismatch),
			(1, AuthorizeVerdict::HardFailure),
			(2, AuthorizeVerdict::Success),
		]
	);

	let authorize = client.requests_to(AUTHORIZE_SUFFIX);

	assert_eq!(authorize[1].header("Csrf-Token"), Some("csrf-1"));
	assert_eq!(authorize[2].header("Csrf-Token"), Some("csrf-2"));
	assert_eq!(client.requests_to(LOGIN_SUFFIX).len(), 2);
}

#[tokio::test]
async fn exhausted_passes_fail_with_every_attempt() {
	let client = ScriptedHttpClient::default();

	client.push_handshake("csrf-1");

	for _ in 0..12 {
		client.push(authorize_response(-1001));
	}

	client.push_handshake("csrf-2");
	client.push(authorize_response(-1));

	let broker = broker(&client);
	let err = broker.admit(&admit_request()).await.expect_err("Both passes should fail.");

	match &err {
		Error::ControllerAuthFailed { reason, attempts } => {
			assert_eq!(attempts.len(), 13);
			assert!(reason.contains("candidate 1 of 12"), "{reason}");
			assert!(reason.contains("all 12 request variants were rejected"), "{reason}");
		},
		other => panic!("Expected ControllerAuthFailed, got {other:?}."),
	}

	assert_eq!(err.kind().as_str(), "ControllerAuthFailed");
	assert_eq!(broker.metrics.failed(), 1);
}

#[tokio::test]
async fn transport_failures_during_authorize_are_hard_failures() {
	let client = ScriptedHttpClient::default();

	client.push_handshake("csrf-1");
	client.push_failure(TransportError::Timeout);
	client.push_handshake("csrf-2");
	client.push_failure(TransportError::Timeout);

	let err = broker(&client).admit(&admit_request()).await.expect_err("Admission should fail.");

	assert_eq!(err.attempts().len(), 2);
	assert!(err.attempts().iter().all(|a| a.http_status.is_none()));
}

#[tokio::test]
async fn cached_sessions_skip_the_login() {
	let client = ScriptedHttpClient::default();

	client.push_handshake("csrf-1");
	client.push(authorize_response(0));
	client.push(authorize_response(0));

	let broker = broker(&client);

	broker.admit(&admit_request()).await.expect("First admission should succeed.");

	let second = broker.admit(&admit_request()).await.expect("Second admission should succeed.");

	assert!(second.reused_session);
	assert_eq!(client.requests_to(WARM_UP_SUFFIX).len(), 1);
	assert_eq!(client.requests_to(LOGIN_SUFFIX).len(), 1);
	assert_eq!(broker.metrics.cache_hits(), 1);

	let reused = client.requests_to(AUTHORIZE_SUFFIX).pop().expect("Authorize call should exist.");

	assert_eq!(reused.header("Csrf-Token"), Some("csrf-1"));
	assert!(
		reused.header("Cookie").is_some_and(|c| c.contains("TPOMADA_SESSIONID=operator")),
		"Cached cookies should be replayed."
	);
}

#[tokio::test]
async fn handshake_requests_look_like_a_browser() {
	let client = ScriptedHttpClient::default();

	client.push_handshake("csrf-1");
	client.push(authorize_response(0));
	broker(&client).admit(&admit_request()).await.expect("Admission should succeed.");

	let warm_up = client.requests_to(WARM_UP_SUFFIX).pop().expect("Warm-up should be recorded.");
	let login = client.requests_to(LOGIN_SUFFIX).pop().expect("Login should be recorded.");

	assert_eq!(warm_up.header("Cache-Control"), Some("no-cache"));
	assert_eq!(warm_up.header("Pragma"), Some("no-cache"));
	assert_eq!(warm_up.header("Origin"), Some("http://controller.test"));
	assert!(warm_up.url.query_pairs().any(|(k, _)| k == "_"));
	assert_eq!(login.header("Cookie"), Some("TPOMADA_SESSIONID=warm"));

	let credentials = login.json_body().expect("Login body should be JSON.");

	assert_eq!(credentials["name"], TEST_OPERATOR);
	assert_eq!(credentials["password"], TEST_PASSWORD);
}

#[tokio::test]
async fn csrf_token_falls_back_to_headers_then_cookies() {
	let client = ScriptedHttpClient::default();

	client.push(warm_up_response());
	client.push(
		json_response(200, &serde_json::json!({ "errorCode": 0 }))
			.with_header("X-Csrf-Token", "from-header"),
	);
	client.push(authorize_response(0));
	broker(&client).admit(&admit_request()).await.expect("Header token should be used.");

	assert_eq!(
		client.requests_to(AUTHORIZE_SUFFIX)[0].header("Csrf-Token"),
		Some("from-header")
	);

	let client = ScriptedHttpClient::default();

	client.push(warm_up_response());
	client.push(
		json_response(200, &serde_json::json!({ "errorCode": 0 }))
			.with_header("Set-Cookie", "csrf_token=from-cookie; Path=/"),
	);
	client.push(authorize_response(0));
	broker(&client).admit(&admit_request()).await.expect("Cookie token should be used.");

	assert_eq!(
		client.requests_to(AUTHORIZE_SUFFIX)[0].header("Csrf-Token"),
		Some("from-cookie")
	);
}

#[tokio::test]
async fn transient_login_failures_are_retried() {
	let client = ScriptedHttpClient::default();

	client.push(ControllerResponse::new(503, b"busy".to_vec()));
	client.push(warm_up_response());
	client.push(ControllerResponse::new(200, b"<html>maintenance</html>".to_vec()));
	client.push_handshake("csrf-3");
	client.push(authorize_response(0));

	let broker = broker(&client);

	broker.admit(&admit_request()).await.expect("Third login attempt should succeed.");

	assert_eq!(broker.metrics.logins(), 3);
	assert_eq!(client.requests_to(AUTHORIZE_SUFFIX)[0].header("Csrf-Token"), Some("csrf-3"));
}

#[tokio::test]
async fn login_gives_up_after_the_attempt_budget() {
	let client = ScriptedHttpClient::default();

	for _ in 0..3 {
		client.push(ControllerResponse::new(502, b"bad gateway".to_vec()));
	}

	let err = broker(&client).admit(&admit_request()).await.expect_err("Login should fail.");

	match err {
		Error::ControllerLoginFailed { reason, attempts } => {
			assert!(reason.contains("after 3 attempts"), "{reason}");
			assert!(attempts.is_empty());
		},
		other => panic!("Expected ControllerLoginFailed, got {other:?}."),
	}

	assert!(client.requests_to(AUTHORIZE_SUFFIX).is_empty());
}

#[tokio::test]
async fn rejected_credentials_are_not_retried() {
	let client = ScriptedHttpClient::default();

	client.push(warm_up_response());
	client.push(json_response(
		200,
		&serde_json::json!({ "errorCode": -30109, "msg": "Invalid username or password" }),
	));

	let broker = broker(&client);
	let err = broker.admit(&admit_request()).await.expect_err("Login should be rejected.");

	assert!(matches!(err, Error::ControllerLoginFailed { .. }));
	assert!(err.to_string().contains("-30109"));
	assert_eq!(broker.metrics.logins(), 1);
	assert_eq!(client.requests().len(), 2);
}
