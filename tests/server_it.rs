#![cfg(feature = "server")]

// std
use std::{future::IntoFuture, net::SocketAddr};
// crates.io
use tokio::net::TcpListener;
// self
use portal_broker::{_preludet::*, reqwest, server};

async fn spawn_server() -> SocketAddr {
	let (orchestrator, _store) = build_test_orchestrator(
		ScriptedHttpClient::default(),
		vec![basic_member("m-1", "member@example.com")],
	);
	let listener =
		TcpListener::bind("127.0.0.1:0").await.expect("Test listener should bind to a free port.");
	let addr = listener.local_addr().expect("Bound listener should have an address.");

	tokio::spawn(axum::serve(listener, server::router(Arc::new(orchestrator))).into_future());

	addr
}

async fn read_json(response: reqwest::Response) -> (u16, serde_json::Value) {
	let status = response.status().as_u16();
	let bytes = response.bytes().await.expect("Response body should be readable.");
	let body = serde_json::from_slice(&bytes).expect("Response body should be JSON.");

	(status, body)
}

#[tokio::test]
async fn health_reports_ok() {
	let addr = spawn_server().await;
	let response = reqwest::Client::new()
		.get(format!("http://{addr}/health"))
		.send()
		.await
		.expect("Health request should complete.");
	let (status, body) = read_json(response).await;

	assert_eq!(status, 200);
	assert_eq!(body, serde_json::json!({ "ok": true }));
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
	let addr = spawn_server().await;
	let response = reqwest::Client::new()
		.post(format!("http://{addr}/api/authorize"))
		.header("Content-Type", "application/json")
		.body("{\"clientMac\":")
		.send()
		.await
		.expect("Authorize request should complete.");
	let (status, body) = read_json(response).await;

	assert_eq!(status, 400);
	assert_eq!(body["ok"], false);
	assert_eq!(body["error"]["code"], "ValidationError");
	assert!(body["requestId"].as_str().is_some_and(|id| !id.is_empty()));
}

#[tokio::test]
async fn json_requests_report_the_missing_field() {
	let addr = spawn_server().await;
	let response = reqwest::Client::new()
		.post(format!("http://{addr}/api/authorize"))
		.header("Content-Type", "application/json")
		.body(r#"{"clientMac":"AA:BB:CC:DD:EE:FF","site":"site-a"}"#)
		.send()
		.await
		.expect("Authorize request should complete.");
	let (status, body) = read_json(response).await;

	assert_eq!(status, 400);
	assert!(
		body["error"]["message"].as_str().is_some_and(|m| m.contains("email")),
		"Unexpected body: {body}."
	);
}

#[tokio::test]
async fn form_submissions_merge_the_query_string() {
	let addr = spawn_server().await;
	let response = reqwest::Client::new()
		.post(format!("http://{addr}/api/submit_email?clientMac=AA-BB-CC-DD-EE-FF&site=site-a"))
		.header("Content-Type", "application/x-www-form-urlencoded")
		.body("email=stranger%40example.com&ssidName=W2G_Basic")
		.send()
		.await
		.expect("Form submission should complete.");
	let (status, body) = read_json(response).await;

	// Validation passed on merged fields; the lookup is what rejected it.
	assert_eq!(status, 403);
	assert_eq!(body["error"]["code"], "MembershipNotFound");
}

#[tokio::test]
async fn json_submissions_are_accepted() {
	let addr = spawn_server().await;
	let response = reqwest::Client::new()
		.post(format!("http://{addr}/api/submit_email"))
		.header("Content-Type", "application/json")
		.body(r#"{"email":"stranger@example.com","clientMac":"AA:BB:CC:DD:EE:FF","site":"site-a"}"#)
		.send()
		.await
		.expect("JSON submission should complete.");
	let (status, body) = read_json(response).await;

	assert_eq!(status, 403, "Unexpected body: {body}.");
	assert_eq!(body["error"]["code"], "MembershipNotFound");
}

#[tokio::test]
async fn referer_query_fills_the_remaining_gaps() {
	let addr = spawn_server().await;
	let response = reqwest::Client::new()
		.post(format!("http://{addr}/api/submit_email"))
		.header("Content-Type", "application/x-www-form-urlencoded")
		.header("Referer", "http://portal.test/splash?clientMac=AA-BB-CC-DD-EE-FF&site=site-a")
		.body("email=stranger%40example.com")
		.send()
		.await
		.expect("Form submission should complete.");
	let (status, body) = read_json(response).await;

	assert_eq!(status, 403, "Unexpected body: {body}.");
	assert_eq!(body["error"]["code"], "MembershipNotFound");
}

#[tokio::test]
async fn submission_bodies_win_over_the_referer() {
	let addr = spawn_server().await;
	let response = reqwest::Client::new()
		.post(format!("http://{addr}/api/submit_email"))
		.header("Content-Type", "application/x-www-form-urlencoded")
		.header("Referer", "http://portal.test/splash?clientMac=AA-BB-CC-DD-EE-FF&site=site-a")
		.body("email=stranger%40example.com&clientMac=not-a-mac")
		.send()
		.await
		.expect("Form submission should complete.");
	let (status, body) = read_json(response).await;

	assert_eq!(status, 400);
	assert!(
		body["error"]["message"].as_str().is_some_and(|m| m.contains("clientMac")),
		"Unexpected body: {body}."
	);
}
