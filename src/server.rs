//! HTTP surface for the splash page.
//!
//! - `POST /api/authorize` takes a JSON [`AuthorizeRequest`].
//! - `POST /api/submit_email` takes a splash-page submission as JSON or a form. Fields missing
//!   from the body are read from the query string, then from the query of the `Referer` page.
//! - `GET /health` answers `{"ok": true}`.
//!
//! Every authorization answer is an [`AuthorizeResponse`] sent with the status its error maps to.

// std
use std::{borrow::Cow, net::SocketAddr};
// crates.io
use axum::{
	Json, Router,
	body::Bytes,
	extract::{
		Query, State,
		rejection::{JsonRejection, QueryRejection},
	},
	http::{
		HeaderMap, StatusCode,
		header::{CONTENT_TYPE, REFERER},
	},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde_json::Value;
use url::form_urlencoded;
use tokio::net::TcpListener;
// self
use crate::{
	_prelude::*,
	http::ControllerHttpClient,
	obs::log_event,
	orchestrator::{self, AuthorizeRequest, AuthorizeResponse, Orchestrator},
};

/// Builds the router over a shared orchestrator.
pub fn router<C>(orchestrator: Arc<Orchestrator<C>>) -> Router
where
	C: ControllerHttpClient,
{
	Router::new()
		.route("/api/authorize", post(authorize::<C>))
		.route("/api/submit_email", post(submit_email::<C>))
		.route("/health", get(health))
		.with_state(orchestrator)
}

/// Serves [`router`] on `bind` until Ctrl-C.
pub async fn serve<C>(bind: SocketAddr, orchestrator: Arc<Orchestrator<C>>) -> std::io::Result<()>
where
	C: ControllerHttpClient,
{
	let listener = TcpListener::bind(bind).await?;

	log_event!(info, addr = %listener.local_addr()?, "Portal broker listening.");

	axum::serve(listener, router(orchestrator))
		.with_graceful_shutdown(async {
			if tokio::signal::ctrl_c().await.is_err() {
				std::future::pending::<()>().await;
			}
		})
		.await
}

async fn authorize<C>(
	State(orchestrator): State<Arc<Orchestrator<C>>>,
	payload: Result<Json<AuthorizeRequest>, JsonRejection>,
) -> Response
where
	C: ControllerHttpClient,
{
	match payload {
		Ok(Json(request)) => respond(orchestrator.authorize(request).await),
		Err(rejection) => reject(rejection.body_text()),
	}
}

async fn submit_email<C>(
	State(orchestrator): State<Arc<Orchestrator<C>>>,
	headers: HeaderMap,
	query: Result<Query<AuthorizeRequest>, QueryRejection>,
	body: Bytes,
) -> Response
where
	C: ControllerHttpClient,
{
	let body = match decode_submission(&headers, &body) {
		Ok(body) => body,
		Err(reason) => return reject(reason),
	};
	let query = query.map(|Query(q)| q).unwrap_or_default();
	let referer = referer_fields(&headers).unwrap_or_default();

	respond(orchestrator.authorize(body.or(query).or(referer)).await)
}

fn decode_submission(headers: &HeaderMap, body: &[u8]) -> Result<AuthorizeRequest, String> {
	let content_type = headers
		.get(CONTENT_TYPE)
		.and_then(|v| v.to_str().ok())
		.map(str::to_ascii_lowercase)
		.unwrap_or_default();

	if content_type.starts_with("application/x-www-form-urlencoded") {
		Ok(fields(form_urlencoded::parse(body)))
	} else if content_type.starts_with("application/json") {
		serde_json::from_slice(body).map_err(|e| format!("Failed to parse the JSON body: {e}"))
	} else {
		// Untyped bodies count only when they hold JSON text.
		Ok(serde_json::from_slice(body).unwrap_or_default())
	}
}

fn referer_fields(headers: &HeaderMap) -> Option<AuthorizeRequest> {
	let referer = headers.get(REFERER)?.to_str().ok()?;
	let url = Url::parse(referer).ok()?;

	Some(fields(url.query_pairs()))
}

fn fields<'a>(pairs: impl Iterator<Item = (Cow<'a, str>, Cow<'a, str>)>) -> AuthorizeRequest {
	pairs
		.map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
		.collect::<BTreeMap<_, _>>()
		.into()
}

async fn health() -> Json<serde_json::Value> {
	Json(serde_json::json!({ "ok": true }))
}

fn reject(reason: String) -> Response {
	respond(AuthorizeResponse::failure(
		orchestrator::new_request_id(),
		&Error::validation("body", reason),
	))
}

fn respond(response: AuthorizeResponse) -> Response {
	let status =
		StatusCode::from_u16(response.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

	(status, Json(response)).into_response()
}
