//! Transport primitives for controller calls.
//!
//! The controller broker depends only on [`ControllerHttpClient`], which executes one
//! crate-owned [`ControllerRequest`] and returns the raw [`ControllerResponse`]. Transports must
//! not follow redirects: the controller signals a successful authorize with a 302, and cookies
//! set on a redirect response would be lost if the client chased it.

// std
#[cfg(feature = "reqwest")] use std::ops::Deref;
// crates.io
use serde::de::DeserializeOwned;
use time::format_description::well_known::Rfc2822;
// self
#[cfg(feature = "reqwest")] use crate::error::ConfigError;
use crate::{
	_prelude::*,
	error::{TransientError, TransportError},
};

/// Boxed future returned by [`ControllerHttpClient::execute`].
pub type HttpFuture<'a> =
	Pin<Box<dyn Future<Output = Result<ControllerResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports used to reach the controller.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be shared by every
/// concurrent admission, must apply a bounded timeout, and must return redirect responses as-is.
pub trait ControllerHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Executes `request` and buffers the full response body.
	fn execute(&self, request: ControllerRequest) -> HttpFuture<'_>;
}

/// HTTP methods the controller handshake needs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
	/// `GET`
	Get,
	/// `POST`
	Post,
}
impl HttpMethod {
	/// Method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
		}
	}
}

/// Outbound controller request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerRequest {
	/// Method.
	pub method: HttpMethod,
	/// Absolute URL including query.
	pub url: Url,
	/// Header pairs in insertion order.
	pub headers: Vec<(String, String)>,
	/// Request body, if any.
	pub body: Option<Vec<u8>>,
}
impl ControllerRequest {
	/// Creates a request without headers or body.
	pub fn new(method: HttpMethod, url: Url) -> Self {
		Self { method, url, headers: Vec::new(), body: None }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// Sets a JSON body and the matching content type.
	pub fn with_json(self, body: &serde_json::Value) -> Self {
		let mut request = self.with_header("Content-Type", "application/json");

		request.body = Some(body.to_string().into_bytes());

		request
	}

	/// First header named `name`, compared case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		find_header(&self.headers, name)
	}

	/// Body decoded as JSON, if present and valid.
	pub fn json_body(&self) -> Option<serde_json::Value> {
		self.body.as_deref().and_then(|b| serde_json::from_slice(b).ok())
	}
}

/// Buffered controller response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerResponse {
	/// HTTP status code.
	pub status: u16,
	/// Header pairs; repeated names (such as `Set-Cookie`) appear once per value.
	pub headers: Vec<(String, String)>,
	/// Raw body.
	pub body: Vec<u8>,
}
impl ControllerResponse {
	/// Creates a response without headers.
	pub fn new(status: u16, body: Vec<u8>) -> Self {
		Self { status, headers: Vec::new(), body }
	}

	/// Appends a header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.push((name.into(), value.into()));

		self
	}

	/// First header named `name`, compared case-insensitively.
	pub fn header(&self, name: &str) -> Option<&str> {
		find_header(&self.headers, name)
	}

	/// Every `Set-Cookie` value.
	pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
		self.headers
			.iter()
			.filter(|(n, _)| n.eq_ignore_ascii_case("set-cookie"))
			.map(|(_, v)| v.as_str())
	}

	/// Whether the status is a 5xx.
	pub fn is_server_error(&self) -> bool {
		(500..600).contains(&self.status)
	}

	/// Retry hint from `Retry-After`, relative to `now`.
	pub fn retry_after(&self, now: OffsetDateTime) -> Option<Duration> {
		parse_retry_after(self.header("retry-after")?, now)
	}

	/// Body decoded as `T`, with the failing JSON path on error.
	pub fn json<T>(&self) -> Result<T, TransientError>
	where
		T: DeserializeOwned,
	{
		let mut de = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut de).map_err(|source| {
			TransientError::ControllerResponseParse { source, status: Some(self.status) }
		})
	}

	/// Short lossy prefix of the body for diagnostics.
	pub fn body_snippet(&self) -> String {
		const LIMIT: usize = 160;

		let text = String::from_utf8_lossy(&self.body);
		let trimmed = text.trim();

		match trimmed.char_indices().nth(LIMIT) {
			Some((cut, _)) => format!("{}...", &trimmed[..cut]),
			None => trimmed.to_owned(),
		}
	}
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
	headers.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)).map(|(_, v)| v.as_str())
}

/// Parses a `Retry-After` value given as delta-seconds or an RFC 2822 date.
pub fn parse_retry_after(raw: &str, now: OffsetDateTime) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs.min(i64::MAX as u64) as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - now;

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
///
/// Clients passed to [`with_client`](Self::with_client) must be built with
/// `redirect::Policy::none()`; see the module docs.
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Builds a client with the given per-request timeout that never follows redirects.
	pub fn new(timeout: std::time::Duration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.redirect(reqwest::redirect::Policy::none())
			.timeout(timeout)
			.build()?;

		Ok(Self(client))
	}

	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ControllerHttpClient for ReqwestHttpClient {
	fn execute(&self, request: ControllerRequest) -> HttpFuture<'_> {
		Box::pin(async move {
			let method = match request.method {
				HttpMethod::Get => reqwest::Method::GET,
				HttpMethod::Post => reqwest::Method::POST,
			};
			let mut builder = self.0.request(method, request.url);

			for (name, value) in request.headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.filter_map(|(name, value)| {
					value.to_str().ok().map(|v| (name.as_str().to_owned(), v.to_owned()))
				})
				.collect();
			let body = response.bytes().await?.to_vec();

			Ok(ControllerResponse { status, headers, body })
		})
	}
}
