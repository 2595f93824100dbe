//! Controller Session Broker: authenticate against the network controller and negotiate the
//! authorize request shape it accepts.
//!
//! `descriptor` holds validated controller metadata (base URL, operator credentials, handshake
//! paths, and the ordered [`VariantMatrix`]). `strategy` defines [`ControllerStrategy`], which
//! classifies each authorize response. The broker itself caches one [`ControllerSession`] per
//! controller in the shared [`KvStore`] so independent processes reuse a single login.

pub mod descriptor;
pub mod strategy;

mod admit;
mod login;
mod metrics;
mod session;

pub use admit::*;
pub use descriptor::*;
pub use login::RetryPolicy;
pub use metrics::AdmissionMetrics;
pub use session::*;
pub use strategy::*;

// self
use crate::{
	_prelude::*,
	http::{ControllerHttpClient, ControllerRequest, HttpMethod},
	store::KvStore,
};
#[cfg(feature = "reqwest")] use crate::{error::ConfigError, http::ReqwestHttpClient};

const ACCEPT: &str = "application/json,text/html;q=0.9,*/*;q=0.1";
const USER_AGENT: &str = concat!("portal-broker/", env!("CARGO_PKG_VERSION"));

#[cfg(feature = "reqwest")]
/// Broker specialized for the crate's default reqwest transport.
pub type ReqwestControllerBroker = ControllerBroker<ReqwestHttpClient>;

/// Admits clients through one controller.
///
/// The broker owns the transport, the session cache handle, the descriptor, and the strategy so
/// the login and negotiation code paths only deal with controller semantics.
#[derive(Clone)]
pub struct ControllerBroker<C>
where
	C: ?Sized + ControllerHttpClient,
{
	/// Transport used for every controller call.
	pub http_client: Arc<C>,
	/// Shared store holding the cached [`ControllerSession`].
	pub store: Arc<dyn KvStore>,
	/// Controller metadata and the variant matrix.
	pub descriptor: ControllerDescriptor,
	/// Classifier for authorize responses.
	pub strategy: Arc<dyn ControllerStrategy>,
	/// Backoff applied to warm-up + login.
	pub retry_policy: RetryPolicy,
	/// Broker-local counters.
	pub metrics: Arc<AdmissionMetrics>,
}
impl<C> ControllerBroker<C>
where
	C: ?Sized + ControllerHttpClient,
{
	/// Creates a broker over a caller-provided transport.
	pub fn with_http_client(
		store: Arc<dyn KvStore>,
		descriptor: ControllerDescriptor,
		strategy: Arc<dyn ControllerStrategy>,
		http_client: impl Into<Arc<C>>,
	) -> Self {
		Self {
			http_client: http_client.into(),
			store,
			descriptor,
			strategy,
			retry_policy: RetryPolicy::default(),
			metrics: Default::default(),
		}
	}

	/// Replaces the login retry policy.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Builds a request carrying the headers a browser on the hotspot page would send.
	///
	/// Every URL gets a `_=<millis>` cache buster so intermediaries never replay a stale answer.
	fn browser_request(
		&self,
		method: HttpMethod,
		mut url: Url,
		referer: &Url,
		jar: &CookieJar,
		now: OffsetDateTime,
	) -> ControllerRequest {
		let millis = now.unix_timestamp_nanos() / 1_000_000;

		url.query_pairs_mut().append_pair("_", &millis.to_string());

		let request = ControllerRequest::new(method, url)
			.with_header("Accept", ACCEPT)
			.with_header("Accept-Language", "en-US,en;q=0.9")
			.with_header("Cache-Control", "no-cache")
			.with_header("Pragma", "no-cache")
			.with_header("User-Agent", USER_AGENT)
			.with_header("Origin", self.descriptor.origin())
			.with_header("Referer", referer.as_str());

		match jar.header_value() {
			Some(cookies) => request.with_header("Cookie", cookies),
			None => request,
		}
	}
}
#[cfg(feature = "reqwest")]
impl ControllerBroker<ReqwestHttpClient> {
	/// Creates a broker with its own reqwest transport bounded by `timeout`.
	pub fn new(
		store: Arc<dyn KvStore>,
		descriptor: ControllerDescriptor,
		strategy: Arc<dyn ControllerStrategy>,
		timeout: std::time::Duration,
	) -> Result<Self, ConfigError> {
		Ok(Self::with_http_client(store, descriptor, strategy, ReqwestHttpClient::new(timeout)?))
	}
}
impl<C> Debug for ControllerBroker<C>
where
	C: ?Sized + ControllerHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ControllerBroker")
			.field("descriptor", &self.descriptor)
			.field("retry_policy", &self.retry_policy)
			.finish_non_exhaustive()
	}
}
