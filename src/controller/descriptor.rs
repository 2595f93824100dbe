//! Controller descriptor data structures shared by login and admission.
//!
//! A descriptor is validated once at start-up; the broker never re-checks paths or credentials
//! per request.

/// Builder API for assembling controller descriptors.
pub mod builder;
/// Ordered authorize request variants.
pub mod matrix;
/// Controller-specific quirk toggles.
pub mod quirks;

pub use builder::*;
pub use matrix::*;
pub use quirks::*;

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	model::{ControllerId, Secret},
};

/// Operator account used for the controller login.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorCredentials {
	/// Operator user name.
	pub name: String,
	/// Operator password.
	pub password: Secret,
}

/// Handshake paths, relative to the controller root.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerEndpoints {
	/// Unauthenticated page fetched to obtain baseline cookies.
	pub warm_up: String,
	/// Operator credential exchange.
	pub login: String,
}
impl Default for ControllerEndpoints {
	fn default() -> Self {
		Self { warm_up: "/hotspot/login".into(), login: "/api/v2/hotspot/login".into() }
	}
}

/// Immutable controller descriptor consumed by the broker.
///
/// Every path resolves below `{base_url}/{id}/`, which is where the controller mounts its
/// hotspot API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerDescriptor {
	/// Controller identifier; also keys the session cache.
	pub id: ControllerId,
	/// Scheme + host (+ optional prefix) of the controller.
	pub base_url: Url,
	/// Operator account.
	pub operator: OperatorCredentials,
	/// Warm-up and login paths.
	pub endpoints: ControllerEndpoints,
	/// Ordered authorize candidates.
	pub matrix: VariantMatrix,
	/// Controller-specific quirks.
	pub quirks: ControllerQuirks,
}
impl ControllerDescriptor {
	/// Creates a new builder for the provided identifier.
	pub fn builder(id: ControllerId) -> ControllerDescriptorBuilder {
		ControllerDescriptorBuilder::new(id)
	}

	/// Resolves `path` below the controller root.
	pub fn endpoint(&self, path: &str) -> Result<Url, ConfigError> {
		self.root()
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidUrl { value: path.to_owned(), source })
	}

	/// Warm-up page URL.
	pub fn warm_up_url(&self) -> Result<Url, ConfigError> {
		self.endpoint(&self.endpoints.warm_up)
	}

	/// Operator login URL.
	pub fn login_url(&self) -> Result<Url, ConfigError> {
		self.endpoint(&self.endpoints.login)
	}

	/// Value of the `Origin` header.
	pub fn origin(&self) -> String {
		self.base_url.origin().ascii_serialization()
	}

	fn root(&self) -> Url {
		let mut root = self.base_url.clone();
		let path = format!("{}/{}/", root.path().trim_end_matches('/'), self.id);

		root.set_path(&path);
		root.set_query(None);
		root.set_fragment(None);

		root
	}
}
