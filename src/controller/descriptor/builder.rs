// self
use crate::{
	_prelude::*,
	controller::{
		ControllerDescriptor, ControllerEndpoints, ControllerQuirks, OperatorCredentials,
		VariantMatrix,
	},
	model::{ControllerId, MacFormat, Secret},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ControllerDescriptorError {
	/// Base URL is mandatory.
	#[error("Missing controller base URL.")]
	MissingBaseUrl,
	/// Only HTTP(S) controllers are reachable.
	#[error("Controller base URL must use http or https: {url}.")]
	UnsupportedScheme {
		/// Offending URL.
		url: String,
	},
	/// URLs such as `mailto:` cannot carry a path.
	#[error("Controller base URL cannot carry a path: {url}.")]
	OpaqueBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Operator name and password are both required.
	#[error("Missing controller operator credentials.")]
	MissingOperator,
	/// Paths must be absolute below the controller root.
	#[error("Controller path `{path}` must start with `/`.")]
	InvalidPath {
		/// Offending path.
		path: String,
	},
	/// Every matrix dimension needs at least one value.
	#[error("Variant matrix has no {dimension}.")]
	EmptyMatrix {
		/// Dimension that is empty.
		dimension: &'static str,
	},
	/// CSRF header name cannot be blank.
	#[error("CSRF header name is empty.")]
	EmptyCsrfHeader,
	/// Session TTL must be positive.
	#[error("Controller session TTL must be positive.")]
	InvalidSessionTtl,
}

/// Builder for [`ControllerDescriptor`] values.
#[derive(Debug)]
pub struct ControllerDescriptorBuilder {
	/// Identifier for the descriptor being constructed.
	pub id: ControllerId,
	/// Controller base URL.
	pub base_url: Option<Url>,
	/// Operator account.
	pub operator: Option<OperatorCredentials>,
	/// Handshake paths.
	pub endpoints: ControllerEndpoints,
	/// Authorize candidates.
	pub matrix: VariantMatrix,
	/// Controller-specific quirks.
	pub quirks: ControllerQuirks,
}
impl ControllerDescriptorBuilder {
	/// Creates a new builder seeded with the provided identifier and default paths.
	pub fn new(id: ControllerId) -> Self {
		Self {
			id,
			base_url: None,
			operator: None,
			endpoints: ControllerEndpoints::default(),
			matrix: VariantMatrix::default(),
			quirks: ControllerQuirks::default(),
		}
	}

	/// Sets the controller base URL.
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Sets the operator account.
	pub fn operator(mut self, name: impl Into<String>, password: impl Into<String>) -> Self {
		self.operator =
			Some(OperatorCredentials { name: name.into(), password: Secret::new(password) });

		self
	}

	/// Overrides the warm-up path.
	pub fn warm_up_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.warm_up = path.into();

		self
	}

	/// Overrides the login path.
	pub fn login_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.login = path.into();

		self
	}

	/// Replaces the whole variant matrix.
	pub fn matrix(mut self, matrix: VariantMatrix) -> Self {
		self.matrix = matrix;

		self
	}

	/// Replaces the authorize paths.
	pub fn authorize_paths<I, S>(mut self, paths: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.matrix.authorize_paths = paths.into_iter().map(Into::into).collect();

		self
	}

	/// Replaces the `authType` codes.
	pub fn auth_types(mut self, codes: impl IntoIterator<Item = u8>) -> Self {
		self.matrix.auth_types = codes.into_iter().collect();

		self
	}

	/// Replaces the address renderings.
	pub fn mac_formats(mut self, formats: impl IntoIterator<Item = MacFormat>) -> Self {
		self.matrix.mac_formats = formats.into_iter().collect();

		self
	}

	/// Overrides the controller quirks.
	pub fn quirks(mut self, quirks: ControllerQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ControllerDescriptor, ControllerDescriptorError> {
		let base_url = self.base_url.ok_or(ControllerDescriptorError::MissingBaseUrl)?;
		let operator = self.operator.ok_or(ControllerDescriptorError::MissingOperator)?;
		let descriptor = ControllerDescriptor {
			id: self.id,
			base_url,
			operator,
			endpoints: self.endpoints,
			matrix: self.matrix,
			quirks: self.quirks,
		};

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ControllerDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ControllerDescriptorError> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(ControllerDescriptorError::UnsupportedScheme {
				url: self.base_url.to_string(),
			});
		}
		if self.base_url.cannot_be_a_base() {
			return Err(ControllerDescriptorError::OpaqueBaseUrl { url: self.base_url.to_string() });
		}
		if self.operator.name.trim().is_empty() || self.operator.password.is_empty() {
			return Err(ControllerDescriptorError::MissingOperator);
		}
		if self.matrix.authorize_paths.is_empty() {
			return Err(ControllerDescriptorError::EmptyMatrix { dimension: "authorize paths" });
		}
		if self.matrix.auth_types.is_empty() {
			return Err(ControllerDescriptorError::EmptyMatrix { dimension: "auth types" });
		}
		if self.matrix.mac_formats.is_empty() {
			return Err(ControllerDescriptorError::EmptyMatrix { dimension: "mac formats" });
		}

		validate_path(&self.endpoints.warm_up)?;
		validate_path(&self.endpoints.login)?;
		validate_path(&self.quirks.login_referer)?;

		for path in &self.matrix.authorize_paths {
			validate_path(path)?;
		}

		if self.quirks.csrf_header.trim().is_empty() {
			return Err(ControllerDescriptorError::EmptyCsrfHeader);
		}
		if !self.quirks.session_ttl.is_positive() {
			return Err(ControllerDescriptorError::InvalidSessionTtl);
		}

		Ok(())
	}
}

fn validate_path(path: &str) -> Result<(), ControllerDescriptorError> {
	if path.starts_with('/') && path.len() > 1 && !path.chars().any(char::is_whitespace) {
		Ok(())
	} else {
		Err(ControllerDescriptorError::InvalidPath { path: path.to_owned() })
	}
}
