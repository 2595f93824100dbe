// self
use crate::{_prelude::*, model::MacFormat};

/// Bounded table of authorize request shapes, tried in a fixed order.
///
/// Candidates iterate endpoint paths outermost, then authorization-type codes, then address
/// formats, so the cheapest variations (address rendering) are exhausted first.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariantMatrix {
	/// Authorize endpoint paths, relative to the controller root.
	pub authorize_paths: Vec<String>,
	/// Values sent as `authType`.
	pub auth_types: Vec<u8>,
	/// Renderings used for the client and access-point addresses.
	pub mac_formats: Vec<MacFormat>,
}
impl VariantMatrix {
	/// Number of candidates.
	pub fn len(&self) -> usize {
		self.authorize_paths.len() * self.auth_types.len() * self.mac_formats.len()
	}

	/// Whether any dimension is empty.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Candidates in negotiation order.
	pub fn candidates(&self) -> impl Iterator<Item = AuthorizeCandidate<'_>> + '_ {
		self.authorize_paths.iter().flat_map(move |path| {
			self.auth_types.iter().flat_map(move |&auth_type| {
				self.mac_formats.iter().map(move |&mac_format| AuthorizeCandidate {
					endpoint_path: path,
					auth_type,
					mac_format,
				})
			})
		})
	}
}
impl Default for VariantMatrix {
	fn default() -> Self {
		Self {
			authorize_paths: vec![
				"/api/v2/hotspot/extPortal/auth".into(),
				"/api/v2/portal/extPortal/auth".into(),
			],
			auth_types: vec![4, 2],
			mac_formats: vec![MacFormat::ColonUpper, MacFormat::HyphenUpper, MacFormat::RawUpper],
		}
	}
}

/// One row of the [`VariantMatrix`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthorizeCandidate<'a> {
	/// Authorize path.
	pub endpoint_path: &'a str,
	/// `authType` value.
	pub auth_type: u8,
	/// Address rendering.
	pub mac_format: MacFormat,
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_matrix_orders_formats_innermost() {
		let matrix = VariantMatrix::default();
		let candidates: Vec<_> = matrix.candidates().collect();

		assert_eq!(matrix.len(), 12);
		assert_eq!(candidates.len(), 12);
		assert_eq!(candidates[0].mac_format, MacFormat::ColonUpper);
		assert_eq!(candidates[1].mac_format, MacFormat::HyphenUpper);
		assert_eq!(candidates[3].auth_type, 2);
		assert_eq!(candidates[5].endpoint_path, "/api/v2/hotspot/extPortal/auth");
		assert_eq!(candidates[6].endpoint_path, "/api/v2/portal/extPortal/auth");
		assert_eq!(candidates[6].auth_type, 4);
	}

	#[test]
	fn empty_dimension_empties_the_matrix() {
		let matrix = VariantMatrix { auth_types: Vec::new(), ..Default::default() };

		assert!(matrix.is_empty());
		assert_eq!(matrix.candidates().count(), 0);
	}
}
