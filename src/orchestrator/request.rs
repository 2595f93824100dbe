//! Inbound authorization request: lenient decoding, field aliases, and validation.

// std
use std::borrow::Cow;
// crates.io
use serde_json::Value;
// self
use crate::{
	_prelude::*,
	model::{MacAddress, MemberEmail, SiteId},
};

/// Redirect used when the splash page supplied none, or only an OS connectivity check.
pub const FALLBACK_REDIRECT: &str = "http://neverssl.com";

const CONNECTIVITY_CHECK_MARKERS: [&str; 5] =
	["captiveportal", "connecttest", "generate_204", "msftconnecttest", "wifiportal"];

/// Authorization request as submitted by the splash page.
///
/// Decoding accepts JSON or form fields, the aliases the splash page uses (`client_id`,
/// `gatewayMac`, `ssid`, `radio`, `siteId`), numbers where strings are expected, and
/// `1/true/yes/on` for the extension flag. Blank values count as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Value>", rename_all = "camelCase")]
pub struct AuthorizeRequest {
	/// Client hardware address.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub client_mac: Option<String>,
	/// Access-point hardware address.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ap_mac: Option<String>,
	/// Network (SSID) name.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub ssid_name: Option<String>,
	/// Radio identifier.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub radio_id: Option<String>,
	/// Controller site.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub site: Option<String>,
	/// Where to send the client once online.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub redirect_url: Option<String>,
	/// Member email.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// Session-extension flag.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub extend: Option<bool>,
}
impl AuthorizeRequest {
	/// Fills every absent field from `fallback`.
	pub fn or(self, fallback: AuthorizeRequest) -> Self {
		Self {
			client_mac: self.client_mac.or(fallback.client_mac),
			ap_mac: self.ap_mac.or(fallback.ap_mac),
			ssid_name: self.ssid_name.or(fallback.ssid_name),
			radio_id: self.radio_id.or(fallback.radio_id),
			site: self.site.or(fallback.site),
			redirect_url: self.redirect_url.or(fallback.redirect_url),
			email: self.email.or(fallback.email),
			extend: self.extend.or(fallback.extend),
		}
	}

	/// Checks required fields and parses addresses.
	pub fn validate(&self) -> Result<ValidatedRequest> {
		let client_mac = self
			.client_mac
			.as_deref()
			.ok_or_else(|| Error::validation("clientMac", "is required"))?;
		let client_mac =
			MacAddress::parse(client_mac).map_err(|e| Error::validation("clientMac", e.to_string()))?;
		let email =
			self.email.as_deref().ok_or_else(|| Error::validation("email", "is required"))?;
		let email = MemberEmail::new(email).map_err(|e| Error::validation("email", e.to_string()))?;
		let site = self.site.as_deref().ok_or_else(|| Error::validation("site", "is required"))?;
		let site_id = SiteId::new(site).map_err(|e| Error::validation("site", e.to_string()))?;
		let ap_mac = self
			.ap_mac
			.as_deref()
			.map(MacAddress::parse)
			.transpose()
			.map_err(|e| Error::validation("apMac", e.to_string()))?;

		Ok(ValidatedRequest {
			email,
			client_mac,
			ap_mac,
			network_name: self.ssid_name.clone(),
			radio_id: self.radio_id.as_deref().and_then(|r| r.parse().ok()).unwrap_or(0),
			site_id,
			redirect_url: normalize_redirect(self.redirect_url.as_deref()),
			extend: self.extend.unwrap_or(false),
		})
	}
}
impl From<BTreeMap<String, Value>> for AuthorizeRequest {
	fn from(fields: BTreeMap<String, Value>) -> Self {
		let pick = |keys: &[&str]| keys.iter().find_map(|k| fields.get(*k).and_then(loose_string));

		Self {
			client_mac: pick(&["clientMac", "client_id", "client_mac"]),
			ap_mac: pick(&["apMac", "gatewayMac", "ap_mac"]),
			ssid_name: pick(&["ssidName", "ssid"]),
			radio_id: pick(&["radioId", "radio"]),
			site: pick(&["site", "siteId"]),
			redirect_url: pick(&["redirectUrl", "redirect_url"]),
			email: pick(&["email"]),
			extend: pick(&["extend"]).map(|v| parse_flag(&v)),
		}
	}
}

/// Request after validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedRequest {
	/// Member email.
	pub email: MemberEmail,
	/// Client hardware address.
	pub client_mac: MacAddress,
	/// Access-point hardware address.
	pub ap_mac: Option<MacAddress>,
	/// Network (SSID) name.
	pub network_name: Option<String>,
	/// Radio identifier; unparsable values become `0`.
	pub radio_id: u32,
	/// Controller site.
	pub site_id: SiteId,
	/// Normalized redirect.
	pub redirect_url: String,
	/// Session-extension flag.
	pub extend: bool,
}

/// Decodes a percent-encoded redirect and replaces blanks and OS connectivity checks with
/// [`FALLBACK_REDIRECT`].
pub fn normalize_redirect(raw: Option<&str>) -> String {
	let Some(raw) = raw.map(str::trim).filter(|r| !r.is_empty()) else {
		return FALLBACK_REDIRECT.into();
	};
	// Escapes that decode to invalid UTF-8 leave the caller's value untouched.
	let decoded = percent_encoding::percent_decode_str(raw)
		.decode_utf8()
		.map(Cow::into_owned)
		.unwrap_or_else(|_| raw.to_owned());
	let lowered = decoded.to_ascii_lowercase();

	if CONNECTIVITY_CHECK_MARKERS.iter().any(|marker| lowered.contains(marker)) {
		FALLBACK_REDIRECT.into()
	} else {
		decoded
	}
}

fn loose_string(value: &Value) -> Option<String> {
	match value {
		Value::String(s) => Some(s.trim().to_owned()).filter(|s| !s.is_empty()),
		Value::Number(n) => Some(n.to_string()),
		Value::Bool(b) => Some(b.to_string()),
		_ => None,
	}
}

fn parse_flag(value: &str) -> bool {
	matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn aliases_numbers_and_flags_decode() {
		let request: AuthorizeRequest = serde_json::from_value(serde_json::json!({
			"client_id": "aa-bb-cc-dd-ee-ff",
			"gatewayMac": "",
			"ssid": "W2G_Basic",
			"radio": 1,
			"siteId": "site-a",
			"email": " Member@Example.com ",
			"extend": "Yes",
		}))
		.expect("Aliased request should decode.");

		assert_eq!(request.client_mac.as_deref(), Some("aa-bb-cc-dd-ee-ff"));
		assert_eq!(request.ap_mac, None);
		assert_eq!(request.radio_id.as_deref(), Some("1"));
		assert_eq!(request.site.as_deref(), Some("site-a"));
		assert_eq!(request.extend, Some(true));

		let validated = request.validate().expect("Request should validate.");

		assert_eq!(validated.email.as_str(), "member@example.com");
		assert_eq!(validated.radio_id, 1);
		assert_eq!(validated.redirect_url, FALLBACK_REDIRECT);
		assert!(validated.extend);
	}

	#[test]
	fn canonical_names_win_over_aliases() {
		let request: AuthorizeRequest = serde_json::from_value(serde_json::json!({
			"clientMac": "AA:BB:CC:DD:EE:01",
			"client_id": "AA:BB:CC:DD:EE:02",
			"extend": false,
		}))
		.expect("Request should decode.");

		assert_eq!(request.client_mac.as_deref(), Some("AA:BB:CC:DD:EE:01"));
		assert_eq!(request.extend, Some(false));
	}

	#[test]
	fn missing_required_fields_name_the_field() {
		let base = AuthorizeRequest {
			client_mac: Some("AA:BB:CC:DD:EE:FF".into()),
			email: Some("m@example.com".into()),
			site: Some("site-a".into()),
			..Default::default()
		};

		assert!(base.validate().is_ok());

		for (request, field) in [
			(AuthorizeRequest { client_mac: None, ..base.clone() }, "clientMac"),
			(AuthorizeRequest { client_mac: Some("zz".into()), ..base.clone() }, "clientMac"),
			(AuthorizeRequest { email: None, ..base.clone() }, "email"),
			(AuthorizeRequest { site: None, ..base.clone() }, "site"),
			(AuthorizeRequest { ap_mac: Some("nope".into()), ..base.clone() }, "apMac"),
		] {
			match request.validate() {
				Err(Error::Validation { field: got, .. }) => assert_eq!(got, field),
				other => panic!("Expected a validation error for {field}, got {other:?}."),
			}
		}
	}

	#[test]
	fn body_fields_win_when_merging_with_query() {
		let body = AuthorizeRequest { email: Some("body@example.com".into()), ..Default::default() };
		let query = AuthorizeRequest {
			email: Some("query@example.com".into()),
			site: Some("site-q".into()),
			extend: Some(true),
			..Default::default()
		};
		let merged = body.or(query);

		assert_eq!(merged.email.as_deref(), Some("body@example.com"));
		assert_eq!(merged.site.as_deref(), Some("site-q"));
		assert_eq!(merged.extend, Some(true));
	}

	#[test]
	fn redirects_are_decoded_and_connectivity_checks_replaced() {
		assert_eq!(normalize_redirect(None), FALLBACK_REDIRECT);
		assert_eq!(normalize_redirect(Some("  ")), FALLBACK_REDIRECT);
		assert_eq!(
			normalize_redirect(Some("http%3A%2F%2Fexample.com%2Fwelcome%3Fa%3D1")),
			"http://example.com/welcome?a=1"
		);
		assert_eq!(
			normalize_redirect(Some("http://www.msftconnecttest.com/redirect")),
			FALLBACK_REDIRECT
		);
		assert_eq!(
			normalize_redirect(Some("http%3A%2F%2Fconnectivitycheck.gstatic.com%2Fgenerate_204")),
			FALLBACK_REDIRECT
		);
		assert_eq!(normalize_redirect(Some("http://example.com/100%")), "http://example.com/100%");
		assert_eq!(
			normalize_redirect(Some("http%3A%2F%2Fexample.com%2F100%zz")),
			"http://example.com/100%zz"
		);
		assert_eq!(normalize_redirect(Some("http://example.com/%FF")), "http://example.com/%FF");
	}
}
