//! Hardware addresses and the textual formats the controller may expect them in.

// self
use crate::{_prelude::*, model::fingerprint};

/// Error returned when a hardware address cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum MacError {
	/// Nothing was supplied.
	#[error("MAC address cannot be empty.")]
	Empty,
	/// The value does not contain exactly twelve hex digits.
	#[error("MAC address `{value}` must contain exactly 12 hex digits.")]
	Malformed {
		/// Offending input.
		value: String,
	},
}

/// 48-bit hardware address parsed from any common textual format.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddress([u8; 6]);
impl MacAddress {
	/// Parses `AA:BB:CC:DD:EE:FF`, `aa-bb-cc-dd-ee-ff`, `aabb.ccdd.eeff`, or bare hex.
	pub fn parse(value: &str) -> Result<Self, MacError> {
		let trimmed = value.trim();

		if trimmed.is_empty() {
			return Err(MacError::Empty);
		}

		let mut octets = [0_u8; 6];
		let mut digits = 0_usize;

		for c in trimmed.chars() {
			if matches!(c, ':' | '-' | '.') {
				continue;
			}

			let nibble = c
				.to_digit(16)
				.ok_or_else(|| MacError::Malformed { value: trimmed.to_owned() })? as u8;

			if digits >= 12 {
				return Err(MacError::Malformed { value: trimmed.to_owned() });
			}

			octets[digits / 2] = (octets[digits / 2] << 4) | nibble;
			digits += 1;
		}

		if digits != 12 {
			return Err(MacError::Malformed { value: trimmed.to_owned() });
		}

		Ok(Self(octets))
	}

	/// Renders the address in `format`.
	pub fn render(&self, format: MacFormat) -> String {
		let separator = format.separator();
		let mut out = String::with_capacity(17);

		for (i, octet) in self.0.iter().enumerate() {
			if let Some(sep) = separator.filter(|_| i > 0) {
				out.push(sep);
			}

			if format.is_upper() {
				out.push_str(&format!("{octet:02X}"));
			} else {
				out.push_str(&format!("{octet:02x}"));
			}
		}

		out
	}

	/// Log-safe tag for this address.
	pub fn fingerprint(&self) -> String {
		fingerprint(&self.render(MacFormat::RawLower))
	}
}
impl Debug for MacAddress {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "MacAddress({})", self.fingerprint())
	}
}
impl Display for MacAddress {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.render(MacFormat::ColonUpper))
	}
}
impl FromStr for MacAddress {
	type Err = MacError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}
impl Serialize for MacAddress {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: serde::Serializer,
	{
		serializer.collect_str(self)
	}
}
impl<'de> Deserialize<'de> for MacAddress {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let raw = String::deserialize(deserializer)?;

		Self::parse(&raw).map_err(serde::de::Error::custom)
	}
}

/// Textual rendering of a [`MacAddress`] sent to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacFormat {
	/// `AA:BB:CC:DD:EE:FF`
	ColonUpper,
	/// `aa:bb:cc:dd:ee:ff`
	ColonLower,
	/// `AA-BB-CC-DD-EE-FF`
	HyphenUpper,
	/// `aa-bb-cc-dd-ee-ff`
	HyphenLower,
	/// `AABBCCDDEEFF`
	RawUpper,
	/// `aabbccddeeff`
	RawLower,
}
impl MacFormat {
	/// Stable label for diagnostics.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::ColonUpper => "colon_upper",
			Self::ColonLower => "colon_lower",
			Self::HyphenUpper => "hyphen_upper",
			Self::HyphenLower => "hyphen_lower",
			Self::RawUpper => "raw_upper",
			Self::RawLower => "raw_lower",
		}
	}

	const fn separator(self) -> Option<char> {
		match self {
			Self::ColonUpper | Self::ColonLower => Some(':'),
			Self::HyphenUpper | Self::HyphenLower => Some('-'),
			Self::RawUpper | Self::RawLower => None,
		}
	}

	const fn is_upper(self) -> bool {
		matches!(self, Self::ColonUpper | Self::HyphenUpper | Self::RawUpper)
	}
}
impl Display for MacFormat {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
