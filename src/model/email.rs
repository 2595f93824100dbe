//! Normalized membership email.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::{_prelude::*, model::fingerprint};

const EMAIL_MAX_LEN: usize = 254;

/// Error returned when an email cannot be normalized.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum EmailError {
	/// Nothing but whitespace was supplied.
	#[error("Email cannot be empty.")]
	Empty,
	/// The value is not shaped like `local@domain`.
	#[error("Email must contain a local part and a domain.")]
	Malformed,
	/// The value exceeds the maximum address length.
	#[error("Email exceeds {max} characters.")]
	TooLong {
		/// Maximum permitted length.
		max: usize,
	},
}

/// Lower-cased, trimmed email used to query the membership directory.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberEmail(String);
impl MemberEmail {
	/// Normalizes and validates `value`.
	pub fn new(value: impl AsRef<str>) -> Result<Self, EmailError> {
		let normalized = value.as_ref().trim().to_lowercase();

		if normalized.is_empty() {
			return Err(EmailError::Empty);
		}
		if normalized.len() > EMAIL_MAX_LEN {
			return Err(EmailError::TooLong { max: EMAIL_MAX_LEN });
		}

		match normalized.split_once('@') {
			Some((local, domain))
				if !local.is_empty()
					&& !domain.is_empty()
					&& !domain.contains('@')
					&& !normalized.chars().any(char::is_whitespace) =>
				Ok(Self(normalized)),
			_ => Err(EmailError::Malformed),
		}
	}

	/// Borrows the normalized address.
	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// Log-safe tag for this address.
	pub fn fingerprint(&self) -> String {
		fingerprint(&self.0)
	}
}
impl Deref for MemberEmail {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl Borrow<str> for MemberEmail {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<MemberEmail> for String {
	fn from(value: MemberEmail) -> Self {
		value.0
	}
}
impl TryFrom<String> for MemberEmail {
	type Error = EmailError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
impl Debug for MemberEmail {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "MemberEmail({})", self.fingerprint())
	}
}
impl Display for MemberEmail {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
