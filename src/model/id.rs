//! Identifiers for members, controller sites, and controller instances.
//!
//! Each kind carries its own character set. Member and controller identifiers end up inside
//! colon-separated store keys, and the controller identifier is also a URL path segment. Site
//! identifiers travel verbatim in controller request bodies.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

/// Character set and length limit for one identifier kind.
#[derive(Clone, Copy, Debug)]
struct IdRules {
	kind: &'static str,
	max_len: usize,
	extra: &'static [char],
}
impl IdRules {
	fn check(&self, view: &str) -> Result<(), IdentifierError> {
		let kind = self.kind;

		if view.is_empty() {
			return Err(IdentifierError::Empty { kind });
		}
		if let Some(character) =
			view.chars().find(|c| !c.is_ascii_alphanumeric() && !self.extra.contains(c))
		{
			return Err(IdentifierError::InvalidCharacter { kind, character });
		}
		if view.len() > self.max_len {
			return Err(IdentifierError::TooLong { kind, max: self.max_len });
		}

		Ok(())
	}
}

const MEMBER_RULES: IdRules = IdRules { kind: "Member", max_len: 64, extra: &['-', '_', '.'] };
// Site names and 24-digit hex object ids.
const SITE_RULES: IdRules = IdRules { kind: "Site", max_len: 64, extra: &['-', '_'] };
// Operator-chosen names and 32-digit hex controller ids.
const CONTROLLER_RULES: IdRules =
	IdRules { kind: "Controller", max_len: 64, extra: &['-', '_', '.'] };

macro_rules! def_id {
	($name:ident, $rules:ident, $doc:literal) => {
		#[doc = $doc]
		#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
		#[serde(try_from = "String", into = "String")]
		pub struct $name(String);
		impl $name {
			/// Longest accepted identifier, in bytes.
			pub const MAX_LEN: usize = $rules.max_len;

			/// Validates `value` against this kind's character set and length limit.
			pub fn new(value: impl Into<String>) -> Result<Self, IdentifierError> {
				Self::try_from(value.into())
			}

			/// Borrows the identifier as a string slice.
			pub fn as_str(&self) -> &str {
				&self.0
			}
		}
		impl TryFrom<String> for $name {
			type Error = IdentifierError;

			fn try_from(value: String) -> Result<Self, Self::Error> {
				$rules.check(&value)?;

				Ok(Self(value))
			}
		}
		impl From<$name> for String {
			fn from(value: $name) -> Self {
				value.0
			}
		}
		impl Deref for $name {
			type Target = str;

			fn deref(&self) -> &Self::Target {
				&self.0
			}
		}
		impl AsRef<str> for $name {
			fn as_ref(&self) -> &str {
				&self.0
			}
		}
		impl Borrow<str> for $name {
			fn borrow(&self) -> &str {
				&self.0
			}
		}
		impl Debug for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				write!(f, "{}({})", $rules.kind, self.0)
			}
		}
		impl Display for $name {
			fn fmt(&self, f: &mut Formatter) -> FmtResult {
				f.write_str(&self.0)
			}
		}
		impl FromStr for $name {
			type Err = IdentifierError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				Self::new(s)
			}
		}
	};
}

/// Error returned when identifier validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum IdentifierError {
	/// The identifier was empty.
	#[error("{kind} identifier cannot be empty.")]
	Empty {
		/// Kind of identifier (member, site, controller).
		kind: &'static str,
	},
	/// The identifier holds a character outside its kind's set.
	#[error("{kind} identifier contains the invalid character {character:?}.")]
	InvalidCharacter {
		/// Kind of identifier (member, site, controller).
		kind: &'static str,
		/// First offending character.
		character: char,
	},
	/// The identifier exceeded the allowed byte count.
	#[error("{kind} identifier exceeds {max} characters.")]
	TooLong {
		/// Kind of identifier (member, site, controller).
		kind: &'static str,
		/// Maximum permitted length.
		max: usize,
	},
}

def_id! { MemberId, MEMBER_RULES, "Membership identifier issued by the membership directory." }
def_id! { SiteId, SITE_RULES, "Controller site the access point belongs to." }
def_id! {
	ControllerId,
	CONTROLLER_RULES,
	"Identity of one network controller; keys its cached session."
}
