//! Validated portal-domain values shared by every component.

pub mod email;
pub mod id;
pub mod mac;
pub mod secret;

pub use email::*;
pub use id::*;
pub use mac::*;
pub use secret::*;

// crates.io
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

const FINGERPRINT_LEN: usize = 12;

/// Short, stable, non-reversible tag for personal data (emails, MAC addresses) in logs and
/// audit events.
pub fn fingerprint(value: &str) -> String {
	let digest = Sha256::digest(value.as_bytes());
	let mut encoded = URL_SAFE_NO_PAD.encode(digest);

	encoded.truncate(FINGERPRINT_LEN);

	encoded
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn fingerprint_is_stable_and_short() {
		let a = fingerprint("member@example.com");
		let b = fingerprint("member@example.com");

		assert_eq!(a, b);
		assert_eq!(a.len(), FINGERPRINT_LEN);
		assert_ne!(a, fingerprint("other@example.com"));
		assert!(!a.contains('@'));
	}
}
