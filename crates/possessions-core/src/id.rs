//! Session identifiers
//!
//! Identifiers are UUID-v4 strings in their lowercase hyphenated form,
//! for example `a668b3bb-0cf1-4627-8cd4-7f62d09ebad6`.

use uuid::Uuid;

/// Length of a textual session identifier
pub const SESSION_ID_LEN: usize = 36;

const DASH_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// Mint a fresh session identifier
pub fn new_session_id() -> String {
	Uuid::new_v4().to_string()
}

/// Check that `id` has the 8-4-4-4-12 lowercase hex layout
///
/// This is a shape check on untrusted cookie input, not a cryptographic
/// validation.
///
/// # Examples
///
/// ```
/// use possessions_core::is_valid_session_id;
///
/// assert!(is_valid_session_id("a668b3bb-0cf1-4627-8cd4-7f62d09ebad6"));
/// assert!(!is_valid_session_id("A668B3BB-0CF1-4627-8CD4-7F62D09EBAD6"));
/// assert!(!is_valid_session_id("../../etc/passwd"));
/// ```
pub fn is_valid_session_id(id: &str) -> bool {
	if id.len() != SESSION_ID_LEN {
		return false;
	}

	id.bytes().enumerate().all(|(i, b)| {
		if DASH_POSITIONS.contains(&i) {
			b == b'-'
		} else {
			matches!(b, b'0'..=b'9' | b'a'..=b'f')
		}
	})
}
