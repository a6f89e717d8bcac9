//! Request-scoped session snapshot

use crate::error::{Result, SessionError};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

/// Session values keyed by name
pub type Values = BTreeMap<String, String>;

/// Snapshot of a session read at the start of a request
///
/// A `Session` is never mutated by application code. Mutations are queued
/// as [`Event`](crate::Event)s and applied when the response commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
	id: String,
	values: Values,
}

impl Session {
	/// Create a snapshot from an identifier and its stored values
	pub fn new(id: impl Into<String>, values: Values) -> Self {
		Self {
			id: id.into(),
			values,
		}
	}

	/// Decode a snapshot from the JSON object kept by a storer
	///
	/// # Examples
	///
	/// ```
	/// use possessions_core::Session;
	///
	/// let session = Session::from_json("816a1acb-73aa-4a75-bbeb-f371bdad40e8", r#"{"key":"value"}"#).unwrap();
	/// assert_eq!(session.get("key"), Some("value"));
	/// ```
	pub fn from_json(id: impl Into<String>, encoded: &str) -> Result<Self> {
		let values: Values = serde_json::from_str(encoded)?;
		Ok(Self::new(id, values))
	}

	/// Session identifier
	pub fn id(&self) -> &str {
		&self.id
	}

	/// All values
	pub fn values(&self) -> &Values {
		&self.values
	}

	/// Look up a raw string value
	pub fn get(&self, key: &str) -> Option<&str> {
		self.values.get(key).map(String::as_str)
	}

	/// Decode a JSON-encoded value
	///
	/// Returns [`SessionError::NoMapKey`] when the key is absent and an
	/// encoding error when the stored string is not valid JSON for `T`.
	pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
		let encoded = self.get(key).ok_or(SessionError::NoMapKey)?;
		Ok(serde_json::from_str(encoded)?)
	}

	/// Consume the snapshot, returning its id and values
	pub fn into_parts(self) -> (String, Values) {
		(self.id, self.values)
	}
}

/// Encode values as the flat JSON object stored by a storer
pub fn encode_values(values: &Values) -> Result<String> {
	Ok(serde_json::to_string(values)?)
}
