//! Session mutation events and the per-request event log

/// Key prefix applied to flash values
pub const FLASH_PREFIX: &str = "flash_";

/// Storage key for the flash value named `key`
pub fn flash_key(key: &str) -> String {
	format!("{FLASH_PREFIX}{key}")
}

/// One queued session mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
	/// Set `key` to `value`
	Set { key: String, value: String },
	/// Remove `key`
	Del { key: String },
	/// Remove every key that is not in `keep`
	DelAll { keep: Vec<String> },
	/// Extend the session's lifetime
	Refresh,
	/// Delete the client's session cookie
	DestroySession,
}

impl Event {
	pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
		Self::Set {
			key: key.into(),
			value: value.into(),
		}
	}

	pub fn del(key: impl Into<String>) -> Self {
		Self::Del { key: key.into() }
	}

	pub fn del_all<I, S>(keep: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self::DelAll {
			keep: keep.into_iter().map(Into::into).collect(),
		}
	}
}

/// Ordered, append-only log of the events queued during one request
///
/// The log is sealed once the response has committed; events pushed after
/// that point can no longer reach storage and are dropped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
	events: Vec<Event>,
	sealed: bool,
}

impl EventLog {
	pub fn new() -> Self {
		Self::default()
	}

	/// Append an event
	///
	/// Returns `false` if the log was already sealed and the event was dropped.
	pub fn push(&mut self, event: Event) -> bool {
		if self.sealed {
			tracing::warn!(?event, "session already committed, dropping event");
			return false;
		}
		self.events.push(event);
		true
	}

	/// Mark the log as committed
	pub fn seal(&mut self) {
		self.sealed = true;
	}

	pub fn is_sealed(&self) -> bool {
		self.sealed
	}

	/// True if any event asks for the session to be destroyed
	///
	/// Destruction wins regardless of its position in the log.
	pub fn destroys_session(&self) -> bool {
		self.events.iter().any(|e| matches!(e, Event::DestroySession))
	}

	pub fn events(&self) -> &[Event] {
		&self.events
	}

	pub fn iter(&self) -> std::slice::Iter<'_, Event> {
		self.events.iter()
	}

	pub fn len(&self) -> usize {
		self.events.len()
	}

	pub fn is_empty(&self) -> bool {
		self.events.is_empty()
	}
}

impl FromIterator<Event> for EventLog {
	fn from_iter<I: IntoIterator<Item = Event>>(iter: I) -> Self {
		Self {
			events: iter.into_iter().collect(),
			sealed: false,
		}
	}
}

impl<'a> IntoIterator for &'a EventLog {
	type Item = &'a Event;
	type IntoIter = std::slice::Iter<'a, Event>;

	fn into_iter(self) -> Self::IntoIter {
		self.events.iter()
	}
}
