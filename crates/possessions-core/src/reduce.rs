//! Reduction of an event log against a session's values
//!
//! Events are applied strictly in append order, so the last event touching
//! a key decides its final state. `DestroySession` is not handled here: the
//! caller checks [`EventLog::destroys_session`] before reducing.

use crate::event::{Event, EventLog};
use crate::session::Values;
use std::collections::HashSet;

/// Outcome of reducing an event log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reduction {
	/// Values to persist
	pub values: Values,
	/// Whether the storage TTL and cookie should be refreshed
	pub refresh: bool,
}

/// Apply `log` to `values`
///
/// A new session never reports `refresh`: it receives a fresh record and
/// cookie on commit anyway.
///
/// # Examples
///
/// ```
/// use possessions_core::{reduce, Event, EventLog, Values};
///
/// let log: EventLog = [Event::set("k", "a"), Event::set("k", "b"), Event::Refresh]
///     .into_iter()
///     .collect();
/// let reduction = reduce(Values::new(), &log, false);
/// assert_eq!(reduction.values.get("k").map(String::as_str), Some("b"));
/// assert!(reduction.refresh);
/// ```
pub fn reduce(mut values: Values, log: &EventLog, is_new: bool) -> Reduction {
	let mut refresh = false;

	for event in log {
		match event {
			Event::Set { key, value } => {
				values.insert(key.clone(), value.clone());
			}
			Event::Del { key } => {
				values.remove(key);
			}
			Event::DelAll { keep } => {
				let keep: HashSet<&str> = keep.iter().map(String::as_str).collect();
				values.retain(|k, _| keep.contains(k.as_str()));
			}
			Event::Refresh => refresh = true,
			Event::DestroySession => {}
		}
	}

	Reduction {
		values,
		refresh: refresh && !is_new,
	}
}
