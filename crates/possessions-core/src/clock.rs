//! Wall-clock source for in-process storers
//!
//! Storers that track expiry themselves take a [`Clock`] so tests can move
//! time forward explicitly instead of sleeping.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Source of the current time
pub trait Clock: Send + Sync + 'static {
	fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
	pub fn new() -> Self {
		Self
	}
}

impl Clock for SystemClock {
	fn now(&self) -> DateTime<Utc> {
		Utc::now()
	}
}

/// Manually driven clock for tests
#[derive(Debug, Clone)]
pub struct MockClock {
	current: Arc<RwLock<DateTime<Utc>>>,
}

impl MockClock {
	pub fn new(start: DateTime<Utc>) -> Self {
		Self {
			current: Arc::new(RwLock::new(start)),
		}
	}

	/// Move the clock forward
	pub fn advance(&self, by: Duration) {
		let mut current = self.current.write();
		*current = add_duration(*current, by);
	}

	pub fn set(&self, to: DateTime<Utc>) {
		*self.current.write() = to;
	}
}

impl Default for MockClock {
	fn default() -> Self {
		Self::new(Utc::now())
	}
}

impl Clock for MockClock {
	fn now(&self) -> DateTime<Utc> {
		*self.current.read()
	}
}

/// `at + by`, saturating at the maximum representable time
pub fn add_duration(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
	TimeDelta::from_std(by)
		.ok()
		.and_then(|delta| at.checked_add_signed(delta))
		.unwrap_or(DateTime::<Utc>::MAX_UTC)
}
