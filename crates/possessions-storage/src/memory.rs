//! In-memory session storer
//!
//! Records live in a `HashMap` behind a tokio `RwLock`. Expiry is checked
//! lazily on read and enforced by [`MemoryStorer::clean`], which a
//! [`Cleaner`] can run periodically.

use crate::DEFAULT_MAX_AGE;
use crate::cleaner::{Cleaner, Sweep};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use possessions_core::clock::add_duration;
use possessions_core::{Clock, Result, SessionError, Storer, SystemClock};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct Entry {
	value: String,
	expires_at: Option<DateTime<Utc>>,
}

impl Entry {
	fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|at| at <= now)
	}
}

/// Session storer keeping records in process memory
///
/// # Examples
///
/// ```
/// use possessions_core::Storer;
/// use possessions_storage::MemoryStorer;
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let storer = MemoryStorer::new(Duration::from_secs(3600));
/// storer.set("id", "{}").await.unwrap();
/// assert_eq!(storer.get("id").await.unwrap(), "{}");
/// # });
/// ```
pub struct MemoryStorer<C: Clock = SystemClock> {
	entries: RwLock<HashMap<String, Entry>>,
	max_age: Duration,
	clock: C,
}

impl MemoryStorer<SystemClock> {
	/// Create a storer whose records live for `max_age`
	///
	/// A zero `max_age` keeps records until they are deleted.
	pub fn new(max_age: Duration) -> Self {
		Self::with_clock(max_age, SystemClock)
	}
}

impl Default for MemoryStorer<SystemClock> {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_AGE)
	}
}

impl<C: Clock> MemoryStorer<C> {
	pub fn with_clock(max_age: Duration, clock: C) -> Self {
		Self {
			entries: RwLock::new(HashMap::new()),
			max_age,
			clock,
		}
	}

	pub fn max_age(&self) -> Duration {
		self.max_age
	}

	/// Number of records held, including expired ones not yet swept
	pub async fn len(&self) -> usize {
		self.entries.read().await.len()
	}

	pub async fn is_empty(&self) -> bool {
		self.entries.read().await.is_empty()
	}

	/// Remove expired records
	pub async fn clean(&self) -> usize {
		let now = self.clock.now();
		let mut entries = self.entries.write().await;
		let before = entries.len();
		entries.retain(|_, entry| !entry.is_expired(now));
		before - entries.len()
	}

	/// Sweep expired records every `interval` until the returned handle is dropped
	pub fn spawn_cleaner(self: &Arc<Self>, interval: Duration) -> Cleaner {
		Cleaner::spawn(Arc::clone(self), interval)
	}

	fn expiry_from_now(&self) -> Option<DateTime<Utc>> {
		if self.max_age.is_zero() {
			None
		} else {
			Some(add_duration(self.clock.now(), self.max_age))
		}
	}
}

#[async_trait]
impl<C: Clock> Storer for MemoryStorer<C> {
	async fn all(&self) -> Result<Vec<String>> {
		let now = self.clock.now();
		let entries = self.entries.read().await;
		Ok(entries
			.iter()
			.filter(|(_, entry)| !entry.is_expired(now))
			.map(|(key, _)| key.clone())
			.collect())
	}

	async fn get(&self, key: &str) -> Result<String> {
		let now = self.clock.now();
		let entries = self.entries.read().await;
		match entries.get(key) {
			Some(entry) if !entry.is_expired(now) => Ok(entry.value.clone()),
			_ => Err(SessionError::NoSession),
		}
	}

	async fn set(&self, key: &str, value: &str) -> Result<()> {
		let entry = Entry {
			value: value.to_string(),
			expires_at: self.expiry_from_now(),
		};
		self.entries.write().await.insert(key.to_string(), entry);
		Ok(())
	}

	async fn del(&self, key: &str) -> Result<()> {
		self.entries.write().await.remove(key);
		Ok(())
	}

	async fn reset_expiry(&self, key: &str) -> Result<()> {
		let now = self.clock.now();
		let expires_at = self.expiry_from_now();
		let mut entries = self.entries.write().await;
		if let Some(entry) = entries.get_mut(key)
			&& !entry.is_expired(now)
		{
			entry.expires_at = expires_at;
		}
		Ok(())
	}
}

#[async_trait]
impl<C: Clock> Sweep for MemoryStorer<C> {
	async fn clean(&self) -> Result<usize> {
		Ok(MemoryStorer::clean(self).await)
	}
}
