//! Redis session storer
//!
//! Records are plain Redis strings whose TTL is the storer's max-age.
//! Redis enforces expiry itself, so no cleaner is needed.

use crate::DEFAULT_MAX_AGE;
use async_trait::async_trait;
use possessions_core::{Result, ResultExt, SessionError, Storer};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;

/// Number of keys requested per SCAN round trip
const SCAN_BATCH_SIZE: usize = 100;

/// Session storer backed by a Redis server
///
/// Uses a [`ConnectionManager`], which reconnects transparently and is
/// cheap to clone for each command.
#[derive(Clone)]
pub struct RedisStorer {
	manager: ConnectionManager,
	max_age: Duration,
	key_prefix: String,
}

impl std::fmt::Debug for RedisStorer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("RedisStorer")
			.field("max_age", &self.max_age)
			.field("key_prefix", &self.key_prefix)
			.finish_non_exhaustive()
	}
}

impl RedisStorer {
	/// Connect to `url`, storing records for `max_age`
	///
	/// A zero `max_age` stores records without a TTL.
	///
	/// # Examples
	///
	/// ```no_run
	/// use possessions_storage::RedisStorer;
	/// use std::time::Duration;
	///
	/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
	/// let storer = RedisStorer::new("redis://localhost:6379", Duration::from_secs(3600))
	///     .await?
	///     .with_key_prefix("sess");
	/// # Ok(())
	/// # }
	/// ```
	pub async fn new(url: &str, max_age: Duration) -> Result<Self> {
		let client = Client::open(url)
			.map_err(SessionError::storage)
			.context("failed to parse Redis URL")?;
		Self::from_client(client, max_age).await
	}

	/// Connect to `url` with the default two-day max-age
	pub async fn with_defaults(url: &str) -> Result<Self> {
		Self::new(url, DEFAULT_MAX_AGE).await
	}

	/// Build a storer from an existing client
	pub async fn from_client(client: Client, max_age: Duration) -> Result<Self> {
		let manager = ConnectionManager::new(client)
			.await
			.map_err(SessionError::storage)
			.context("failed to connect to Redis")?;

		Ok(Self {
			manager,
			max_age,
			key_prefix: String::new(),
		})
	}

	/// Namespace every key as `prefix:key`
	pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.key_prefix = prefix.into();
		self
	}

	pub fn max_age(&self) -> Duration {
		self.max_age
	}

	fn build_key(&self, key: &str) -> String {
		if self.key_prefix.is_empty() {
			key.to_string()
		} else {
			format!("{}:{}", self.key_prefix, key)
		}
	}

	fn strip_key(&self, full_key: String) -> String {
		if self.key_prefix.is_empty() {
			return full_key;
		}
		match full_key.strip_prefix(&format!("{}:", self.key_prefix)) {
			Some(key) => key.to_string(),
			None => full_key,
		}
	}

	fn ttl_millis(&self) -> u64 {
		u64::try_from(self.max_age.as_millis())
			.unwrap_or(u64::MAX)
			.max(1)
	}
}

#[async_trait]
impl Storer for RedisStorer {
	async fn all(&self) -> Result<Vec<String>> {
		let mut conn = self.manager.clone();
		let pattern = if self.key_prefix.is_empty() {
			"*".to_string()
		} else {
			format!("{}:*", self.key_prefix)
		};

		let mut keys = Vec::new();
		let mut cursor: u64 = 0;
		loop {
			let (next_cursor, batch): (u64, Vec<String>) = redis::cmd("SCAN")
				.arg(cursor)
				.arg("MATCH")
				.arg(&pattern)
				.arg("COUNT")
				.arg(SCAN_BATCH_SIZE)
				.query_async(&mut conn)
				.await
				.map_err(SessionError::storage)
				.context("failed to scan session keys")?;

			keys.extend(batch.into_iter().map(|k| self.strip_key(k)));

			cursor = next_cursor;
			if cursor == 0 {
				break;
			}
		}

		Ok(keys)
	}

	async fn get(&self, key: &str) -> Result<String> {
		let mut conn = self.manager.clone();
		let value: Option<String> = conn
			.get(self.build_key(key))
			.await
			.map_err(SessionError::storage)
			.context("failed to get session")?;

		value.ok_or(SessionError::NoSession)
	}

	async fn set(&self, key: &str, value: &str) -> Result<()> {
		let mut conn = self.manager.clone();
		let mut cmd = redis::cmd("SET");
		cmd.arg(self.build_key(key)).arg(value);
		if !self.max_age.is_zero() {
			cmd.arg("PX").arg(self.ttl_millis());
		}

		let _: () = cmd
			.query_async(&mut conn)
			.await
			.map_err(SessionError::storage)
			.context("failed to set session")?;
		Ok(())
	}

	async fn del(&self, key: &str) -> Result<()> {
		let mut conn = self.manager.clone();
		let _: () = conn
			.del(self.build_key(key))
			.await
			.map_err(SessionError::storage)
			.context("failed to delete session")?;
		Ok(())
	}

	async fn reset_expiry(&self, key: &str) -> Result<()> {
		let mut conn = self.manager.clone();
		let full_key = self.build_key(key);
		let mut cmd = if self.max_age.is_zero() {
			redis::cmd("PERSIST")
		} else {
			redis::cmd("PEXPIRE")
		};
		cmd.arg(&full_key);
		if !self.max_age.is_zero() {
			cmd.arg(self.ttl_millis());
		}

		let _: i64 = cmd
			.query_async(&mut conn)
			.await
			.map_err(SessionError::storage)
			.context("failed to reset session expiry")?;
		Ok(())
	}
}
