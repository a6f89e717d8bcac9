//! Storage contract for session records

use crate::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Key/value store holding one JSON record per session id
///
/// Implementations must be safe for concurrent use by many requests.
/// Concurrent writes to the same key may resolve as last-write-wins.
#[async_trait]
pub trait Storer: Send + Sync {
	/// All keys currently held by the store
	async fn all(&self) -> Result<Vec<String>>;

	/// Fetch the record for `key`
	///
	/// # Errors
	///
	/// Returns [`SessionError::NoSession`](crate::SessionError::NoSession)
	/// when the key does not exist or has expired.
	async fn get(&self, key: &str) -> Result<String>;

	/// Store `value` under `key`, (re)applying the configured max-age
	async fn set(&self, key: &str, value: &str) -> Result<()>;

	/// Remove `key`; removing a missing key is not an error
	async fn del(&self, key: &str) -> Result<()>;

	/// Restart the expiry of `key` without rewriting its value
	async fn reset_expiry(&self, key: &str) -> Result<()>;
}

#[async_trait]
impl<T: Storer + ?Sized> Storer for Arc<T> {
	async fn all(&self) -> Result<Vec<String>> {
		(**self).all().await
	}

	async fn get(&self, key: &str) -> Result<String> {
		(**self).get(key).await
	}

	async fn set(&self, key: &str, value: &str) -> Result<()> {
		(**self).set(key, value).await
	}

	async fn del(&self, key: &str) -> Result<()> {
		(**self).del(key).await
	}

	async fn reset_expiry(&self, key: &str) -> Result<()> {
		(**self).reset_expiry(key).await
	}
}
