//! Periodic sweeping of expired records

use async_trait::async_trait;
use possessions_core::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// A storer that can drop its expired records on demand
#[async_trait]
pub trait Sweep: Send + Sync + 'static {
	/// Remove expired records, returning how many were removed
	async fn clean(&self) -> Result<usize>;
}

/// Handle to a background task that calls [`Sweep::clean`] on an interval
///
/// The task stops when the handle is dropped.
#[derive(Debug)]
pub struct Cleaner {
	handle: JoinHandle<()>,
	interval: Duration,
}

impl Cleaner {
	/// Spawn the sweeping task on the current tokio runtime
	///
	/// The first sweep happens one `interval` after spawning.
	///
	/// # Panics
	///
	/// Panics if `interval` is zero or if called outside a tokio runtime.
	pub fn spawn<S: Sweep>(storer: Arc<S>, interval: Duration) -> Self {
		let handle = tokio::spawn(async move {
			let mut ticker = tokio::time::interval(interval);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			// The first tick completes immediately.
			ticker.tick().await;

			loop {
				ticker.tick().await;
				match storer.clean().await {
					Ok(0) => {}
					Ok(removed) => tracing::debug!(removed, "swept expired sessions"),
					Err(error) => tracing::warn!(%error, "session sweep failed"),
				}
			}
		});

		Self { handle, interval }
	}

	pub fn interval(&self) -> Duration {
		self.interval
	}

	/// Stop the task now instead of on drop
	pub fn stop(self) {}

	pub fn is_finished(&self) -> bool {
		self.handle.is_finished()
	}
}

impl Drop for Cleaner {
	fn drop(&mut self) {
		self.handle.abort();
	}
}
