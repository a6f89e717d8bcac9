//! File system session storer
//!
//! Each record is one JSON file named after its key, holding the value and
//! its absolute expiry. Files are replaced atomically through a temporary
//! file and a rename.

use crate::DEFAULT_MAX_AGE;
use crate::cleaner::{Cleaner, Sweep};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use possessions_core::clock::add_duration;
use possessions_core::{Clock, Result, ResultExt, SessionError, Storer, SystemClock};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::fs;

const RECORD_EXTENSION: &str = "json";

/// Temporary files older than this are left over from an interrupted write
const STALE_TMP_AGE: Duration = Duration::from_secs(60);

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
	expires_at: Option<DateTime<Utc>>,
	value: String,
}

impl Envelope {
	fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expires_at.is_some_and(|at| at <= now)
	}
}

/// Session storer keeping one file per record under a directory
#[derive(Debug)]
pub struct DiskStorer<C: Clock = SystemClock> {
	dir: PathBuf,
	max_age: Duration,
	clock: C,
}

impl DiskStorer<SystemClock> {
	/// Create a storer rooted at `dir`, creating the directory if needed
	///
	/// A zero `max_age` keeps records until they are deleted.
	pub fn new(dir: impl Into<PathBuf>, max_age: Duration) -> Result<Self> {
		Self::with_clock(dir, max_age, SystemClock)
	}

	/// Storer with the default two-day max-age
	pub fn with_defaults(dir: impl Into<PathBuf>) -> Result<Self> {
		Self::new(dir, DEFAULT_MAX_AGE)
	}
}

impl<C: Clock> DiskStorer<C> {
	pub fn with_clock(dir: impl Into<PathBuf>, max_age: Duration, clock: C) -> Result<Self> {
		let dir = dir.into();
		std::fs::create_dir_all(&dir)
			.map_err(SessionError::storage)
			.with_context(|| format!("failed to create session directory {}", dir.display()))?;

		if !dir.is_dir() {
			return Err(SessionError::Configuration(format!(
				"session path is not a directory: {}",
				dir.display()
			)));
		}

		Ok(Self {
			dir,
			max_age,
			clock,
		})
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn max_age(&self) -> Duration {
		self.max_age
	}

	/// Remove expired records, and temporary files left by interrupted writes
	///
	/// Returns the number of records removed.
	pub async fn clean(&self) -> Result<usize> {
		let now = self.clock.now();
		let mut removed = 0;

		let orphans = self.remove_stale_tmp_files().await?;
		if orphans > 0 {
			tracing::debug!(orphans, dir = %self.dir.display(), "removed stale temporary files");
		}

		for key in self.list_keys().await? {
			let path = self.record_path(&key)?;
			match self.read_envelope(&path).await {
				Ok(Some(envelope)) if envelope.is_expired(now) => {
					remove_if_exists(&path).await?;
					removed += 1;
				}
				Ok(_) => {}
				Err(error) => tracing::warn!(key = %key, %error, "skipping unreadable session file"),
			}
		}

		Ok(removed)
	}

	/// Sweep expired records every `interval` until the returned handle is dropped
	pub fn spawn_cleaner(self: &Arc<Self>, interval: Duration) -> Cleaner {
		Cleaner::spawn(Arc::clone(self), interval)
	}

	fn record_path(&self, key: &str) -> Result<PathBuf> {
		if !is_safe_key(key) {
			return Err(SessionError::storage(io::Error::new(
				io::ErrorKind::InvalidInput,
				format!("invalid session key: {key:?}"),
			)));
		}
		Ok(self.dir.join(format!("{key}.{RECORD_EXTENSION}")))
	}

	fn expiry_from_now(&self) -> Option<DateTime<Utc>> {
		if self.max_age.is_zero() {
			None
		} else {
			Some(add_duration(self.clock.now(), self.max_age))
		}
	}

	async fn list_keys(&self) -> Result<Vec<String>> {
		let mut keys = Vec::new();
		let mut entries = fs::read_dir(&self.dir).await.map_err(SessionError::storage)?;

		while let Some(entry) = entries.next_entry().await.map_err(SessionError::storage)? {
			let path = entry.path();
			if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXTENSION) {
				continue;
			}
			if let Some(key) = path.file_stem().and_then(|s| s.to_str())
				&& is_safe_key(key)
			{
				keys.push(key.to_string());
			}
		}

		Ok(keys)
	}

	async fn remove_stale_tmp_files(&self) -> Result<usize> {
		let mut removed = 0;
		let mut entries = fs::read_dir(&self.dir).await.map_err(SessionError::storage)?;

		while let Some(entry) = entries.next_entry().await.map_err(SessionError::storage)? {
			let name = entry.file_name();
			if !name.to_str().is_some_and(is_tmp_name) {
				continue;
			}
			let modified = match entry.metadata().await.and_then(|m| m.modified()) {
				Ok(modified) => modified,
				Err(error) => {
					tracing::warn!(file = ?name, %error, "cannot stat temporary file");
					continue;
				}
			};
			let age = SystemTime::now().duration_since(modified).unwrap_or_default();
			if age >= STALE_TMP_AGE {
				remove_if_exists(&entry.path()).await?;
				removed += 1;
			}
		}

		Ok(removed)
	}

	async fn read_envelope(&self, path: &Path) -> Result<Option<Envelope>> {
		match fs::read(path).await {
			Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
			Err(e) => Err(SessionError::storage(e)),
		}
	}

	async fn write_envelope(&self, path: &Path, envelope: &Envelope) -> Result<()> {
		let bytes = serde_json::to_vec(envelope)?;
		let tmp = self.dir.join(format!(".{}.tmp", uuid::Uuid::new_v4()));

		fs::write(&tmp, &bytes).await.map_err(SessionError::storage)?;
		if let Err(e) = fs::rename(&tmp, path).await {
			let _ = fs::remove_file(&tmp).await;
			return Err(SessionError::storage(e));
		}
		Ok(())
	}
}

#[async_trait]
impl<C: Clock> Storer for DiskStorer<C> {
	async fn all(&self) -> Result<Vec<String>> {
		let now = self.clock.now();
		let mut live = Vec::new();

		for key in self.list_keys().await? {
			let path = self.record_path(&key)?;
			match self.read_envelope(&path).await {
				Ok(Some(envelope)) if !envelope.is_expired(now) => live.push(key),
				Ok(_) => {}
				Err(error) => tracing::warn!(key = %key, %error, "skipping unreadable session file"),
			}
		}

		Ok(live)
	}

	async fn get(&self, key: &str) -> Result<String> {
		let path = self.record_path(key)?;
		match self.read_envelope(&path).await? {
			Some(envelope) if !envelope.is_expired(self.clock.now()) => Ok(envelope.value),
			_ => Err(SessionError::NoSession),
		}
	}

	async fn set(&self, key: &str, value: &str) -> Result<()> {
		let path = self.record_path(key)?;
		let envelope = Envelope {
			expires_at: self.expiry_from_now(),
			value: value.to_string(),
		};
		self.write_envelope(&path, &envelope).await
	}

	async fn del(&self, key: &str) -> Result<()> {
		let path = self.record_path(key)?;
		remove_if_exists(&path).await
	}

	async fn reset_expiry(&self, key: &str) -> Result<()> {
		let path = self.record_path(key)?;
		let Some(mut envelope) = self.read_envelope(&path).await? else {
			return Ok(());
		};
		if envelope.is_expired(self.clock.now()) {
			return Ok(());
		}

		envelope.expires_at = self.expiry_from_now();
		self.write_envelope(&path, &envelope).await
	}
}

#[async_trait]
impl<C: Clock> Sweep for DiskStorer<C> {
	async fn clean(&self) -> Result<usize> {
		DiskStorer::clean(self).await
	}
}

/// Keys become file names, so only a conservative character set is allowed
fn is_safe_key(key: &str) -> bool {
	!key.is_empty()
		&& !key.starts_with('.')
		&& key
			.bytes()
			.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

// Names produced by `write_envelope`
fn is_tmp_name(name: &str) -> bool {
	name.starts_with('.') && name.ends_with(".tmp")
}

async fn remove_if_exists(path: &Path) -> Result<()> {
	match fs::remove_file(path).await {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(SessionError::storage(e)),
	}
}
