//! TOML configuration for the session stack
//!
//! ```toml
//! [cookie]
//! name = "id"
//! max_age_secs = 3600
//! same_site = "lax"
//!
//! [storage]
//! backend = "disk"
//! path = "/var/lib/app/sessions"
//! max_age_secs = 172800
//! clean_interval_secs = 3600
//! ```
//!
//! Every field has a default, so an empty document yields an in-memory
//! stack with a two-day record lifetime.

use possessions_core::{SessionError, Storer};
use possessions_http::{CookieOptions, OverseeingMiddleware, SameSite, StorageOverseer};
use possessions_storage::{Cleaner, DEFAULT_MAX_AGE, DiskStorer, MemoryStorer};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading settings or building the stack
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("TOML error: {0}")]
	Toml(#[from] toml::de::Error),

	#[error(transparent)]
	Session(#[from] SessionError),

	#[error("missing setting `{0}`")]
	MissingField(&'static str),

	#[error("unknown session backend `{0}`")]
	UnknownBackend(String),
}

/// Root settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
	pub cookie: CookieSettings,
	pub storage: StorageSettings,
}

/// `[cookie]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieSettings {
	pub name: String,
	/// Cookie lifetime; unset or zero means a browser-session cookie
	pub max_age_secs: Option<u64>,
	pub secure: bool,
	pub http_only: bool,
	pub path: String,
	pub domain: Option<String>,
	pub same_site: Option<SameSite>,
}

impl Default for CookieSettings {
	fn default() -> Self {
		Self {
			name: "id".to_string(),
			max_age_secs: None,
			secure: true,
			http_only: true,
			path: "/".to_string(),
			domain: None,
			same_site: None,
		}
	}
}

impl CookieSettings {
	pub fn options(&self) -> CookieOptions {
		let mut options = CookieOptions::new(self.name.clone())
			.with_secure(self.secure)
			.with_http_only(self.http_only)
			.with_path(self.path.clone());
		if let Some(secs) = self.max_age_secs {
			options = options.with_max_age(Duration::from_secs(secs));
		}
		if let Some(domain) = &self.domain {
			options = options.with_domain(domain.clone());
		}
		if let Some(same_site) = self.same_site {
			options = options.with_same_site(same_site);
		}
		options
	}
}

/// `[storage]` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
	/// `memory`, `disk` or `redis`
	pub backend: String,
	/// Record lifetime; zero keeps records until deleted
	pub max_age_secs: u64,
	/// Sweep period for in-process backends; zero disables sweeping
	pub clean_interval_secs: u64,
	/// Upper bound for a single storer call
	pub timeout_ms: Option<u64>,
	/// Directory of the disk backend
	pub path: Option<PathBuf>,
	/// Connection URL of the redis backend
	pub url: Option<String>,
	pub key_prefix: Option<String>,
}

impl Default for StorageSettings {
	fn default() -> Self {
		Self {
			backend: "memory".to_string(),
			max_age_secs: DEFAULT_MAX_AGE.as_secs(),
			clean_interval_secs: 3600,
			timeout_ms: None,
			path: None,
			url: None,
			key_prefix: None,
		}
	}
}

impl StorageSettings {
	pub fn max_age(&self) -> Duration {
		Duration::from_secs(self.max_age_secs)
	}

	pub fn clean_interval(&self) -> Option<Duration> {
		(self.clean_interval_secs > 0).then(|| Duration::from_secs(self.clean_interval_secs))
	}

	async fn storer(&self) -> Result<(Arc<dyn Storer>, Option<Cleaner>), ConfigError> {
		match self.backend.as_str() {
			"memory" => {
				let storer = Arc::new(MemoryStorer::new(self.max_age()));
				let cleaner = self.clean_interval().map(|every| storer.spawn_cleaner(every));
				Ok((storer as Arc<dyn Storer>, cleaner))
			}
			"disk" => {
				let path = self.path.as_ref().ok_or(ConfigError::MissingField("storage.path"))?;
				let storer = Arc::new(DiskStorer::new(path, self.max_age())?);
				let cleaner = self.clean_interval().map(|every| storer.spawn_cleaner(every));
				Ok((storer as Arc<dyn Storer>, cleaner))
			}
			#[cfg(feature = "redis-backend")]
			"redis" => {
				let url = self.url.as_deref().ok_or(ConfigError::MissingField("storage.url"))?;
				let mut storer = possessions_storage::RedisStorer::new(url, self.max_age()).await?;
				if let Some(prefix) = &self.key_prefix {
					storer = storer.with_key_prefix(prefix.clone());
				}
				Ok((Arc::new(storer) as Arc<dyn Storer>, None))
			}
			other => Err(ConfigError::UnknownBackend(other.to_string())),
		}
	}
}

impl Settings {
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		Ok(toml::from_str(source)?)
	}

	pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let contents = std::fs::read_to_string(path.as_ref())?;
		Self::from_toml_str(&contents)
	}

	/// Build the storer and overseer described by these settings
	///
	/// In-process backends get a periodic [`Cleaner`], which runs on the
	/// current tokio runtime for as long as the returned stack lives.
	pub async fn build(&self) -> Result<SessionStack, ConfigError> {
		let (storer, cleaner) = self.storage.storer().await?;
		let mut overseer = StorageOverseer::new(self.cookie.options(), storer)?;
		if let Some(ms) = self.storage.timeout_ms {
			overseer = overseer.with_timeout(Duration::from_millis(ms));
		}

		tracing::debug!(
			backend = %self.storage.backend,
			cookie = %self.cookie.name,
			cleaner = cleaner.is_some(),
			"session stack built"
		);

		Ok(SessionStack {
			overseer: Arc::new(overseer),
			cleaner,
		})
	}
}

/// Overseer plus the background sweep feeding it
pub struct SessionStack {
	overseer: Arc<StorageOverseer>,
	cleaner: Option<Cleaner>,
}

impl SessionStack {
	pub fn overseer(&self) -> &Arc<StorageOverseer> {
		&self.overseer
	}

	pub fn cleaner(&self) -> Option<&Cleaner> {
		self.cleaner.as_ref()
	}

	/// Middleware committing sessions through this stack's overseer
	pub fn middleware(&self) -> OverseeingMiddleware {
		OverseeingMiddleware::new(self.overseer.clone())
	}
}
