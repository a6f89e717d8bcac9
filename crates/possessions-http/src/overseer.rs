//! Reading and committing session state
//!
//! An [`Overseer`] turns request headers into a [`Session`] at the start of
//! a request and, when the response commits, folds the request's
//! [`EventLog`] back into storage and the response's `Set-Cookie` header.

use crate::cookie::CookieOptions;
use async_trait::async_trait;
use http::HeaderMap;
use http::header::SET_COOKIE;
use possessions_core::{
	EventLog, Reduction, Result, ResultExt, Session, SessionError, Storer, Values, encode_values,
	is_valid_session_id, new_session_id, reduce,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Reads session state from requests and writes it to responses
#[async_trait]
pub trait Overseer: Send + Sync {
	/// Load the session named by the request, if there is one
	///
	/// A missing or malformed cookie, or a record the storer no longer
	/// holds, is `Ok(None)`.
	async fn read_state(&self, headers: &HeaderMap) -> Result<Option<Session>>;

	/// Persist the outcome of `log` and set the response cookie
	async fn write_state(
		&self,
		headers: &mut HeaderMap,
		session: Option<&Session>,
		log: &EventLog,
	) -> Result<()>;
}

#[async_trait]
impl<T: Overseer + ?Sized> Overseer for Arc<T> {
	async fn read_state(&self, headers: &HeaderMap) -> Result<Option<Session>> {
		(**self).read_state(headers).await
	}

	async fn write_state(
		&self,
		headers: &mut HeaderMap,
		session: Option<&Session>,
		log: &EventLog,
	) -> Result<()> {
		(**self).write_state(headers, session, log).await
	}
}

/// Overseer keeping session values in a [`Storer`] and the id in a cookie
///
/// # Examples
///
/// ```
/// use possessions_http::{CookieOptions, StorageOverseer};
/// use possessions_storage::MemoryStorer;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let overseer = StorageOverseer::new(
///     CookieOptions::new("sid"),
///     Arc::new(MemoryStorer::default()),
/// )
/// .unwrap()
/// .with_timeout(Duration::from_secs(2));
///
/// assert!(StorageOverseer::new(CookieOptions::new(""), Arc::new(MemoryStorer::default())).is_err());
/// ```
pub struct StorageOverseer {
	storer: Arc<dyn Storer>,
	options: CookieOptions,
	timeout: Option<Duration>,
}

impl std::fmt::Debug for StorageOverseer {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("StorageOverseer")
			.field("options", &self.options)
			.field("timeout", &self.timeout)
			.finish_non_exhaustive()
	}
}

impl StorageOverseer {
	/// # Errors
	///
	/// Returns a configuration error if `options` has an empty or invalid
	/// cookie name.
	pub fn new(options: CookieOptions, storer: Arc<dyn Storer>) -> Result<Self> {
		options.validate()?;
		Ok(Self {
			storer,
			options,
			timeout: None,
		})
	}

	/// Bound every storer call; a call that runs over fails as cancelled
	pub fn with_timeout(mut self, timeout: Duration) -> Self {
		self.timeout = Some(timeout);
		self
	}

	pub fn options(&self) -> &CookieOptions {
		&self.options
	}

	pub fn storer(&self) -> &Arc<dyn Storer> {
		&self.storer
	}

	async fn bounded<T>(
		&self,
		operation: &'static str,
		call: impl Future<Output = Result<T>> + Send,
	) -> Result<T> {
		match self.timeout {
			None => call.await,
			Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| {
				SessionError::Cancelled(format!("storer {operation} exceeded {limit:?}"))
			})?,
		}
	}
}

#[async_trait]
impl Overseer for StorageOverseer {
	async fn read_state(&self, headers: &HeaderMap) -> Result<Option<Session>> {
		let Some(id) = self.options.cookie_value(headers) else {
			tracing::debug!("no session cookie");
			return Ok(None);
		};

		if !is_valid_session_id(&id) {
			tracing::debug!("ignoring malformed session cookie");
			return Ok(None);
		}

		let encoded = match self.bounded("get", self.storer.get(&id)).await {
			Ok(encoded) => encoded,
			Err(e) if e.is_no_session() => {
				tracing::debug!(session_id = %id, "session record not found");
				return Ok(None);
			}
			Err(e) => return Err(e.context("failed to load session")),
		};

		let session = Session::from_json(id, &encoded).context("failed to decode session")?;
		tracing::debug!(session_id = %session.id(), "session loaded");
		Ok(Some(session))
	}

	async fn write_state(
		&self,
		headers: &mut HeaderMap,
		session: Option<&Session>,
		log: &EventLog,
	) -> Result<()> {
		if log.destroys_session() {
			headers.append(SET_COOKIE, self.options.deletion_cookie()?);
			tracing::debug!(
				session_id = session.map(Session::id),
				"session destroyed, cookie deleted"
			);
			return Ok(());
		}

		let is_new = session.is_none();
		let (id, values) = match session {
			Some(session) => (session.id().to_string(), session.values().clone()),
			None => (new_session_id(), Values::new()),
		};

		let Reduction { values, refresh } = reduce(values, log, is_new);

		let encoded = encode_values(&values).context("failed to encode session values")?;
		self.bounded("set", self.storer.set(&id, &encoded))
			.await
			.context("failed to store session values")?;

		if refresh {
			self.bounded("reset_expiry", self.storer.reset_expiry(&id))
				.await
				.context("failed to refresh session")?;
		}

		if is_new || refresh {
			headers.append(SET_COOKIE, self.options.make_cookie(&id)?);
		}

		tracing::debug!(
			session_id = %id,
			events = log.len(),
			is_new,
			refresh,
			"session committed"
		);
		Ok(())
	}
}
