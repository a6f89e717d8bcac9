//! Session-committing response sink
//!
//! [`SessionWriter`] wraps the sink a handler writes to. It owns the
//! request's [`EventLog`] and commits it through the [`Overseer`] right
//! before the first status line or body byte leaves, so the session cookie
//! always makes it into the response headers.

use crate::error::{Error, Result};
use crate::overseer::Overseer;
use crate::sink::{Connection, ResponseSink};
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use possessions_core::{EventLog, Session, SessionError};
use std::fmt;
use std::sync::Arc;

/// Panic payload raised when the session cannot be committed from
/// [`ResponseSink::write_header`], which has no way to report an error
///
/// [`SessionService`](crate::SessionService) recognises this payload and
/// turns it into [`Error::CommitAborted`].
#[derive(Debug)]
pub struct CommitAborted(pub SessionError);

impl fmt::Display for CommitAborted {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "session commit failed: {}", self.0)
	}
}

impl std::error::Error for CommitAborted {
	fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
		Some(&self.0)
	}
}

/// Response sink that commits the session before the response starts
pub struct SessionWriter<'a> {
	inner: &'a mut dyn ResponseSink,
	overseer: Arc<dyn Overseer>,
	session: Option<Session>,
	log: EventLog,
	committed: bool,
	hijacked: bool,
}

impl<'a> SessionWriter<'a> {
	/// Wrap `inner` for a request whose session state is `session`
	pub fn new(
		inner: &'a mut dyn ResponseSink,
		overseer: Arc<dyn Overseer>,
		session: Option<Session>,
	) -> Self {
		Self {
			inner,
			overseer,
			session,
			log: EventLog::new(),
			committed: false,
			hijacked: false,
		}
	}

	/// The session read at the start of the request
	pub fn session(&self) -> Option<&Session> {
		self.session.as_ref()
	}

	pub fn is_committed(&self) -> bool {
		self.committed
	}

	/// Commit now if nothing was written
	///
	/// Call once the handler has returned; a handler that never writes
	/// still gets its session events persisted. A hijacked connection has
	/// no response to carry a cookie, so nothing is committed for it.
	pub async fn finish(&mut self) -> Result<(), SessionError> {
		if self.hijacked {
			tracing::debug!(events = self.log.len(), "connection hijacked, session not committed");
			return Ok(());
		}
		self.commit().await
	}

	async fn commit(&mut self) -> Result<(), SessionError> {
		if self.committed {
			return Ok(());
		}

		self.overseer
			.write_state(self.inner.headers_mut(), self.session.as_ref(), &self.log)
			.await?;
		self.committed = true;
		self.log.seal();
		Ok(())
	}
}

impl fmt::Debug for SessionWriter<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionWriter")
			.field("session", &self.session)
			.field("log", &self.log)
			.field("committed", &self.committed)
			.field("hijacked", &self.hijacked)
			.finish_non_exhaustive()
	}
}

#[async_trait]
impl<'a> ResponseSink for SessionWriter<'a> {
	fn headers(&self) -> &HeaderMap {
		self.inner.headers()
	}

	fn headers_mut(&mut self) -> &mut HeaderMap {
		self.inner.headers_mut()
	}

	/// # Panics
	///
	/// Panics with a [`CommitAborted`] payload if the session commit fails.
	async fn write_header(&mut self, status: StatusCode) {
		if let Err(error) = self.commit().await {
			tracing::error!(%error, %status, "session commit failed while writing headers");
			std::panic::panic_any(CommitAborted(error));
		}
		self.inner.write_header(status).await;
	}

	async fn write(&mut self, buf: &[u8]) -> Result<usize> {
		self.commit().await.map_err(Error::Session)?;
		self.inner.write(buf).await
	}

	fn hijack(&mut self) -> Result<Box<dyn Connection>> {
		let connection = self.inner.hijack()?;
		self.hijacked = true;
		Ok(connection)
	}

	fn event_log(&mut self) -> Option<&mut EventLog> {
		Some(&mut self.log)
	}
}
