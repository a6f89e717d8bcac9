//! HTTP layer errors

use possessions_core::{BoxError, SessionError};
use thiserror::Error;

/// Result alias for the HTTP layer
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while serving a request
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Session(#[from] SessionError),
	/// I/O on a hijacked connection
	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),
	#[error("failed to read request body: {0}")]
	Body(#[source] BoxError),
	#[error("{0} is not supported by the response sink")]
	Unsupported(&'static str),
	#[error("handler error: {0}")]
	Handler(#[source] BoxError),
	/// The session could not be committed while headers were being sent
	#[error("response aborted by failed session commit: {0}")]
	CommitAborted(#[source] SessionError),
}

impl Error {
	/// Wrap an application error raised by a handler
	pub fn handler(error: impl Into<BoxError>) -> Self {
		Self::Handler(error.into())
	}

	/// The session error behind this error, if any
	pub fn as_session_error(&self) -> Option<&SessionError> {
		match self {
			Self::Session(e) | Self::CommitAborted(e) => Some(e),
			_ => None,
		}
	}
}
