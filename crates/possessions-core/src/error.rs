//! Session error types
//!
//! Every error carries an [`ErrorKind`]. Wrapping an error with
//! [`SessionError::context`] keeps the kind of the wrapped error, so callers
//! can branch on [`SessionError::is_no_session`] or
//! [`SessionError::is_no_map_key`] no matter how many layers added context.

use std::borrow::Cow;
use thiserror::Error;

/// Boxed error type used for backend failures
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for session operations
pub type Result<T, E = SessionError> = std::result::Result<T, E>;

/// Classification of a [`SessionError`]
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// No cookie, a malformed cookie, or a missing storage record
	NoSession,
	/// The requested session key is absent
	NoMapKey,
	/// The storage backend failed
	Storage,
	/// Stored or structured data could not be encoded or decoded
	Encoding,
	/// A storage call was cancelled or timed out
	Cancelled,
	/// Invalid configuration
	Configuration,
	/// The response sink carries no session event log
	NotOverseen,
}

/// Session errors
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SessionError {
	#[error("session does not exist")]
	NoSession,
	#[error("session map key does not exist")]
	NoMapKey,
	#[error("storage error: {0}")]
	Storage(#[source] BoxError),
	#[error("encoding error: {0}")]
	Encoding(#[from] serde_json::Error),
	#[error("operation cancelled: {0}")]
	Cancelled(String),
	#[error("invalid configuration: {0}")]
	Configuration(String),
	#[error("response sink is not wrapped by the session middleware")]
	NotOverseen,
	#[error("{context}: {source}")]
	Context {
		context: Cow<'static, str>,
		#[source]
		source: Box<SessionError>,
	},
}

impl SessionError {
	/// Wrap a backend failure
	pub fn storage(error: impl Into<BoxError>) -> Self {
		Self::Storage(error.into())
	}

	/// Add context while keeping the error kind
	///
	/// # Examples
	///
	/// ```
	/// use possessions_core::{ErrorKind, SessionError};
	///
	/// let err = SessionError::NoSession.context("failed to load session");
	/// assert_eq!(err.kind(), ErrorKind::NoSession);
	/// assert!(err.is_no_session());
	/// assert_eq!(err.to_string(), "failed to load session: session does not exist");
	/// ```
	pub fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
		Self::Context {
			context: context.into(),
			source: Box::new(self),
		}
	}

	/// The kind of this error, looking through any context layers
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::NoSession => ErrorKind::NoSession,
			Self::NoMapKey => ErrorKind::NoMapKey,
			Self::Storage(_) => ErrorKind::Storage,
			Self::Encoding(_) => ErrorKind::Encoding,
			Self::Cancelled(_) => ErrorKind::Cancelled,
			Self::Configuration(_) => ErrorKind::Configuration,
			Self::NotOverseen => ErrorKind::NotOverseen,
			Self::Context { source, .. } => source.kind(),
		}
	}

	/// True when the error means "there is no session"
	pub fn is_no_session(&self) -> bool {
		self.kind() == ErrorKind::NoSession
	}

	/// True when the error means "the session key is absent"
	pub fn is_no_map_key(&self) -> bool {
		self.kind() == ErrorKind::NoMapKey
	}
}

/// Context helpers for `Result<T, SessionError>`
pub trait ResultExt<T> {
	/// Wrap the error, if any, with a static context message
	fn context(self, context: &'static str) -> Result<T>;

	/// Wrap the error, if any, with a lazily built context message
	fn with_context<F>(self, f: F) -> Result<T>
	where
		F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
	fn context(self, context: &'static str) -> Result<T> {
		self.map_err(|e| e.context(context))
	}

	fn with_context<F>(self, f: F) -> Result<T>
	where
		F: FnOnce() -> String,
	{
		self.map_err(|e| e.context(f()))
	}
}
