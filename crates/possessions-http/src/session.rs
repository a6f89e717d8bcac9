//! Session facade for handlers
//!
//! Reads come from the [`Session`] attached to the request by
//! [`OverseeingMiddleware`](crate::OverseeingMiddleware). Writes queue an
//! [`Event`] in the event log carried by the response sink; nothing touches
//! storage until the response commits.
//!
//! ```rust
//! use async_trait::async_trait;
//! use possessions_http::{session, Handler, Request, ResponseSink, Result};
//!
//! struct Login;
//!
//! #[async_trait]
//! impl Handler for Login {
//!     async fn handle(&self, request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
//!         if session::get(&request, "user").is_none() {
//!             session::set(sink, "user", "alice")?;
//!             session::add_flash(sink, "notice", "welcome")?;
//!         }
//!         sink.write(b"ok").await?;
//!         Ok(())
//!     }
//! }
//! ```

use crate::sink::ResponseSink;
use possessions_core::{Event, Result, Session, SessionError, flash_key};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// The session attached to `request`, if the client has one
pub fn current<B>(request: &http::Request<B>) -> Option<&Session> {
	request.extensions().get::<Session>()
}

/// Raw value of `key`
pub fn get<'r, B>(request: &'r http::Request<B>, key: &str) -> Option<&'r str> {
	current(request)?.get(key)
}

/// JSON-decoded value of `key`
///
/// # Errors
///
/// [`SessionError::NoMapKey`] if the key is absent (or there is no
/// session), an encoding error if the value does not decode as `T`.
pub fn get_as<T: DeserializeOwned, B>(request: &http::Request<B>, key: &str) -> Result<T> {
	current(request)
		.ok_or(SessionError::NoMapKey)?
		.get_as(key)
}

/// Queue `key = value`
pub fn set(
	sink: &mut dyn ResponseSink,
	key: impl Into<String>,
	value: impl Into<String>,
) -> Result<()> {
	push(sink, Event::set(key, value))
}

/// Queue `key = value` with `value` encoded as JSON
pub fn set_as<T: Serialize + ?Sized>(
	sink: &mut dyn ResponseSink,
	key: impl Into<String>,
	value: &T,
) -> Result<()> {
	let encoded = serde_json::to_string(value)?;
	set(sink, key, encoded)
}

/// Queue removal of `key`
pub fn del(sink: &mut dyn ResponseSink, key: impl Into<String>) -> Result<()> {
	push(sink, Event::del(key))
}

/// Queue removal of every key except those in `keep`
pub fn del_all<I, S>(sink: &mut dyn ResponseSink, keep: I) -> Result<()>
where
	I: IntoIterator<Item = S>,
	S: Into<String>,
{
	push(sink, Event::del_all(keep))
}

/// Queue a lifetime extension of the session
pub fn refresh(sink: &mut dyn ResponseSink) -> Result<()> {
	push(sink, Event::Refresh)
}

/// Queue deletion of the client's session cookie
///
/// Destruction overrides every other event of the request.
pub fn destroy(sink: &mut dyn ResponseSink) -> Result<()> {
	push(sink, Event::DestroySession)
}

/// Queue a flash value, visible to the next request that reads it
pub fn add_flash(
	sink: &mut dyn ResponseSink,
	key: &str,
	value: impl Into<String>,
) -> Result<()> {
	set(sink, flash_key(key), value)
}

/// Queue a JSON-encoded flash value
pub fn add_flash_as<T: Serialize + ?Sized>(
	sink: &mut dyn ResponseSink,
	key: &str,
	value: &T,
) -> Result<()> {
	set_as(sink, flash_key(key), value)
}

/// Read a flash value and queue its removal
///
/// # Errors
///
/// [`SessionError::NoMapKey`] if there is no such flash value.
pub fn get_flash<B>(
	request: &http::Request<B>,
	sink: &mut dyn ResponseSink,
	key: &str,
) -> Result<String> {
	let key = flash_key(key);
	let value = get(request, &key).ok_or(SessionError::NoMapKey)?.to_string();
	del(sink, key)?;
	Ok(value)
}

/// Read and decode a JSON flash value and queue its removal
pub fn get_flash_as<T: DeserializeOwned, B>(
	request: &http::Request<B>,
	sink: &mut dyn ResponseSink,
	key: &str,
) -> Result<T> {
	let encoded = get_flash(request, sink, key)?;
	Ok(serde_json::from_str(&encoded)?)
}

fn push(sink: &mut dyn ResponseSink, event: Event) -> Result<()> {
	let log = sink.event_log().ok_or(SessionError::NotOverseen)?;
	log.push(event);
	Ok(())
}
