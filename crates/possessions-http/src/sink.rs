//! Response sinks
//!
//! A [`ResponseSink`] is what a [`Handler`](crate::Handler) writes its
//! response into: mutable headers, a status line and body bytes, plus two
//! optional capabilities. Sinks that wrap another sink must delegate both
//! [`ResponseSink::hijack`] and [`ResponseSink::event_log`] so the session
//! facade can find the event log through any number of wrappers.

use crate::error::{Error, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use possessions_core::EventLog;
use tokio::io::{AsyncRead, AsyncWrite};

/// A raw connection taken over from the HTTP server
pub trait Connection: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> Connection for T {}

/// Destination of a handler's response
#[async_trait]
pub trait ResponseSink: Send {
	/// Headers that will be sent with the status line
	fn headers(&self) -> &HeaderMap;

	fn headers_mut(&mut self) -> &mut HeaderMap;

	/// Send the status line and headers
	///
	/// Only the first call has an effect.
	async fn write_header(&mut self, status: StatusCode);

	/// Write body bytes, sending a `200 OK` status line first if none was sent
	async fn write(&mut self, buf: &[u8]) -> Result<usize>;

	/// Take over the underlying connection
	fn hijack(&mut self) -> Result<Box<dyn Connection>> {
		Err(Error::Unsupported("hijack"))
	}

	/// The session event log carried by this sink or one it wraps
	fn event_log(&mut self) -> Option<&mut EventLog> {
		None
	}
}

/// In-memory response sink
///
/// Headers are captured when the status line is written, so changes made
/// afterwards do not reach the client, as with a real connection.
///
/// # Examples
///
/// ```
/// use http::StatusCode;
/// use possessions_http::{ResponseBuffer, ResponseSink};
///
/// # tokio_test::block_on(async {
/// let mut buffer = ResponseBuffer::new();
/// buffer.write(b"hello").await.unwrap();
///
/// let response = buffer.into_response();
/// assert_eq!(response.status(), StatusCode::OK);
/// # });
/// ```
#[derive(Debug, Default)]
pub struct ResponseBuffer {
	headers: HeaderMap,
	sent: Option<(StatusCode, HeaderMap)>,
	body: BytesMut,
}

impl ResponseBuffer {
	pub fn new() -> Self {
		Self::default()
	}

	/// Status line sent so far
	pub fn status(&self) -> Option<StatusCode> {
		self.sent.as_ref().map(|(status, _)| *status)
	}

	/// Headers as sent with the status line, or the pending headers if none was sent
	pub fn sent_headers(&self) -> &HeaderMap {
		match &self.sent {
			Some((_, headers)) => headers,
			None => &self.headers,
		}
	}

	pub fn body(&self) -> &[u8] {
		&self.body
	}

	/// Build the response; a sink that never wrote anything becomes an empty `200 OK`
	pub fn into_response(self) -> http::Response<Full<Bytes>> {
		let (status, headers) = self.sent.unwrap_or((StatusCode::OK, self.headers));
		let mut response = http::Response::new(Full::new(self.body.freeze()));
		*response.status_mut() = status;
		*response.headers_mut() = headers;
		response
	}
}

#[async_trait]
impl ResponseSink for ResponseBuffer {
	fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	fn headers_mut(&mut self) -> &mut HeaderMap {
		&mut self.headers
	}

	async fn write_header(&mut self, status: StatusCode) {
		if let Some((sent, _)) = &self.sent {
			tracing::warn!(%sent, ignored = %status, "superfluous write_header call");
			return;
		}
		self.sent = Some((status, self.headers.clone()));
	}

	async fn write(&mut self, buf: &[u8]) -> Result<usize> {
		if self.sent.is_none() {
			self.write_header(StatusCode::OK).await;
		}
		self.body.extend_from_slice(buf);
		Ok(buf.len())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use http::header::{CONTENT_TYPE, HeaderValue};
	use rstest::rstest;

	#[rstest]
	#[tokio::test]
	async fn test_first_status_wins() {
		// Arrange
		let mut buffer = ResponseBuffer::new();

		// Act
		buffer.write_header(StatusCode::CREATED).await;
		buffer.write_header(StatusCode::NOT_FOUND).await;

		// Assert
		assert_eq!(buffer.status(), Some(StatusCode::CREATED));
	}

	#[rstest]
	#[tokio::test]
	async fn test_write_implies_ok() {
		let mut buffer = ResponseBuffer::new();

		let written = buffer.write(b"abc").await.unwrap();

		assert_eq!(written, 3);
		assert_eq!(buffer.status(), Some(StatusCode::OK));
		assert_eq!(buffer.body(), b"abc");
	}

	#[rstest]
	#[tokio::test]
	async fn test_headers_after_status_are_not_sent() {
		// Arrange
		let mut buffer = ResponseBuffer::new();
		buffer
			.headers_mut()
			.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
		buffer.write_header(StatusCode::OK).await;

		// Act
		buffer
			.headers_mut()
			.insert("x-late", HeaderValue::from_static("1"));
		let response = buffer.into_response();

		// Assert
		assert_eq!(response.headers().get(CONTENT_TYPE).unwrap(), "text/plain");
		assert!(response.headers().get("x-late").is_none());
	}

	#[rstest]
	fn test_unwritten_buffer_is_empty_ok() {
		let response = ResponseBuffer::new().into_response();
		assert_eq!(response.status(), StatusCode::OK);
	}

	#[rstest]
	fn test_default_capabilities() {
		let mut buffer = ResponseBuffer::new();
		assert!(matches!(buffer.hijack(), Err(Error::Unsupported("hijack"))));
		assert!(buffer.event_log().is_none());
	}
}
