//! hyper integration
//!
//! [`SessionService`] adapts a [`Handler`] to [`hyper::service::Service`]
//! so it can be served with `hyper::server::conn`.

use crate::Request;
use crate::error::Error;
use crate::middleware::Handler;
use crate::sink::ResponseBuffer;
use crate::writer::CommitAborted;
use bytes::Bytes;
use futures::FutureExt;
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::Service;
use possessions_core::BoxError;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;

type Response = http::Response<Full<Bytes>>;

/// hyper service running a [`Handler`] against a buffered response
///
/// Handler errors become `500 Internal Server Error` responses. A failed
/// session commit while headers were being written becomes
/// [`Error::CommitAborted`], which makes hyper drop the connection.
///
/// # Examples
///
/// ```no_run
/// use hyper::server::conn::http1;
/// use hyper_util::rt::TokioIo;
/// use possessions_http::{Handler, SessionService};
/// use std::sync::Arc;
/// use tokio::net::TcpListener;
///
/// # async fn serve(app: Arc<dyn Handler>) -> Result<(), Box<dyn std::error::Error>> {
/// let listener = TcpListener::bind("127.0.0.1:8080").await?;
/// loop {
///     let (stream, _) = listener.accept().await?;
///     let service = SessionService::new(app.clone());
///     tokio::spawn(async move {
///         let _ = http1::Builder::new()
///             .serve_connection(TokioIo::new(stream), service)
///             .await;
///     });
/// }
/// # }
/// ```
#[derive(Clone)]
pub struct SessionService {
	handler: Arc<dyn Handler>,
}

impl SessionService {
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self { handler }
	}

	/// Run the handler for an already collected request
	pub async fn respond(&self, request: Request) -> Result<Response, Error> {
		run(Arc::clone(&self.handler), request).await
	}
}

impl<B> Service<http::Request<B>> for SessionService
where
	B: Body + Send + 'static,
	B::Data: Send,
	B::Error: Into<BoxError>,
{
	type Response = Response;
	type Error = Error;
	type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

	fn call(&self, request: http::Request<B>) -> Self::Future {
		let handler = Arc::clone(&self.handler);
		Box::pin(async move {
			let (parts, body) = request.into_parts();
			let body = body
				.collect()
				.await
				.map_err(|e| Error::Body(e.into()))?
				.to_bytes();
			run(handler, http::Request::from_parts(parts, body)).await
		})
	}
}

async fn run(handler: Arc<dyn Handler>, request: Request) -> Result<Response, Error> {
	let method = request.method().clone();
	let path = request.uri().path().to_string();
	let mut buffer = ResponseBuffer::new();

	let outcome = AssertUnwindSafe(handler.handle(request, &mut buffer))
		.catch_unwind()
		.await;

	match outcome {
		Ok(Ok(())) => Ok(buffer.into_response()),
		Ok(Err(error)) => {
			tracing::error!(%method, %path, %error, "handler failed");
			Ok(internal_server_error())
		}
		Err(payload) => match payload.downcast::<CommitAborted>() {
			Ok(aborted) => {
				tracing::error!(%method, %path, error = %aborted.0, "response aborted");
				Err(Error::CommitAborted(aborted.0))
			}
			Err(payload) => std::panic::resume_unwind(payload),
		},
	}
}

fn internal_server_error() -> Response {
	let mut response = http::Response::new(Full::new(Bytes::from_static(b"Internal Server Error")));
	*response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
	response
}
