//! Handler and middleware traits
//!
//! Handlers write their response into a [`ResponseSink`] instead of
//! returning one, which lets middleware such as
//! [`OverseeingMiddleware`](crate::OverseeingMiddleware) intercept the
//! moment a response starts.
//!
//! ## Handler
//!
//! ```rust
//! use async_trait::async_trait;
//! use possessions_http::{Handler, Request, ResponseSink, Result};
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Handler for Hello {
//!     async fn handle(&self, _request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
//!         sink.write(b"Hello!").await?;
//!         Ok(())
//!     }
//! }
//! ```
//!
//! ## Middleware
//!
//! ```rust
//! use async_trait::async_trait;
//! use possessions_http::{Handler, Middleware, Request, ResponseSink, Result};
//! use std::sync::Arc;
//!
//! struct Logging;
//!
//! #[async_trait]
//! impl Middleware for Logging {
//!     async fn process(
//!         &self,
//!         request: Request,
//!         sink: &mut dyn ResponseSink,
//!         next: Arc<dyn Handler>,
//!     ) -> Result<()> {
//!         println!("Request: {} {}", request.method(), request.uri());
//!         next.handle(request, sink).await
//!     }
//! }
//! ```

use crate::Request;
use crate::error::Result;
use crate::sink::ResponseSink;
use async_trait::async_trait;
use std::sync::Arc;

/// Processes a request by writing a response into a sink
#[async_trait]
pub trait Handler: Send + Sync {
	/// # Errors
	///
	/// Returns an error if the request cannot be processed.
	async fn handle(&self, request: Request, sink: &mut dyn ResponseSink) -> Result<()>;
}

#[async_trait]
impl<T: Handler + ?Sized> Handler for Arc<T> {
	async fn handle(&self, request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
		(**self).handle(request, sink).await
	}
}

/// Wraps the next handler in the chain
#[async_trait]
pub trait Middleware: Send + Sync {
	/// Process a request, usually by calling `next` with the same or a wrapped sink
	async fn process(
		&self,
		request: Request,
		sink: &mut dyn ResponseSink,
		next: Arc<dyn Handler>,
	) -> Result<()>;

	/// Whether this middleware runs for `request`
	///
	/// Skipped middleware is left out of the chain entirely.
	fn should_continue(&self, _request: &Request) -> bool {
		true
	}
}

/// Composes middleware around a handler
///
/// Middleware runs in the order it was added; the first added is outermost.
pub struct MiddlewareChain {
	middlewares: Vec<Arc<dyn Middleware>>,
	handler: Arc<dyn Handler>,
}

impl MiddlewareChain {
	pub fn new(handler: Arc<dyn Handler>) -> Self {
		Self {
			middlewares: Vec::new(),
			handler,
		}
	}

	/// Add a middleware using the builder pattern
	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middlewares.push(middleware);
		self
	}

	pub fn add_middleware(&mut self, middleware: Arc<dyn Middleware>) {
		self.middlewares.push(middleware);
	}
}

#[async_trait]
impl Handler for MiddlewareChain {
	async fn handle(&self, request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
		let mut current: Arc<dyn Handler> = self.handler.clone();

		for middleware in self
			.middlewares
			.iter()
			.rev()
			.filter(|mw| mw.should_continue(&request))
		{
			current = Arc::new(ComposedHandler {
				middleware: middleware.clone(),
				next: current,
			});
		}

		current.handle(request, sink).await
	}
}

struct ComposedHandler {
	middleware: Arc<dyn Middleware>,
	next: Arc<dyn Handler>,
}

#[async_trait]
impl Handler for ComposedHandler {
	async fn handle(&self, request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
		self.middleware
			.process(request, sink, self.next.clone())
			.await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::sink::ResponseBuffer;
	use bytes::Bytes;
	use rstest::rstest;

	struct Body(&'static str);

	#[async_trait]
	impl Handler for Body {
		async fn handle(&self, _request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
			sink.write(self.0.as_bytes()).await?;
			Ok(())
		}
	}

	struct Prefix {
		text: &'static str,
		only_path: Option<&'static str>,
	}

	#[async_trait]
	impl Middleware for Prefix {
		async fn process(
			&self,
			request: Request,
			sink: &mut dyn ResponseSink,
			next: Arc<dyn Handler>,
		) -> Result<()> {
			sink.write(self.text.as_bytes()).await?;
			next.handle(request, sink).await
		}

		fn should_continue(&self, request: &Request) -> bool {
			self.only_path.is_none_or(|path| request.uri().path() == path)
		}
	}

	fn request(path: &str) -> Request {
		http::Request::builder().uri(path).body(Bytes::new()).unwrap()
	}

	#[rstest]
	#[tokio::test]
	async fn test_chain_without_middleware() {
		let chain = MiddlewareChain::new(Arc::new(Body("hi")));
		let mut buffer = ResponseBuffer::new();

		chain.handle(request("/"), &mut buffer).await.unwrap();

		assert_eq!(buffer.body(), b"hi");
	}

	#[rstest]
	#[tokio::test]
	async fn test_middleware_order() {
		// Arrange
		let chain = MiddlewareChain::new(Arc::new(Body("handler")))
			.with_middleware(Arc::new(Prefix {
				text: "outer,",
				only_path: None,
			}))
			.with_middleware(Arc::new(Prefix {
				text: "inner,",
				only_path: None,
			}));
		let mut buffer = ResponseBuffer::new();

		// Act
		chain.handle(request("/"), &mut buffer).await.unwrap();

		// Assert
		assert_eq!(buffer.body(), b"outer,inner,handler");
	}

	#[rstest]
	#[case::matching("/admin", "admin,handler")]
	#[case::skipped("/", "handler")]
	#[tokio::test]
	async fn test_should_continue_skips_middleware(#[case] path: &str, #[case] expected: &str) {
		let mut chain = MiddlewareChain::new(Arc::new(Body("handler")));
		chain.add_middleware(Arc::new(Prefix {
			text: "admin,",
			only_path: Some("/admin"),
		}));
		let mut buffer = ResponseBuffer::new();

		chain.handle(request(path), &mut buffer).await.unwrap();

		assert_eq!(buffer.body(), expected.as_bytes());
	}
}
