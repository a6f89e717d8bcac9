//! # possessions-http
//!
//! Request-scoped sessions with a deferred commit.
//!
//! [`OverseeingMiddleware`] loads the session before the handler runs and
//! wraps the response sink in a [`SessionWriter`]. Handlers call the
//! [`session`] facade, which only queues events. The writer commits them
//! through a [`StorageOverseer`] right before the first header or body byte
//! is written, so the `Set-Cookie` header always precedes the response.
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use possessions_http::{
//!     session, CookieOptions, Handler, MiddlewareChain, OverseeingMiddleware, Request,
//!     ResponseBuffer, ResponseSink, Result, StorageOverseer,
//! };
//! use possessions_storage::MemoryStorer;
//! use std::sync::Arc;
//!
//! struct Counter;
//!
//! #[async_trait]
//! impl Handler for Counter {
//!     async fn handle(&self, request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
//!         let visits: u32 = session::get_as(&request, "visits").unwrap_or(0);
//!         session::set_as(sink, "visits", &(visits + 1))?;
//!         sink.write(format!("visit {}", visits + 1).as_bytes()).await?;
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let overseer = StorageOverseer::new(CookieOptions::new("sid"), Arc::new(MemoryStorer::default()))?;
//! let app = MiddlewareChain::new(Arc::new(Counter))
//!     .with_middleware(Arc::new(OverseeingMiddleware::new(Arc::new(overseer))));
//!
//! let mut response = ResponseBuffer::new();
//! app.handle(http::Request::new(Bytes::new()), &mut response).await?;
//! assert!(response.sent_headers().contains_key(http::header::SET_COOKIE));
//! # Ok::<(), possessions_http::Error>(())
//! # }).unwrap();
//! ```

pub mod cookie;
pub mod error;
pub mod middleware;
pub mod overseer;
pub mod oversight;
pub mod service;
pub mod session;
pub mod sink;
pub mod writer;

pub use cookie::{CookieOptions, SameSite};
pub use error::{Error, Result};
pub use middleware::{Handler, Middleware, MiddlewareChain};
pub use overseer::{Overseer, StorageOverseer};
pub use oversight::{OverseeingMiddleware, RefreshMiddleware};
pub use service::SessionService;
pub use sink::{Connection, ResponseBuffer, ResponseSink};
pub use writer::{CommitAborted, SessionWriter};

/// Request type seen by handlers: the body is collected up front
pub type Request = http::Request<bytes::Bytes>;
