//! # possessions
//!
//! Request-scoped HTTP sessions with a deferred commit.
//!
//! Handlers read the session loaded at the start of the request and queue
//! changes through the [`session`] facade. Nothing touches storage until the
//! response is about to start: the first header or body write commits every
//! queued change in one storer round-trip and adds the `Set-Cookie` header
//! before the status line leaves.
//!
//! ## Crates
//!
//! - [`possessions_core`]: session model, events, reduction, [`Storer`] contract
//! - [`possessions_storage`]: memory, disk and Redis storers
//! - [`possessions_http`]: response sinks, middleware, hyper service
//!
//! ## Feature Flags
//!
//! - `redis-backend` - [`RedisStorer`](possessions_storage::RedisStorer) and the `redis` settings backend
//! - `full` - everything above
//!
//! ## Quick Start
//!
//! ```rust
//! use async_trait::async_trait;
//! use bytes::Bytes;
//! use possessions::{session, Handler, MiddlewareChain, Request, ResponseBuffer, ResponseSink, Settings};
//! use std::sync::Arc;
//!
//! struct Greeter;
//!
//! #[async_trait]
//! impl Handler for Greeter {
//!     async fn handle(&self, request: Request, sink: &mut dyn ResponseSink) -> possessions::HttpResult<()> {
//!         let name = session::get(&request, "name").unwrap_or("stranger").to_string();
//!         session::set(sink, "name", "friend")?;
//!         sink.write(format!("hello, {name}").as_bytes()).await?;
//!         Ok(())
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let settings = Settings::from_toml_str(r#"
//!     [cookie]
//!     name = "sid"
//!     same_site = "lax"
//! "#)?;
//! let stack = settings.build().await?;
//! let app = MiddlewareChain::new(Arc::new(Greeter)).with_middleware(Arc::new(stack.middleware()));
//!
//! let mut response = ResponseBuffer::new();
//! app.handle(http::Request::new(Bytes::new()), &mut response).await?;
//! assert_eq!(response.body(), b"hello, stranger");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # }).unwrap();
//! ```

pub mod settings;

pub use possessions_core;
pub use possessions_http;
pub use possessions_storage;

// Re-export the commonly used types at the crate root
pub use possessions_core::{
	Clock, ErrorKind, Event, EventLog, MockClock, Result, Session, SessionError, Storer,
	SystemClock,
};
pub use possessions_http::{
	CommitAborted, CookieOptions, Error as HttpError, Handler, Middleware, MiddlewareChain,
	OverseeingMiddleware, Overseer, RefreshMiddleware, Request, ResponseBuffer, ResponseSink,
	Result as HttpResult, SameSite, SessionService, SessionWriter, StorageOverseer, session,
};
#[cfg(feature = "redis-backend")]
pub use possessions_storage::RedisStorer;
pub use possessions_storage::{Cleaner, DEFAULT_MAX_AGE, DiskStorer, MemoryStorer, Sweep};
pub use settings::{ConfigError, CookieSettings, SessionStack, Settings, StorageSettings};
