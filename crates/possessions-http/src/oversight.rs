//! Session middleware

use crate::Request;
use crate::error::Result;
use crate::middleware::{Handler, Middleware};
use crate::overseer::Overseer;
use crate::session;
use crate::sink::ResponseSink;
use crate::writer::SessionWriter;
use async_trait::async_trait;
use possessions_core::ResultExt;
use std::sync::Arc;

/// Makes sessions available to the handlers it wraps
///
/// For each request it reads the session state, attaches the
/// [`Session`](possessions_core::Session) to the request extensions and
/// hands the next handler a [`SessionWriter`]. Events queued by a handler
/// that returns without writing are committed once it returns; a handler
/// error discards them.
#[derive(Clone)]
pub struct OverseeingMiddleware {
	overseer: Arc<dyn Overseer>,
}

impl OverseeingMiddleware {
	pub fn new(overseer: Arc<dyn Overseer>) -> Self {
		Self { overseer }
	}

	pub fn overseer(&self) -> &Arc<dyn Overseer> {
		&self.overseer
	}
}

#[async_trait]
impl Middleware for OverseeingMiddleware {
	async fn process(
		&self,
		mut request: Request,
		sink: &mut dyn ResponseSink,
		next: Arc<dyn Handler>,
	) -> Result<()> {
		let session = self
			.overseer
			.read_state(request.headers())
			.await
			.context("failed to read session state")?;

		if let Some(session) = &session {
			request.extensions_mut().insert(session.clone());
		}

		let mut writer = SessionWriter::new(sink, self.overseer.clone(), session);
		next.handle(request, &mut writer).await?;
		writer.finish().await?;
		Ok(())
	}
}

/// Refreshes the session on every request it sees
///
/// Place it inside an [`OverseeingMiddleware`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshMiddleware;

impl RefreshMiddleware {
	pub fn new() -> Self {
		Self
	}
}

#[async_trait]
impl Middleware for RefreshMiddleware {
	async fn process(
		&self,
		request: Request,
		sink: &mut dyn ResponseSink,
		next: Arc<dyn Handler>,
	) -> Result<()> {
		session::refresh(sink)?;
		next.handle(request, sink).await
	}
}
