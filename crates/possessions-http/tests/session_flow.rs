//! Request flows through the session middleware against real storers

use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use http::header::{COOKIE, SET_COOKIE};
use http_body_util::Full;
use hyper::service::Service;
use possessions_core::{ErrorKind, EventLog, MockClock, SessionError, Storer, is_valid_session_id};
use possessions_http::{
	Connection, CookieOptions, Error, Handler, Middleware, MiddlewareChain, OverseeingMiddleware,
	Request, ResponseBuffer, ResponseSink, Result, SessionService, StorageOverseer, session,
};
use possessions_storage::MemoryStorer;
use rstest::{fixture, rstest};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

const MAX_AGE: Duration = Duration::from_secs(60);

/// Memory storer that counts writes and can be switched to failing
struct CountingStorer {
	inner: MemoryStorer<MockClock>,
	sets: AtomicUsize,
	resets: AtomicUsize,
	dels: AtomicUsize,
	fail_writes: bool,
	fail_reads: bool,
}

impl CountingStorer {
	fn new(clock: MockClock) -> Self {
		Self {
			inner: MemoryStorer::with_clock(MAX_AGE, clock),
			sets: AtomicUsize::new(0),
			resets: AtomicUsize::new(0),
			dels: AtomicUsize::new(0),
			fail_writes: false,
			fail_reads: false,
		}
	}

	fn writes(&self) -> usize {
		self.sets.load(Ordering::SeqCst)
			+ self.resets.load(Ordering::SeqCst)
			+ self.dels.load(Ordering::SeqCst)
	}
}

#[async_trait]
impl Storer for CountingStorer {
	async fn all(&self) -> possessions_core::Result<Vec<String>> {
		self.inner.all().await
	}

	async fn get(&self, key: &str) -> possessions_core::Result<String> {
		if self.fail_reads {
			return Err(SessionError::storage(std::io::Error::other("connection reset")));
		}
		self.inner.get(key).await
	}

	async fn set(&self, key: &str, value: &str) -> possessions_core::Result<()> {
		self.sets.fetch_add(1, Ordering::SeqCst);
		if self.fail_writes {
			return Err(SessionError::storage(std::io::Error::other("read-only replica")));
		}
		self.inner.set(key, value).await
	}

	async fn del(&self, key: &str) -> possessions_core::Result<()> {
		self.dels.fetch_add(1, Ordering::SeqCst);
		self.inner.del(key).await
	}

	async fn reset_expiry(&self, key: &str) -> possessions_core::Result<()> {
		self.resets.fetch_add(1, Ordering::SeqCst);
		self.inner.reset_expiry(key).await
	}
}

/// Handler running synchronous facade calls, then optionally writing a body
struct Script<F> {
	run: F,
	body: Option<&'static [u8]>,
}

#[async_trait]
impl<F> Handler for Script<F>
where
	F: Fn(&Request, &mut dyn ResponseSink) -> Result<()> + Send + Sync,
{
	async fn handle(&self, request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
		(self.run)(&request, sink)?;
		if let Some(body) = self.body {
			sink.write(body).await?;
		}
		Ok(())
	}
}

fn script<F>(run: F) -> Arc<dyn Handler>
where
	F: Fn(&Request, &mut dyn ResponseSink) -> Result<()> + Send + Sync + 'static,
{
	Arc::new(Script {
		run,
		body: Some(b"ok"),
	})
}

struct Harness {
	clock: MockClock,
	storer: Arc<CountingStorer>,
}

impl Harness {
	fn app(&self, handler: Arc<dyn Handler>) -> MiddlewareChain {
		let overseer = StorageOverseer::new(CookieOptions::default(), self.storer.clone()).unwrap();
		MiddlewareChain::new(handler).with_middleware(Arc::new(OverseeingMiddleware::new(Arc::new(overseer))))
	}

	async fn send(&self, handler: Arc<dyn Handler>, cookie: Option<&str>) -> ResponseBuffer {
		let mut builder = http::Request::builder().uri("/");
		if let Some(id) = cookie {
			builder = builder.header(COOKIE, format!("id={id}"));
		}
		let request = builder.body(Bytes::new()).unwrap();
		let mut buffer = ResponseBuffer::new();
		self.app(handler).handle(request, &mut buffer).await.unwrap();
		buffer
	}
}

#[fixture]
fn harness() -> Harness {
	let clock = MockClock::default();
	Harness {
		storer: Arc::new(CountingStorer::new(clock.clone())),
		clock,
	}
}

fn set_cookies(buffer: &ResponseBuffer) -> Vec<String> {
	buffer
		.sent_headers()
		.get_all(SET_COOKIE)
		.iter()
		.map(|v| v.to_str().unwrap().to_string())
		.collect()
}

fn cookie_id(set_cookie: &str) -> String {
	set_cookie
		.split(';')
		.next()
		.and_then(|pair| pair.strip_prefix("id="))
		.unwrap()
		.to_string()
}

#[rstest]
#[tokio::test]
async fn test_new_visitor_gets_one_record_and_one_cookie(harness: Harness) {
	// Arrange
	let handler = script(|_, sink| Ok(session::set(sink, "k", "v")?));

	// Act
	let response = harness.send(handler, None).await;

	// Assert
	let keys = harness.storer.all().await.unwrap();
	assert_eq!(keys.len(), 1);
	let cookies = set_cookies(&response);
	assert_eq!(cookies.len(), 1);
	let id = cookie_id(&cookies[0]);
	assert!(is_valid_session_id(&id));
	assert_eq!(keys[0], id);
	assert_eq!(harness.storer.get(&id).await.unwrap(), r#"{"k":"v"}"#);
	assert_eq!(response.body(), b"ok");
}

#[rstest]
#[tokio::test]
async fn test_del_and_refresh_on_existing_session(harness: Harness) {
	// Arrange
	let id = "816a1acb-73aa-4a75-bbeb-f371bdad40e8";
	harness.storer.inner.set(id, r#"{"k":"v"}"#).await.unwrap();
	harness.clock.advance(Duration::from_secs(50));
	let handler = script(|_, sink| {
		session::del(sink, "k")?;
		session::refresh(sink)?;
		Ok(())
	});

	// Act
	let response = harness.send(handler, Some(id)).await;
	harness.clock.advance(Duration::from_secs(50));

	// Assert
	assert_eq!(harness.storer.get(id).await.unwrap(), "{}");
	assert_eq!(harness.storer.resets.load(Ordering::SeqCst), 1);
	let cookies = set_cookies(&response);
	assert_eq!(cookies.len(), 1);
	assert_eq!(cookie_id(&cookies[0]), id);
	assert_eq!(harness.storer.all().await.unwrap(), vec![id.to_string()]);
}

#[rstest]
#[tokio::test]
async fn test_flash_is_seen_exactly_once(harness: Harness) {
	// Arrange
	let seen: Arc<Mutex<Vec<std::result::Result<String, ErrorKind>>>> = Arc::default();
	let add = script(|_, sink| Ok(session::add_flash(sink, "msg", "hi")?));
	let read = {
		let seen = Arc::clone(&seen);
		script(move |request, sink| {
			let flash = session::get_flash(request, sink, "msg").map_err(|e| e.kind());
			seen.lock().unwrap().push(flash);
			Ok(())
		})
	};

	// Act
	let first = harness.send(add, None).await;
	let id = cookie_id(&set_cookies(&first)[0]);
	harness.send(read.clone(), Some(&id)).await;
	harness.send(read, Some(&id)).await;

	// Assert
	assert_eq!(
		*seen.lock().unwrap(),
		vec![Ok("hi".to_string()), Err(ErrorKind::NoMapKey)]
	);
}

#[rstest]
#[tokio::test]
async fn test_commit_happens_once_per_response(harness: Harness) {
	struct Chatty;

	#[async_trait]
	impl Handler for Chatty {
		async fn handle(&self, _request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
			session::set(sink, "a", "1")?;
			sink.write_header(StatusCode::OK).await;
			sink.write(b"one").await?;
			session::refresh(sink)?;
			sink.write(b"two").await?;
			Ok(())
		}
	}

	let response = harness.send(Arc::new(Chatty), None).await;

	assert_eq!(harness.storer.sets.load(Ordering::SeqCst), 1);
	assert_eq!(harness.storer.writes(), 1);
	assert_eq!(response.body(), b"onetwo");
}

#[rstest]
#[tokio::test]
async fn test_destroy_deletes_cookie_and_leaves_storage_alone(harness: Harness) {
	// Arrange
	let id = "816a1acb-73aa-4a75-bbeb-f371bdad40e8";
	harness.storer.inner.set(id, r#"{"k":"v"}"#).await.unwrap();
	let handler = script(|_, sink| {
		session::set(sink, "k", "changed")?;
		session::destroy(sink)?;
		Ok(())
	});

	// Act
	let response = harness.send(handler, Some(id)).await;

	// Assert
	assert_eq!(harness.storer.writes(), 0);
	assert_eq!(harness.storer.get(id).await.unwrap(), r#"{"k":"v"}"#);
	let cookies = set_cookies(&response);
	assert_eq!(cookies.len(), 1);
	assert!(cookies[0].starts_with("id=;"));
	assert!(cookies[0].contains("Max-Age=0"));
}

#[rstest]
#[tokio::test]
async fn test_unknown_cookie_starts_a_new_session(harness: Harness) {
	let stale = "816a1acb-73aa-4a75-bbeb-f371bdad40e8";
	let handler = script(|request, sink| {
		assert!(session::current(request).is_none());
		Ok(session::set(sink, "k", "v")?)
	});

	let response = harness.send(handler, Some(stale)).await;

	let id = cookie_id(&set_cookies(&response)[0]);
	assert_ne!(id, stale);
}

#[rstest]
#[tokio::test]
async fn test_structured_values_round_trip(harness: Harness) {
	// Arrange
	let write = script(|_, sink| Ok(session::set_as(sink, "cart", &vec![3u32, 5, 8])?));
	let seen: Arc<Mutex<Option<Vec<u32>>>> = Arc::default();
	let read = {
		let seen = Arc::clone(&seen);
		script(move |request, _| {
			*seen.lock().unwrap() = Some(session::get_as(request, "cart")?);
			Ok(())
		})
	};

	// Act
	let first = harness.send(write, None).await;
	let id = cookie_id(&set_cookies(&first)[0]);
	harness.send(read, Some(&id)).await;

	// Assert
	assert_eq!(*seen.lock().unwrap(), Some(vec![3, 5, 8]));
	assert_eq!(harness.storer.get(&id).await.unwrap(), r#"{"cart":"[3,5,8]"}"#);
}

/// Sink wrapper that counts body bytes and forwards everything else
struct ByteCounter<'a> {
	inner: &'a mut dyn ResponseSink,
	bytes: Arc<AtomicUsize>,
	delegate_log: bool,
}

#[async_trait]
impl<'a> ResponseSink for ByteCounter<'a> {
	fn headers(&self) -> &http::HeaderMap {
		self.inner.headers()
	}

	fn headers_mut(&mut self) -> &mut http::HeaderMap {
		self.inner.headers_mut()
	}

	async fn write_header(&mut self, status: StatusCode) {
		self.inner.write_header(status).await
	}

	async fn write(&mut self, buf: &[u8]) -> Result<usize> {
		let written = self.inner.write(buf).await?;
		self.bytes.fetch_add(written, Ordering::SeqCst);
		Ok(written)
	}

	fn event_log(&mut self) -> Option<&mut EventLog> {
		if self.delegate_log {
			self.inner.event_log()
		} else {
			None
		}
	}
}

struct CountBytes {
	bytes: Arc<AtomicUsize>,
	delegate_log: bool,
}

#[async_trait]
impl Middleware for CountBytes {
	async fn process(
		&self,
		request: Request,
		sink: &mut dyn ResponseSink,
		next: Arc<dyn Handler>,
	) -> Result<()> {
		let mut counter = ByteCounter {
			inner: sink,
			bytes: Arc::clone(&self.bytes),
			delegate_log: self.delegate_log,
		};
		next.handle(request, &mut counter).await
	}
}

#[rstest]
#[case::delegating(true)]
#[case::opaque(false)]
#[tokio::test]
async fn test_facade_reaches_log_through_wrapping_sink(harness: Harness, #[case] delegate_log: bool) {
	// Arrange
	let bytes = Arc::new(AtomicUsize::new(0));
	let handler = script(|_, sink| Ok(session::set(sink, "k", "v")?));
	let app = harness.app(handler).with_middleware(Arc::new(CountBytes {
		bytes: Arc::clone(&bytes),
		delegate_log,
	}));
	let mut buffer = ResponseBuffer::new();

	// Act
	let outcome = app.handle(http::Request::new(Bytes::new()), &mut buffer).await;

	// Assert
	if delegate_log {
		outcome.unwrap();
		assert_eq!(bytes.load(Ordering::SeqCst), 2);
		let id = harness.storer.all().await.unwrap().remove(0);
		assert_eq!(harness.storer.get(&id).await.unwrap(), r#"{"k":"v"}"#);
	} else {
		let err = outcome.unwrap_err();
		assert_eq!(
			err.as_session_error().map(SessionError::kind),
			Some(ErrorKind::NotOverseen)
		);
		assert!(harness.storer.all().await.unwrap().is_empty());
	}
}

/// Sink whose connection can be taken over
struct Upgradable {
	buffer: ResponseBuffer,
	connection: Option<DuplexStream>,
}

#[async_trait]
impl ResponseSink for Upgradable {
	fn headers(&self) -> &http::HeaderMap {
		self.buffer.headers()
	}

	fn headers_mut(&mut self) -> &mut http::HeaderMap {
		self.buffer.headers_mut()
	}

	async fn write_header(&mut self, status: StatusCode) {
		self.buffer.write_header(status).await
	}

	async fn write(&mut self, buf: &[u8]) -> Result<usize> {
		self.buffer.write(buf).await
	}

	fn hijack(&mut self) -> Result<Box<dyn Connection>> {
		let connection = self.connection.take().ok_or(Error::Unsupported("hijack"))?;
		Ok(Box::new(connection))
	}
}

struct TakeOver;

#[async_trait]
impl Handler for TakeOver {
	async fn handle(&self, _request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
		session::set(sink, "k", "v")?;
		let mut connection = sink.hijack()?;
		connection.write_all(b"raw bytes").await?;
		Ok(())
	}
}

#[rstest]
#[tokio::test]
async fn test_hijack_passes_through_without_commit(harness: Harness) {
	// Arrange
	let (server, mut client) = tokio::io::duplex(64);
	let mut sink = Upgradable {
		buffer: ResponseBuffer::new(),
		connection: Some(server),
	};

	// Act
	harness
		.app(Arc::new(TakeOver))
		.handle(http::Request::new(Bytes::new()), &mut sink)
		.await
		.unwrap();

	// Assert
	let mut received = [0u8; 9];
	client.read_exact(&mut received).await.unwrap();
	assert_eq!(&received, b"raw bytes");
	assert_eq!(harness.storer.writes(), 0);
	assert!(sink.buffer.headers().get(SET_COOKIE).is_none());
}

#[rstest]
#[tokio::test]
async fn test_hijack_unsupported_by_plain_buffer(harness: Harness) {
	let mut buffer = ResponseBuffer::new();

	let err = harness
		.app(Arc::new(TakeOver))
		.handle(http::Request::new(Bytes::new()), &mut buffer)
		.await
		.unwrap_err();

	assert!(matches!(err, Error::Unsupported("hijack")));
}

fn failing_service(fail_writes: bool, fail_reads: bool, handler: Arc<dyn Handler>) -> SessionService {
	let mut storer = CountingStorer::new(MockClock::default());
	storer.fail_writes = fail_writes;
	storer.fail_reads = fail_reads;
	let overseer = StorageOverseer::new(CookieOptions::default(), Arc::new(storer)).unwrap();
	let app = MiddlewareChain::new(handler).with_middleware(Arc::new(OverseeingMiddleware::new(Arc::new(overseer))));
	SessionService::new(Arc::new(app))
}

#[rstest]
#[tokio::test]
async fn test_commit_failure_on_header_write_aborts_response() {
	struct Created;

	#[async_trait]
	impl Handler for Created {
		async fn handle(&self, _request: Request, sink: &mut dyn ResponseSink) -> Result<()> {
			sink.write_header(StatusCode::CREATED).await;
			Ok(())
		}
	}

	let service = failing_service(true, false, Arc::new(Created));

	let err = service
		.call(http::Request::new(Full::new(Bytes::new())))
		.await
		.unwrap_err();

	match err {
		Error::CommitAborted(cause) => assert_eq!(cause.kind(), ErrorKind::Storage),
		other => panic!("expected an aborted response, got {other:?}"),
	}
}

#[rstest]
#[tokio::test]
async fn test_commit_failure_on_body_write_is_500() {
	let handler = script(|_, sink| Ok(session::set(sink, "k", "v")?));
	let service = failing_service(true, false, handler);

	let response = service
		.call(http::Request::new(Full::new(Bytes::new())))
		.await
		.unwrap();

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
	assert!(response.headers().get(SET_COOKIE).is_none());
}

#[rstest]
#[tokio::test]
async fn test_storage_error_on_read_is_500() {
	let handler = script(|_, _| Ok(()));
	let service = failing_service(false, true, handler);
	let request = http::Request::builder()
		.header(COOKIE, "id=816a1acb-73aa-4a75-bbeb-f371bdad40e8")
		.body(Full::new(Bytes::new()))
		.unwrap();

	let response = service.call(request).await.unwrap();

	assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_get_distinct_sessions(harness: Harness) {
	// Arrange
	let handler = script(|_, sink| Ok(session::set(sink, "k", "v")?));
	let service = SessionService::new(Arc::new(harness.app(handler)));

	// Act
	let mut tasks = Vec::new();
	for _ in 0..32 {
		let service = service.clone();
		tasks.push(tokio::spawn(async move {
			service
				.call(http::Request::new(Full::new(Bytes::new())))
				.await
				.unwrap()
		}));
	}
	let mut ids = Vec::new();
	for task in tasks {
		let response = task.await.unwrap();
		let cookie = response.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
		ids.push(cookie_id(cookie));
	}

	// Assert
	ids.sort();
	ids.dedup();
	assert_eq!(ids.len(), 32);
	assert_eq!(harness.storer.all().await.unwrap().len(), 32);
}
