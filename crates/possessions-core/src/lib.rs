//! # possessions-core
//!
//! Core types of the deferred-commit session engine.
//!
//! During a request, application code never touches storage directly. It
//! reads an immutable [`Session`] snapshot and queues [`Event`]s in an
//! [`EventLog`]. When the response commits, the log is [`reduce`]d against
//! the snapshot and the result is written through a [`Storer`].
//!
//! ## Quick Start
//!
//! ```rust
//! use possessions_core::{reduce, Event, EventLog, Session};
//!
//! let session = Session::from_json(
//!     "816a1acb-73aa-4a75-bbeb-f371bdad40e8",
//!     r#"{"user":"alice","theme":"dark"}"#,
//! )
//! .unwrap();
//!
//! let mut log = EventLog::new();
//! log.push(Event::set("theme", "light"));
//! log.push(Event::del("user"));
//!
//! let (_, values) = session.into_parts();
//! let reduction = reduce(values, &log, false);
//! assert_eq!(reduction.values.get("theme").map(String::as_str), Some("light"));
//! assert!(!reduction.values.contains_key("user"));
//! ```

pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod reduce;
pub mod session;
pub mod storer;

pub use clock::{Clock, MockClock, SystemClock};
pub use error::{BoxError, ErrorKind, Result, ResultExt, SessionError};
pub use event::{Event, EventLog, FLASH_PREFIX, flash_key};
pub use id::{SESSION_ID_LEN, is_valid_session_id, new_session_id};
pub use reduce::{Reduction, reduce};
pub use session::{Session, Values, encode_values};
pub use storer::Storer;
