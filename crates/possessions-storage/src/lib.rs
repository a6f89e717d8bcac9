//! # possessions-storage
//!
//! [`Storer`](possessions_core::Storer) implementations.
//!
//! - [`MemoryStorer`]: process memory, swept by a [`Cleaner`]
//! - [`DiskStorer`]: one JSON file per session under a directory
//! - `RedisStorer`: Redis strings with native TTLs (feature `redis-backend`)
//!
//! In-process storers take a [`Clock`](possessions_core::Clock) so expiry
//! can be driven by a [`MockClock`](possessions_core::MockClock) in tests.

use std::time::Duration;

pub mod cleaner;
pub mod disk;
pub mod memory;

#[cfg(feature = "redis-backend")]
pub mod redis_backend;

pub use cleaner::{Cleaner, Sweep};
pub use disk::DiskStorer;
pub use memory::MemoryStorer;

#[cfg(feature = "redis-backend")]
pub use redis_backend::RedisStorer;

/// Record lifetime used by the `with_defaults` constructors
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(2 * 24 * 60 * 60);
