//! # readthrough
//!
//! A cache-aside read-through helper for any key-value store.
//!
//! ## Features
//!
//! - **Read-through:** Return the stored value, or produce, store and return it
//! - **Request coalescing:** Concurrent misses on one key run the producer once
//! - **Negative caching:** Optionally remember that a key has no data
//! - **Shape coercion:** Stored text, bytes or numbers are converted into the
//!   type the caller asks for, with pluggable converters
//! - **Stampede jitter:** Fresh entries get a randomized TTL
//! - **Store agnostic:** Bring any backend implementing [`Store`]
//!
//! ## Quick Start
//!
//! ```ignore
//! use readthrough::{Cache, store::InMemoryStore};
//! use std::time::Duration;
//!
//! let cache = Cache::new(InMemoryStore::new(), Duration::from_secs(600))?;
//!
//! let mut balance: f64 = 0.0;
//! let used_cache = cache
//!     .get("balance:42", || async { Ok(Some(load_balance(42).await?)) }, &mut balance)
//!     .await?;
//! ```
//!
//! ## Per-call options
//!
//! ```ignore
//! use readthrough::{convert::Converter, shape::Value};
//!
//! let mut enabled = false;
//! cache
//!     .get_with_options("flag:beta", load_flag, &mut enabled, |opts| {
//!         opts.with_nil_expire(Duration::from_secs(30))
//!             .with_converter(Converter::new(|s: String| match s.as_str() {
//!                 "yes" => Ok(true),
//!                 "no" => Ok(false),
//!                 other => Err(format!("unexpected flag {}", other)),
//!             }));
//!     })
//!     .await?;
//! ```

#[macro_use]
extern crate log;

pub mod cache;
pub mod convert;
pub mod error;
pub mod group;
pub mod shape;
pub mod store;

// Re-exports for convenience
pub use cache::{jittered_ttl, Cache, GetOptions};
pub use convert::{Converter, ConverterRegistry};
pub use error::{Error, Result};
pub use group::FlightGroup;
pub use shape::{IntoValue, Record, Shape, Shaped, Slot, Value};
pub use store::Store;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
