//! Store abstraction consumed by the cache.

use crate::error::Result;
use crate::shape::Value;
use std::future::Future;
use std::time::Duration;

#[cfg(feature = "inmemory")]
pub mod inmemory;

#[cfg(feature = "inmemory")]
pub use inmemory::InMemoryStore;

/// Trait for key-value stores the cache reads through.
///
/// The store owns persistence and expiry. It is shape-agnostic: whatever
/// [`Value`] is handed to `set` is what `get` may later return, or the store
/// may hand back an encoded form (text, bytes) that the cache converts on the
/// way out.
///
/// **IMPORTANT:** All methods use `&self` so one store can serve concurrent
/// callers. Implementations should use interior mutability or external
/// storage.
///
/// **ASYNC:** Every method returns a `Send` future so the cache can drive
/// store writes from a spawned task. Implementations may use `async fn`.
pub trait Store: Send + Sync + 'static {
    /// Retrieve value by key.
    ///
    /// # Returns
    /// - `Ok(Some(value))` - Entry present
    /// - `Ok(None)` - No entry (absence is not an error)
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs (connection lost, etc.)
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Store value with a time-to-live.
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    fn set(&self, key: &str, value: Value, ttl: Duration)
        -> impl Future<Output = Result<()>> + Send;

    /// Remove value.
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;

    /// Check if key exists (optional optimization).
    ///
    /// # Errors
    /// Returns `Err` if a backend error occurs
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send {
        async move { Ok(self.get(key).await?.is_some()) }
    }
}
