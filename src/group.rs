//! Collapsing of concurrent executions per key.
//!
//! A [`FlightGroup`] makes sure that at most one execution per key is in
//! flight. Callers that arrive while an execution for their key is running
//! attach to it and receive a clone of its result (value or error).
//!
//! The execution runs as its own tokio task. Dropping a waiting caller (for
//! example on timeout) only stops that caller from waiting; the execution
//! finishes and every other waiter still gets the result.
//!
//! Results are not kept: once an execution completes, its key is released and
//! the next call starts a fresh execution.

use crate::error::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type SharedResult<T> = Shared<BoxFuture<'static, Result<T>>>;

/// One in-flight execution.
struct Flight<T: Clone> {
    id: u64,
    result: SharedResult<T>,
}

/// Per-key execution deduplication.
///
/// # Example
///
/// ```no_run
/// use readthrough::group::FlightGroup;
///
/// #[tokio::main]
/// async fn main() {
///     let group = FlightGroup::<u64>::new();
///     let (result, shared) = group.run("answer", async { Ok(42) }).await;
///     assert_eq!(result.unwrap(), 42);
///     assert!(!shared);
/// }
/// ```
pub struct FlightGroup<T: Clone> {
    flights: Arc<DashMap<String, Flight<T>>>,
    next_id: AtomicU64,
}

impl<T> FlightGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        FlightGroup {
            flights: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Run `work` for `key` unless an execution is already in flight, in
    /// which case wait for that one instead.
    ///
    /// Returns the execution's result and whether this caller joined an
    /// execution started by someone else. `work` is dropped unused when the
    /// caller joins.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn run<F>(&self, key: &str, work: F) -> (Result<T>, bool)
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (result, joined) = match self.flights.entry(key.to_string()) {
            Entry::Occupied(entry) => (entry.get().result.clone(), true),
            Entry::Vacant(entry) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let result = self.launch(key.to_string(), id, work);
                entry.insert(Flight {
                    id,
                    result: result.clone(),
                });
                (result, false)
            }
        };

        if joined {
            debug!("Joined in-flight execution for {}", key);
        }

        (result.await, joined)
    }

    /// Number of keys with an execution in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    fn launch<F>(&self, key: String, id: u64, work: F) -> SharedResult<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let release = Release {
            flights: Arc::clone(&self.flights),
            key,
            id,
        };
        let handle = tokio::spawn(async move {
            let _release = release;
            work.await
        });

        handle
            .map(|outcome| {
                outcome.unwrap_or_else(|e| {
                    Err(Error::Producer(format!("in-flight execution failed: {}", e)))
                })
            })
            .boxed()
            .shared()
    }
}

/// Releases a key when its execution ends, including by panic.
struct Release<T: Clone> {
    flights: Arc<DashMap<String, Flight<T>>>,
    key: String,
    id: u64,
}

impl<T: Clone> Drop for Release<T> {
    fn drop(&mut self) {
        // A later execution may already own the key; only release ours.
        self.flights.remove_if(&self.key, |_, flight| flight.id == self.id);
    }
}

impl<T> Default for FlightGroup<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
