//! Cache orchestrator - main entry point for read-through lookups.

use crate::convert::{self, Converter, ConverterRegistry};
use crate::error::{Error, Result};
use crate::group::FlightGroup;
use crate::shape::{IntoValue, Record, Slot, Value};
use crate::store::Store;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-call options.
///
/// Every call starts from the cache defaults (`expire` = the cache's default
/// expiration, negative caching off, no extra converters) and may adjust them
/// through the closure passed to [`Cache::get_with_options`].
///
/// # Example
///
/// ```ignore
/// use readthrough::shape::Value;
/// use std::time::Duration;
///
/// cache
///     .get_with_options("user:42", load_user, &mut user, |opts| {
///         opts.with_expire(Duration::from_secs(300))
///             .with_nil_expire(Duration::from_secs(30))
///             .with_nil_value(Value::from("none"));
///     })
///     .await?;
/// ```
#[derive(Clone, Debug)]
pub struct GetOptions {
    /// Lifetime of freshly produced values, before jitter.
    pub expire: Duration,

    /// Entry stored when the producer reports no data.
    ///
    /// `None` stores the zero value of the destination's shape.
    pub nil_value: Option<Value>,

    /// Lifetime of negative entries. Zero disables negative caching.
    pub nil_expire: Duration,

    /// Call-scoped converters, consulted before any other conversion path.
    pub converters: Vec<Converter>,

    /// How long this caller is willing to wait for the value to be produced.
    ///
    /// A caller that gives up gets `Error::Timeout`; the production itself
    /// is not interrupted.
    pub wait_timeout: Option<Duration>,
}

impl GetOptions {
    fn new(expire: Duration) -> Self {
        GetOptions {
            expire,
            nil_value: None,
            nil_expire: Duration::ZERO,
            converters: Vec::new(),
            wait_timeout: None,
        }
    }

    pub fn with_expire(&mut self, expire: Duration) -> &mut Self {
        self.expire = expire;
        self
    }

    pub fn with_nil_value(&mut self, value: Value) -> &mut Self {
        self.nil_value = Some(value);
        self
    }

    pub fn with_nil_expire(&mut self, expire: Duration) -> &mut Self {
        self.nil_expire = expire;
        self
    }

    pub fn with_converter(&mut self, converter: Converter) -> &mut Self {
        self.converters.push(converter);
        self
    }

    pub fn with_wait_timeout(&mut self, timeout: Duration) -> &mut Self {
        self.wait_timeout = Some(timeout);
        self
    }

    /// Whether absence should be written to the store.
    pub fn caches_absence(&self) -> bool {
        !self.nil_expire.is_zero()
    }

    /// # Errors
    ///
    /// Returns `Error::InvalidOption` if `expire` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.expire.is_zero() {
            return Err(Error::InvalidOption(
                "expire must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Lifetime for a freshly produced value: `expire` plus a random jitter in
/// `[0, expire / 10)`.
///
/// Spreading expirations keeps keys written together from expiring together.
/// Saturates at `Duration::MAX`.
pub fn jittered_ttl(expire: Duration) -> Duration {
    let window = u64::try_from(expire.as_nanos() / 10).unwrap_or(u64::MAX);
    if window == 0 {
        return expire;
    }
    expire.saturating_add(Duration::from_nanos(rand::rng().random_range(0..window)))
}

/// Read-through cache.
///
/// Looks keys up in a [`Store`]; on a miss runs the caller's producer once
/// per key across concurrent callers, writes the result back and converts it
/// into each caller's destination.
///
/// Cloning is cheap and clones share the store, converters and in-flight
/// executions.
///
/// # Example
///
/// ```no_run
/// use readthrough::{Cache, store::InMemoryStore};
/// use std::time::Duration;
///
/// #[tokio::main]
/// async fn main() -> readthrough::Result<()> {
///     let cache = Cache::new(InMemoryStore::new(), Duration::from_secs(60))?;
///
///     let mut answer: i64 = 0;
///     let used_cache = cache
///         .get("answer", || async { Ok(Some(42_i64)) }, &mut answer)
///         .await?;
///
///     assert!(!used_cache);
///     assert_eq!(answer, 42);
///     Ok(())
/// }
/// ```
pub struct Cache<S: Store> {
    store: Arc<S>,
    default_expire: Duration,
    converters: Arc<ConverterRegistry>,
    flights: Arc<FlightGroup<Option<Value>>>,
}

impl<S: Store> Clone for Cache<S> {
    fn clone(&self) -> Self {
        Cache {
            store: Arc::clone(&self.store),
            default_expire: self.default_expire,
            converters: Arc::clone(&self.converters),
            flights: Arc::clone(&self.flights),
        }
    }
}

impl<S: Store> Cache<S> {
    /// Create a cache over `store` with the default converters registered.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOption` if `default_expire` is zero.
    pub fn new(store: S, default_expire: Duration) -> Result<Self> {
        if default_expire.is_zero() {
            return Err(Error::InvalidOption(
                "default expire must be greater than zero".to_string(),
            ));
        }

        Ok(Cache {
            store: Arc::new(store),
            default_expire,
            converters: Arc::new(ConverterRegistry::with_defaults()),
            flights: Arc::new(FlightGroup::new()),
        })
    }

    /// Register a shared converter, replacing any earlier one for the same
    /// shape pair.
    ///
    /// Safe to call while lookups run; lookups that started earlier may not
    /// see it.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for a converter from a shape to itself,
    /// which native coercion would always shadow.
    pub fn register_converter(&self, converter: Converter) -> Result<()> {
        if converter.from_shape() == converter.to_shape() {
            return Err(Error::ConfigError(format!(
                "converter from {} to itself is never used",
                converter.from_shape()
            )));
        }
        self.converters.insert(converter);
        Ok(())
    }

    /// Register JSON decoders (text and bytes) for record type `T`.
    pub fn register_json<T>(&self) -> Result<()>
    where
        T: Record + DeserializeOwned,
    {
        for converter in Converter::json::<T>() {
            self.register_converter(converter)?;
        }
        Ok(())
    }

    /// Read `key` into `dst`, producing and storing it on a miss.
    ///
    /// Returns `true` when the value came from the store, `false` when the
    /// producer ran (including when it found no data).
    ///
    /// # Errors
    ///
    /// See [`Cache::get_with_options`].
    pub async fn get<D, P, Fut, V>(&self, key: &str, producer: P, dst: &mut D) -> Result<bool>
    where
        D: Slot,
        P: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
        V: IntoValue + Send + 'static,
    {
        self.get_with_options(key, producer, dst, |_| {}).await
    }

    /// Read `key` into `dst` with per-call options.
    ///
    /// # Algorithm
    ///
    /// 1. Probe the store. A present entry is converted into `dst` and
    ///    `Ok(true)` is returned without running the producer.
    /// 2. On a miss, run the producer once per key across all concurrent
    ///    callers and write its result with a jittered TTL.
    /// 3. If the producer has no data, write the negative entry (nil value
    ///    or the destination's zero value) when `nil_expire` is non-zero;
    ///    otherwise leave `dst` untouched.
    /// 4. Each caller converts the shared result into its own `dst`.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument`: empty key
    /// - `Error::InvalidOption`: zero `expire`
    /// - `Error::StoreGet` / `Error::StoreSet`: the store failed
    /// - any error returned by the producer, shared by all waiters
    /// - `Error::UnsupportedConversion` / `Error::Conversion`: the value
    ///   could not be written into `dst`
    /// - `Error::Timeout`: `wait_timeout` elapsed while waiting
    pub async fn get_with_options<D, P, Fut, V, O>(
        &self,
        key: &str,
        producer: P,
        dst: &mut D,
        configure: O,
    ) -> Result<bool>
    where
        D: Slot,
        P: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Option<V>>> + Send + 'static,
        V: IntoValue + Send + 'static,
        O: FnOnce(&mut GetOptions),
    {
        if key.is_empty() {
            return Err(Error::InvalidArgument(
                "key must not be empty".to_string(),
            ));
        }

        let mut opts = GetOptions::new(self.default_expire);
        configure(&mut opts);
        opts.validate()?;

        let timer = Instant::now();
        let target = dst.target_shape();

        if let Some(cached) = self
            .store
            .get(key)
            .await
            .map_err(|e| Error::StoreGet(Box::new(e)))?
        {
            debug!("✓ Cache HIT {} in {:?}", key, timer.elapsed());
            self.write_into(cached, dst, &opts)?;
            return Ok(true);
        }

        debug!("Cache MISS {}, running producer", key);

        let work = produce_and_store(
            Arc::clone(&self.store),
            key.to_string(),
            producer,
            &opts,
            target.zero(),
        );
        let flight = self.flights.run(key, work);
        let (result, joined) = match opts.wait_timeout {
            Some(limit) => tokio::time::timeout(limit, flight).await.map_err(|_| {
                Error::Timeout(format!("gave up on {} after {:?}", key, limit))
            })?,
            None => flight.await,
        };

        match result? {
            Some(value) => {
                debug!(
                    "✓ Produced {} in {:?} (joined: {})",
                    key,
                    timer.elapsed(),
                    joined
                );
                self.write_into(value, dst, &opts)?;
            }
            None => debug!("Producer found no data for {}", key),
        }

        Ok(false)
    }

    /// Delete `key` from the store.
    ///
    /// # Errors
    ///
    /// Returns the store's error unchanged.
    pub async fn del(&self, key: &str) -> Result<()> {
        self.store.delete(key).await
    }

    /// Get store reference (for advanced use).
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn default_expire(&self) -> Duration {
        self.default_expire
    }

    fn write_into<D: Slot>(&self, value: Value, dst: &mut D, opts: &GetOptions) -> Result<()> {
        let converted = convert::coerce(
            value,
            dst.target_shape(),
            &opts.converters,
            &self.converters,
        )?;
        dst.fill(converted)
    }
}

/// The miss path run once per key: produce, then store.
///
/// Resolves to `None` when the producer has no data and absence is not
/// cached; otherwise to the value that was written.
fn produce_and_store<S, P, Fut, V>(
    store: Arc<S>,
    key: String,
    producer: P,
    opts: &GetOptions,
    zero: Value,
) -> impl Future<Output = Result<Option<Value>>> + Send + 'static
where
    S: Store,
    P: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Option<V>>> + Send + 'static,
    V: IntoValue + Send + 'static,
{
    let expire = opts.expire;
    let nil_expire = opts.nil_expire;
    let caches_absence = opts.caches_absence();
    let nil_value = opts.nil_value.clone();

    async move {
        let (value, ttl) = match producer().await? {
            Some(produced) => (produced.into_value(), jittered_ttl(expire)),
            None if caches_absence => (nil_value.unwrap_or(zero), nil_expire),
            None => return Ok(None),
        };

        store
            .set(&key, value.clone(), ttl)
            .await
            .map_err(|e| Error::StoreSet(Box::new(e)))?;
        trace!("Stored {} for {:?}", key, ttl);

        Ok(Some(value))
    }
}
