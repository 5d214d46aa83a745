//! Error types for the read-through cache.

use std::fmt;

use crate::shape::Shape;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the read-through cache.
///
/// Every error is returned to the immediate caller; nothing is retried or
/// swallowed inside the crate. `Error` is `Clone` because one failed
/// in-flight execution is handed to every caller waiting on the same key.
#[derive(Debug, Clone)]
pub enum Error {
    /// A call argument was rejected before the store was touched.
    ///
    /// Raised for an empty cache key.
    InvalidArgument(String),

    /// The effective per-call options are invalid.
    ///
    /// Raised when the resolved expiration is zero, both for
    /// `Cache::new` defaults and for values set through `GetOptions`.
    InvalidOption(String),

    /// Probing the store failed.
    ///
    /// Carries the store's own error unchanged as [`std::error::Error::source`].
    /// The call is aborted; the producer is never invoked.
    StoreGet(Box<Error>),

    /// Writing a freshly produced (or negative) entry failed.
    ///
    /// The whole call fails even though the producer succeeded: a caller must
    /// never believe a value was cached when it was not. Every waiter on the
    /// same key observes this error.
    StoreSet(Box<Error>),

    /// Backend storage error, raised by `Store` implementations.
    ///
    /// Common causes:
    /// - Connection lost
    /// - Network timeout
    /// - Backend protocol error
    Backend(String),

    /// The producer failed.
    ///
    /// Producers may return any `Error`; this variant is the conventional one
    /// for source-of-truth failures. A panicking producer is reported as
    /// `Producer` as well.
    Producer(String),

    /// No call-scoped converter, native coercion or registered converter
    /// matches the (source, destination) shape pair.
    UnsupportedConversion {
        /// Shape of the value that was retrieved or produced.
        from: Shape,
        /// Shape the destination asked for.
        to: Shape,
    },

    /// A matched conversion path failed.
    ///
    /// Common causes:
    /// - Malformed numeric or boolean text
    /// - Malformed JSON payload for a record
    /// - Numeric overflow into a narrow destination
    /// - Invalid UTF-8 when turning bytes into text
    ///
    /// The destination is left untouched.
    Conversion(String),

    /// A waiter gave up on an in-flight execution.
    ///
    /// The execution itself keeps running for the remaining waiters.
    Timeout(String),

    /// Invalid cache configuration, e.g. registering an unreachable converter.
    ConfigError(String),

    /// Generic error with custom message.
    Other(String),
}

impl Error {
    /// Re-label an arbitrary failure raised while converting a value.
    pub(crate) fn into_conversion(self) -> Error {
        match self {
            Error::Conversion(_) | Error::UnsupportedConversion { .. } => self,
            other => Error::Conversion(other.to_string()),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::InvalidOption(msg) => write!(f, "Invalid option: {}", msg),
            Error::StoreGet(inner) => write!(f, "Store get failed: {}", inner),
            Error::StoreSet(inner) => write!(f, "Store set failed: {}", inner),
            Error::Backend(msg) => write!(f, "Backend error: {}", msg),
            Error::Producer(msg) => write!(f, "Producer error: {}", msg),
            Error::UnsupportedConversion { from, to } => {
                write!(f, "Unsupported conversion from {} to {}", from, to)
            }
            Error::Conversion(msg) => write!(f, "Conversion error: {}", msg),
            Error::Timeout(msg) => write!(f, "Timeout: {}", msg),
            Error::ConfigError(msg) => write!(f, "Config error: {}", msg),
            Error::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::StoreGet(inner) | Error::StoreSet(inner) => Some(inner.as_ref()),
            _ => None,
        }
    }
}

// ============================================================================
// Conversions from other error types
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Conversion(e.to_string())
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Other(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Other(e.to_string())
    }
}
