//! Conversion between value shapes.
//!
//! When a retrieved value does not have the shape its destination asks for,
//! a conversion path is resolved in this order (first match wins):
//!
//! 1. **Call-scoped converters** passed through `GetOptions::with_converter`
//! 2. **Native coercion**: identity, numeric casts, text <-> bytes
//! 3. **Registered converters** held by the cache's [`ConverterRegistry`]
//!
//! Matching is by exact (source, destination) shape pair only. Converters are
//! never chained.
//!
//! # Example
//!
//! ```
//! use readthrough::convert::Converter;
//! use readthrough::shape::Shape;
//!
//! let yes_no = Converter::new(|text: String| match text.as_str() {
//!     "yes" => Ok(true),
//!     "no" => Ok(false),
//!     other => Err(format!("not yes/no: {}", other)),
//! });
//!
//! assert_eq!(yes_no.from_shape(), Shape::Text);
//! assert_eq!(yes_no.to_shape(), Shape::Bool);
//! ```

use crate::error::{Error, Result};
use crate::shape::{IntoValue, Record, Shape, Shaped, Value};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

/// Type alias for a conversion function.
type ConvertFn = dyn Fn(&Value) -> Result<Value> + Send + Sync;

/// A conversion from one shape to another.
///
/// Cloning is cheap: the function is shared.
#[derive(Clone)]
pub struct Converter {
    from: Shape,
    to: Shape,
    func: Arc<ConvertFn>,
}

impl Converter {
    /// Typed converter; the shape pair comes from `S` and `D`.
    pub fn new<S, D, E, F>(func: F) -> Self
    where
        S: Shaped,
        D: Shaped,
        E: Display,
        F: Fn(S) -> std::result::Result<D, E> + Send + Sync + 'static,
    {
        Converter {
            from: S::shape(),
            to: D::shape(),
            func: Arc::new(move |value: &Value| {
                let source = S::from_value(value.clone())?;
                func(source)
                    .map(IntoValue::into_value)
                    .map_err(|e| Error::Conversion(e.to_string()))
            }),
        }
    }

    /// Converter between explicit shapes working on raw values.
    pub fn dynamic<F>(from: Shape, to: Shape, func: F) -> Self
    where
        F: Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    {
        Converter {
            from,
            to,
            func: Arc::new(func),
        }
    }

    /// JSON decoders for record type `T`, one from text and one from bytes.
    pub fn json<T>() -> [Converter; 2]
    where
        T: Record + DeserializeOwned,
    {
        [
            Converter::new(|text: String| serde_json::from_str::<T>(&text)),
            Converter::new(|bytes: Vec<u8>| serde_json::from_slice::<T>(&bytes)),
        ]
    }

    pub fn from_shape(&self) -> Shape {
        self.from
    }

    pub fn to_shape(&self) -> Shape {
        self.to
    }

    fn matches(&self, from: Shape, to: Shape) -> bool {
        self.from == from && self.to == to
    }

    /// Run the conversion and check the result has the declared shape.
    ///
    /// # Errors
    ///
    /// Returns `Error::Conversion` if the function fails or produces a value
    /// of another shape.
    pub fn apply(&self, value: &Value) -> Result<Value> {
        let converted = (self.func)(value).map_err(Error::into_conversion)?;
        if converted.shape() != self.to {
            return Err(Error::Conversion(format!(
                "converter {} -> {} produced {}",
                self.from,
                self.to,
                converted.shape()
            )));
        }
        Ok(converted)
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Converter({} -> {})", self.from, self.to)
    }
}

/// Shared converters keyed by (source, destination) shape.
///
/// Backed by `DashMap`, so registering while lookups are in progress is safe;
/// a registration becomes visible to lookups that start after it returns.
/// Registering everything before serving traffic keeps results predictable.
pub struct ConverterRegistry {
    converters: DashMap<(Shape, Shape), Converter>,
}

impl ConverterRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        ConverterRegistry {
            converters: DashMap::new(),
        }
    }

    /// Registry preloaded with the text/bytes parsers for
    /// bool, int, uint and float.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        for converter in default_converters() {
            registry.insert(converter);
        }
        registry
    }

    /// Add a converter, replacing any earlier one for the same pair.
    pub fn insert(&self, converter: Converter) {
        debug!("Registered converter {} -> {}", converter.from, converter.to);
        self.converters.insert((converter.from, converter.to), converter);
    }

    /// Exact-pair lookup.
    pub fn get(&self, from: Shape, to: Shape) -> Option<Converter> {
        self.converters
            .get(&(from, to))
            .map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.converters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.converters.is_empty()
    }
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Convert `value` into `target`.
///
/// # Errors
///
/// - `Error::UnsupportedConversion` if no path exists
/// - `Error::Conversion` if the matched path fails
pub fn coerce(
    value: Value,
    target: Shape,
    overrides: &[Converter],
    registry: &ConverterRegistry,
) -> Result<Value> {
    let source = value.shape();

    if let Some(converter) = overrides.iter().find(|c| c.matches(source, target)) {
        trace!("Converting {} -> {} with call-scoped converter", source, target);
        return converter.apply(&value);
    }

    if can_coerce_natively(source, target) {
        return coerce_natively(value, target);
    }

    if let Some(converter) = registry.get(source, target) {
        trace!("Converting {} -> {} with registered converter", source, target);
        return converter.apply(&value);
    }

    Err(Error::UnsupportedConversion {
        from: source,
        to: target,
    })
}

/// Whether the host casting rules connect the two shapes.
pub fn can_coerce_natively(from: Shape, to: Shape) -> bool {
    from == to
        || (from.is_numeric() && to.is_numeric())
        || matches!(
            (from, to),
            (Shape::Text, Shape::Bytes) | (Shape::Bytes, Shape::Text)
        )
}

fn coerce_natively(value: Value, target: Shape) -> Result<Value> {
    if value.shape() == target {
        return Ok(value);
    }

    let converted = match (value, target) {
        (Value::Int(v), Shape::Uint) => Value::Uint(v as u64),
        (Value::Int(v), Shape::Float) => Value::Float(v as f64),
        (Value::Uint(v), Shape::Int) => Value::Int(v as i64),
        (Value::Uint(v), Shape::Float) => Value::Float(v as f64),
        (Value::Float(v), Shape::Int) => Value::Int(v as i64),
        (Value::Float(v), Shape::Uint) => Value::Uint(v as u64),
        (Value::Text(v), Shape::Bytes) => Value::Bytes(v.into_bytes()),
        (Value::Bytes(v), Shape::Text) => Value::Text(
            String::from_utf8(v).map_err(|e| Error::Conversion(e.to_string()))?,
        ),
        (value, target) => {
            return Err(Error::UnsupportedConversion {
                from: value.shape(),
                to: target,
            })
        }
    };

    Ok(converted)
}

/// Boolean text as accepted by the default converters.
pub fn parse_bool(text: &str) -> Result<bool> {
    match text {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(Error::Conversion(format!(
            "invalid boolean text: {:?}",
            other
        ))),
    }
}

fn parse<T>(text: &str) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    text.parse::<T>()
        .map_err(|e| Error::Conversion(format!("{:?}: {}", text, e)))
}

fn utf8(bytes: Vec<u8>) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| Error::Conversion(e.to_string()))
}

/// The eight converters every cache starts with.
pub fn default_converters() -> Vec<Converter> {
    vec![
        Converter::new(|text: String| parse_bool(&text)),
        Converter::new(|text: String| parse::<i64>(&text)),
        Converter::new(|text: String| parse::<u64>(&text)),
        Converter::new(|text: String| parse::<f64>(&text)),
        Converter::new(|bytes: Vec<u8>| parse_bool(&utf8(bytes)?)),
        Converter::new(|bytes: Vec<u8>| parse::<i64>(&utf8(bytes)?)),
        Converter::new(|bytes: Vec<u8>| parse::<u64>(&utf8(bytes)?)),
        Converter::new(|bytes: Vec<u8>| parse::<f64>(&utf8(bytes)?)),
    ]
}
