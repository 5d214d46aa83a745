//! Runtime shapes of cached values.
//!
//! A store persists whatever it is given and hands back a [`Value`]. The
//! orchestrator compares the value's [`Shape`] with the shape the caller's
//! destination expects and converts between them.
//!
//! # Shapes
//!
//! | Shape | Rust destinations |
//! |-------|-------------------|
//! | `Bool` | `bool` |
//! | `Int` | `i8`, `i16`, `i32`, `i64`, `isize` |
//! | `Uint` | `u8`, `u16`, `u32`, `u64`, `usize` |
//! | `Float` | `f32`, `f64` |
//! | `Text` | `String` |
//! | `Bytes` | `Vec<u8>` |
//! | `Record` | any type implementing [`Record`], plus `Vec`, `[T; N]` and `HashMap<String, _>` of records |
//!
//! # Records
//!
//! Caller-defined structured types opt in with an empty marker impl:
//!
//! ```
//! use readthrough::shape::{Record, Shape, Shaped};
//!
//! #[derive(Clone, Default, Debug, PartialEq)]
//! struct Person {
//!     name: String,
//!     age: u32,
//! }
//!
//! impl Record for Person {}
//!
//! assert!(matches!(Person::shape(), Shape::Record(_)));
//! ```
//!
//! # Shape-erased destinations
//!
//! A [`Value`] can itself be used as a destination. Its target shape is the
//! shape of the value it currently holds, so `Value::Int(0)` asks for an
//! integer and `Value::Text(String::new())` asks for text.

use crate::error::{Error, Result};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Identity of a caller-defined structured type.
///
/// Two record shapes are equal iff they describe the same Rust type.
#[derive(Clone, Copy)]
pub struct RecordShape {
    id: TypeId,
    name: &'static str,
    zero: fn() -> Value,
}

fn zero_record<T: Record>() -> Value {
    Value::record(T::default())
}

impl RecordShape {
    /// Shape of record type `T`.
    pub fn of<T: Record>() -> Self {
        RecordShape {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            zero: zero_record::<T>,
        }
    }

    /// Fully qualified type name, used in error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for RecordShape {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RecordShape {}

impl Hash for RecordShape {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for RecordShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RecordShape").field(&self.name).finish()
    }
}

/// Runtime structural type of a [`Value`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Bool,
    Int,
    Uint,
    Float,
    Text,
    Bytes,
    Record(RecordShape),
}

impl Shape {
    /// Zero value of this shape.
    ///
    /// Used as the negative cache entry when no explicit nil value is
    /// configured.
    pub fn zero(&self) -> Value {
        match self {
            Shape::Bool => Value::Bool(false),
            Shape::Int => Value::Int(0),
            Shape::Uint => Value::Uint(0),
            Shape::Float => Value::Float(0.0),
            Shape::Text => Value::Text(String::new()),
            Shape::Bytes => Value::Bytes(Vec::new()),
            Shape::Record(record) => (record.zero)(),
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Shape::Int | Shape::Uint | Shape::Float)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Bool => write!(f, "bool"),
            Shape::Int => write!(f, "int"),
            Shape::Uint => write!(f, "uint"),
            Shape::Float => write!(f, "float"),
            Shape::Text => write!(f, "text"),
            Shape::Bytes => write!(f, "bytes"),
            Shape::Record(record) => write!(f, "{}", record.name),
        }
    }
}

/// A type-erased record held by a [`Value`].
///
/// Cloning is cheap: the record itself is shared.
#[derive(Clone)]
pub struct RecordValue {
    shape: RecordShape,
    inner: Arc<dyn Any + Send + Sync>,
}

impl RecordValue {
    pub fn new<T: Record>(value: T) -> Self {
        RecordValue {
            shape: RecordShape::of::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn shape(&self) -> RecordShape {
        self.shape
    }

    /// Borrow the record as `T`, if it is one.
    pub fn downcast_ref<T: Record>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    /// Take the record out as `T`, cloning only when it is still shared.
    pub fn take<T: Record>(self) -> Option<T> {
        let typed = self.inner.downcast::<T>().ok()?;
        Some(Arc::try_unwrap(typed).unwrap_or_else(|shared| (*shared).clone()))
    }
}

impl PartialEq for RecordValue {
    /// Records carry no equality of their own; two record values are equal
    /// when they share the same allocation.
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape && Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Record({})", self.shape.name)
    }
}

/// Dynamic value as persisted by a store.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Record(RecordValue),
}

impl Value {
    /// Wrap a record.
    pub fn record<T: Record>(value: T) -> Self {
        Value::Record(RecordValue::new(value))
    }

    /// Runtime shape of this value.
    pub fn shape(&self) -> Shape {
        match self {
            Value::Bool(_) => Shape::Bool,
            Value::Int(_) => Shape::Int,
            Value::Uint(_) => Shape::Uint,
            Value::Float(_) => Shape::Float,
            Value::Text(_) => Shape::Text,
            Value::Bytes(_) => Shape::Bytes,
            Value::Record(record) => Shape::Record(record.shape()),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

/// Conversion of a produced value into its stored form.
///
/// Implemented for every [`Shaped`] type and for [`Value`] itself, so
/// producers may return either.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

/// A Rust type with a fixed shape.
pub trait Shaped: IntoValue + Sized + Send + Sync + 'static {
    /// The shape values of this type have.
    fn shape() -> Shape;

    /// Extract `Self` from a value that already has [`Self::shape`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Conversion` if the value has a different shape or does
    /// not fit (e.g. `300` into `i8`).
    fn from_value(value: Value) -> Result<Self>;
}

/// Marker for caller-defined structured types.
///
/// `Default` provides the zero value stored by negative caching.
pub trait Record: Any + Clone + Default + Send + Sync {}

impl<T: Record> Record for Vec<T> {}

impl<T: Record> Record for HashMap<String, T> {}

impl<T: Record, const N: usize> Record for [T; N] where [T; N]: Default {}

impl<T: Record> IntoValue for T {
    fn into_value(self) -> Value {
        Value::record(self)
    }
}

impl<T: Record> Shaped for T {
    fn shape() -> Shape {
        Shape::Record(RecordShape::of::<T>())
    }

    fn from_value(value: Value) -> Result<Self> {
        let expected = Self::shape();
        match value {
            Value::Record(record) => {
                let found = Shape::Record(record.shape());
                record.take::<T>().ok_or_else(|| {
                    Error::Conversion(format!("expected {}, found {}", expected, found))
                })
            }
            other => Err(mismatch(&other, expected)),
        }
    }
}

fn mismatch(value: &Value, expected: Shape) -> Error {
    Error::Conversion(format!("expected {}, found {}", expected, value.shape()))
}

macro_rules! signed_shape {
    ($($ty:ty),*) => {$(
        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::Int(self as i64)
            }
        }

        impl Shaped for $ty {
            fn shape() -> Shape {
                Shape::Int
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Int(v) => <$ty>::try_from(v).map_err(|_| {
                        Error::Conversion(format!("{} out of range for {}", v, stringify!($ty)))
                    }),
                    other => Err(mismatch(&other, Shape::Int)),
                }
            }
        }
    )*};
}

macro_rules! unsigned_shape {
    ($($ty:ty),*) => {$(
        impl IntoValue for $ty {
            fn into_value(self) -> Value {
                Value::Uint(self as u64)
            }
        }

        impl Shaped for $ty {
            fn shape() -> Shape {
                Shape::Uint
            }

            fn from_value(value: Value) -> Result<Self> {
                match value {
                    Value::Uint(v) => <$ty>::try_from(v).map_err(|_| {
                        Error::Conversion(format!("{} out of range for {}", v, stringify!($ty)))
                    }),
                    other => Err(mismatch(&other, Shape::Uint)),
                }
            }
        }
    )*};
}

signed_shape!(i8, i16, i32, i64, isize);
unsigned_shape!(u8, u16, u32, u64, usize);

impl IntoValue for f32 {
    fn into_value(self) -> Value {
        Value::Float(self as f64)
    }
}

impl Shaped for f32 {
    fn shape() -> Shape {
        Shape::Float
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v as f32),
            other => Err(mismatch(&other, Shape::Float)),
        }
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Float(self)
    }
}

impl Shaped for f64 {
    fn shape() -> Shape {
        Shape::Float
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            other => Err(mismatch(&other, Shape::Float)),
        }
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Bool(self)
    }
}

impl Shaped for bool {
    fn shape() -> Shape {
        Shape::Bool
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(mismatch(&other, Shape::Bool)),
        }
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl Shaped for String {
    fn shape() -> Shape {
        Shape::Text
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(mismatch(&other, Shape::Text)),
        }
    }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Value {
        Value::Bytes(self)
    }
}

impl Shaped for Vec<u8> {
    fn shape() -> Shape {
        Shape::Bytes
    }

    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Bytes(v) => Ok(v),
            other => Err(mismatch(&other, Shape::Bytes)),
        }
    }
}

/// A writable destination for a cache lookup.
///
/// `fill` either replaces the whole destination or leaves it untouched.
pub trait Slot: Send {
    /// Shape the destination wants to receive.
    fn target_shape(&self) -> Shape;

    /// Write a value that already has [`Slot::target_shape`].
    ///
    /// # Errors
    ///
    /// Returns `Error::Conversion` if the value does not fit.
    fn fill(&mut self, value: Value) -> Result<()>;
}

impl<T: Shaped> Slot for T {
    fn target_shape(&self) -> Shape {
        T::shape()
    }

    fn fill(&mut self, value: Value) -> Result<()> {
        *self = T::from_value(value)?;
        Ok(())
    }
}

impl Slot for Value {
    fn target_shape(&self) -> Shape {
        self.shape()
    }

    fn fill(&mut self, value: Value) -> Result<()> {
        let expected = self.shape();
        if value.shape() != expected {
            return Err(mismatch(&value, expected));
        }
        *self = value;
        Ok(())
    }
}
