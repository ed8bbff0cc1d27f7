//! Data types and scalar values.

use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};

/// Data types supported in scalar expressions and column definitions.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum DataType {
    #[default]
    Null,
    Bool,
    Int32,
    Int64,
    Float64,
    String,
}

impl DataType {
    /// Returns `true` if values of this type can be used in arithmetic expressions.
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Int32 | DataType::Int64 | DataType::Float64)
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Null => write!(f, "Null"),
            DataType::Bool => write!(f, "Bool"),
            DataType::Int32 => write!(f, "Int32"),
            DataType::Int64 => write!(f, "Int64"),
            DataType::Float64 => write!(f, "Float64"),
            DataType::String => write!(f, "String"),
        }
    }
}

/// Supported scalar values.
///
/// Floating point values are wrapped into [OrderedFloat] so that values can be interned
/// by equality and used as hash map keys.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(OrderedFloat<f64>),
    String(String),
}

impl ScalarValue {
    /// Returns the type of this scalar value.
    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Null => DataType::Null,
            ScalarValue::Bool(_) => DataType::Bool,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::String(_) => DataType::String,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Returns the boolean value if this is a boolean constant.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScalarValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Compares two values of the same type. Returns `None` if the values can not be compared
    /// (different types or one of them is `NULL`).
    pub fn compare(&self, other: &ScalarValue) -> Option<Ordering> {
        match (self, other) {
            (ScalarValue::Bool(l), ScalarValue::Bool(r)) => Some(l.cmp(r)),
            (ScalarValue::Int32(l), ScalarValue::Int32(r)) => Some(l.cmp(r)),
            (ScalarValue::Int64(l), ScalarValue::Int64(r)) => Some(l.cmp(r)),
            (ScalarValue::Float64(l), ScalarValue::Float64(r)) => Some(l.cmp(r)),
            (ScalarValue::String(l), ScalarValue::String(r)) => Some(l.cmp(r)),
            _ => None,
        }
    }

    /// Adds two values. Returns `None` when the operation can not be evaluated
    /// without an error (overflow, mismatched types).
    pub fn checked_add(&self, other: &ScalarValue) -> Option<ScalarValue> {
        match (self, other) {
            (ScalarValue::Int32(l), ScalarValue::Int32(r)) => l.checked_add(*r).map(ScalarValue::Int32),
            (ScalarValue::Int64(l), ScalarValue::Int64(r)) => l.checked_add(*r).map(ScalarValue::Int64),
            (ScalarValue::Float64(l), ScalarValue::Float64(r)) => Some(ScalarValue::Float64(*l + *r)),
            _ => None,
        }
    }

    /// Subtracts `other` from this value. See [checked_add](Self::checked_add).
    pub fn checked_sub(&self, other: &ScalarValue) -> Option<ScalarValue> {
        match (self, other) {
            (ScalarValue::Int32(l), ScalarValue::Int32(r)) => l.checked_sub(*r).map(ScalarValue::Int32),
            (ScalarValue::Int64(l), ScalarValue::Int64(r)) => l.checked_sub(*r).map(ScalarValue::Int64),
            (ScalarValue::Float64(l), ScalarValue::Float64(r)) => Some(ScalarValue::Float64(*l - *r)),
            _ => None,
        }
    }

    /// Multiplies two values. See [checked_add](Self::checked_add).
    pub fn checked_mul(&self, other: &ScalarValue) -> Option<ScalarValue> {
        match (self, other) {
            (ScalarValue::Int32(l), ScalarValue::Int32(r)) => l.checked_mul(*r).map(ScalarValue::Int32),
            (ScalarValue::Int64(l), ScalarValue::Int64(r)) => l.checked_mul(*r).map(ScalarValue::Int64),
            (ScalarValue::Float64(l), ScalarValue::Float64(r)) => Some(ScalarValue::Float64(*l * *r)),
            _ => None,
        }
    }
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Null => write!(f, "NULL"),
            ScalarValue::Bool(value) => write!(f, "{}", value),
            ScalarValue::Int32(value) => write!(f, "{}", value),
            ScalarValue::Int64(value) => write!(f, "{}", value),
            ScalarValue::Float64(value) => write!(f, "{}", value),
            ScalarValue::String(value) => write!(f, "'{}'", value),
        }
    }
}
