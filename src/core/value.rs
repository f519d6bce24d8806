// Copyright 2025 Stoolap Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Runtime field values
//!
//! [`Value`] has two orderings. [`Value::compare`] is the three-valued
//! predicate comparison (NULL against non-NULL is an error the caller maps to
//! UNKNOWN). The [`Ord`] implementation is the total storage order used by
//! hkeys and index keys: NULLs first, numerics compared by value, other types
//! by a fixed type rank.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::error::{Error, Result};
use super::types::DataType;

/// A runtime value with type information
///
/// Text uses `Arc<str>` so cloning a row's values never copies string data.
#[derive(Debug, Clone)]
pub enum Value {
    /// NULL value with optional type hint
    Null(DataType),

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// UTF-8 text string
    Text(Arc<str>),

    /// Boolean value
    Boolean(bool),

    /// Timestamp (UTC)
    Timestamp(DateTime<Utc>),
}

impl Value {
    // =========================================================================
    // Constructors
    // =========================================================================

    /// Create a NULL value with a type hint
    pub fn null(data_type: DataType) -> Self {
        Value::Null(data_type)
    }

    /// Create a NULL value with unknown type
    pub fn null_unknown() -> Self {
        Value::Null(DataType::Null)
    }

    /// Create an integer value
    pub fn integer(value: i64) -> Self {
        Value::Integer(value)
    }

    /// Create a float value
    pub fn float(value: f64) -> Self {
        Value::Float(value)
    }

    /// Create a text value
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(Arc::from(value.into().as_str()))
    }

    /// Create a boolean value
    pub fn boolean(value: bool) -> Self {
        Value::Boolean(value)
    }

    /// Create a timestamp value
    pub fn timestamp(value: DateTime<Utc>) -> Self {
        Value::Timestamp(value)
    }

    // =========================================================================
    // Type accessors
    // =========================================================================

    /// Returns the data type of this value
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Null(dt) => *dt,
            Value::Integer(_) => DataType::Integer,
            Value::Float(_) => DataType::Float,
            Value::Text(_) => DataType::Text,
            Value::Boolean(_) => DataType::Boolean,
            Value::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Returns true if this value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    // =========================================================================
    // Value extractors
    // =========================================================================

    /// Extract as i64, with numeric coercion
    pub fn as_int64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Float(v) => Some(*v as i64),
            Value::Boolean(b) => Some(i64::from(*b)),
            Value::Text(s) => s.parse::<i64>().ok(),
            Value::Null(_) | Value::Timestamp(_) => None,
        }
    }

    /// Extract as f64, with numeric coercion
    pub fn as_float64(&self) -> Option<f64> {
        match self {
            Value::Integer(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            Value::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.parse::<f64>().ok(),
            Value::Null(_) | Value::Timestamp(_) => None,
        }
    }

    /// Extract as boolean; only BOOLEAN and numeric values convert
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            Value::Integer(v) => Some(*v != 0),
            Value::Float(v) => Some(*v != 0.0),
            _ => None,
        }
    }

    /// Extract as string reference (avoids clone for Text)
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Extract as DateTime<Utc>
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            _ => None,
        }
    }

    // =========================================================================
    // Comparison
    // =========================================================================

    /// Compare two values for predicate evaluation
    ///
    /// NULL compared with non-NULL is `Error::NullComparison`; values of
    /// unrelated types are `Error::IncomparableTypes`.
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        if self.is_null() || other.is_null() {
            if self.is_null() && other.is_null() {
                return Ok(Ordering::Equal);
            }
            return Err(Error::NullComparison);
        }

        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => Ok(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Ok(compare_floats(*a, *b)),
            (Value::Integer(a), Value::Float(b)) => Ok(compare_int_float(*a, *b)),
            (Value::Float(a), Value::Integer(b)) => Ok(compare_int_float(*b, *a).reverse()),
            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),
            _ => Err(Error::IncomparableTypes),
        }
    }

    // =========================================================================
    // Arithmetic
    // =========================================================================

    /// Add two values; integer addition is checked, NULL propagates
    pub fn checked_add(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Null(_), _) | (_, Value::Null(_)) => Ok(Value::null_unknown()),
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_add(*b)
                .map(Value::Integer)
                .ok_or(Error::Overflow("addition")),
            _ => self.float_op(other, "+", |a, b| a + b),
        }
    }

    /// Subtract two values; integer subtraction is checked, NULL propagates
    pub fn checked_sub(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Null(_), _) | (_, Value::Null(_)) => Ok(Value::null_unknown()),
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_sub(*b)
                .map(Value::Integer)
                .ok_or(Error::Overflow("subtraction")),
            _ => self.float_op(other, "-", |a, b| a - b),
        }
    }

    /// Multiply two values; integer multiplication is checked, NULL propagates
    pub fn checked_mul(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Null(_), _) | (_, Value::Null(_)) => Ok(Value::null_unknown()),
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_mul(*b)
                .map(Value::Integer)
                .ok_or(Error::Overflow("multiplication")),
            _ => self.float_op(other, "*", |a, b| a * b),
        }
    }

    /// Divide two values; division by zero is an error, NULL propagates
    pub fn checked_div(&self, other: &Value) -> Result<Value> {
        match (self, other) {
            (Value::Null(_), _) | (_, Value::Null(_)) => Ok(Value::null_unknown()),
            (Value::Integer(_), Value::Integer(0)) => Err(Error::DivisionByZero),
            (Value::Integer(a), Value::Integer(b)) => a
                .checked_div(*b)
                .map(Value::Integer)
                .ok_or(Error::Overflow("division")),
            _ => {
                if other.as_float64() == Some(0.0) {
                    return Err(Error::DivisionByZero);
                }
                self.float_op(other, "/", |a, b| a / b)
            }
        }
    }

    fn float_op(&self, other: &Value, symbol: &str, op: impl Fn(f64, f64) -> f64) -> Result<Value> {
        if !self.data_type().is_numeric() || !other.data_type().is_numeric() {
            return Err(Error::Type(format!(
                "cannot apply {} to {} and {}",
                symbol,
                self.data_type(),
                other.data_type()
            )));
        }
        match (self.as_float64(), other.as_float64()) {
            (Some(a), Some(b)) => Ok(Value::Float(op(a, b))),
            _ => Err(Error::IncomparableTypes),
        }
    }
}

// =========================================================================
// Trait implementations
// =========================================================================

impl Default for Value {
    fn default() -> Self {
        Value::Null(DataType::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null(_) => write!(f, "NULL"),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", format_float(*v)),
            Value::Text(s) => write!(f, "{}", s),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Timestamp(t) => write!(f, "{}", t.to_rfc3339()),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        // Integer(5) == Float(5.0), so numerics hash through their f64 bits.
        match self {
            Value::Null(_) => 0u8.hash(state),
            Value::Integer(v) => {
                1u8.hash(state);
                canonical_float_bits(*v as f64).hash(state);
            }
            Value::Float(v) => {
                1u8.hash(state);
                canonical_float_bits(*v).hash(state);
            }
            Value::Text(s) => {
                2u8.hash(state);
                s.hash(state);
            }
            Value::Boolean(b) => {
                3u8.hash(state);
                b.hash(state);
            }
            Value::Timestamp(t) => {
                4u8.hash(state);
                t.timestamp_nanos_opt().hash(state);
            }
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Total storage ordering
///
/// 1. NULLs first (all NULLs equal regardless of type hint)
/// 2. Integer and Float compared by numeric value
/// 3. Otherwise by type rank, then natural order within the type
///
/// Must stay consistent with `PartialEq`, which is defined through it.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.is_null(), other.is_null()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            (false, false) => {}
        }

        fn type_rank(v: &Value) -> u8 {
            match v {
                Value::Null(_) => 0,
                Value::Boolean(_) => 1,
                Value::Integer(_) | Value::Float(_) => 2,
                Value::Text(_) => 3,
                Value::Timestamp(_) => 4,
            }
        }

        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => compare_floats(*a, *b),
            (Value::Integer(a), Value::Float(b)) => compare_int_float(*a, *b),
            (Value::Float(a), Value::Integer(b)) => compare_int_float(*b, *a).reverse(),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Boolean(a), Value::Boolean(b)) => a.cmp(b),
            (Value::Timestamp(a), Value::Timestamp(b)) => a.cmp(b),
            _ => type_rank(self).cmp(&type_rank(other)),
        }
    }
}

// =========================================================================
// From implementations for convenient construction
// =========================================================================

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Arc::from(v.as_str()))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Arc::from(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null(DataType::Null),
        }
    }
}

// =========================================================================
// Helper functions
// =========================================================================

/// Format a float value consistently
fn format_float(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{:.0}", v)
    } else {
        let s = format!("{:?}", v);
        if s.contains('.') && !s.contains('e') && !s.contains('E') {
            s.trim_end_matches('0').trim_end_matches('.').to_string()
        } else {
            s
        }
    }
}

/// Bits of `v` with every NaN and both zeros collapsed, so that values
/// equal under [`compare_floats`] hash alike
fn canonical_float_bits(v: f64) -> u64 {
    if v.is_nan() {
        f64::NAN.to_bits()
    } else if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

/// Compare an integer with a float without rounding the integer
///
/// NaN sorts after every number, as in [`compare_floats`].
fn compare_int_float(a: i64, b: f64) -> Ordering {
    // 2^63: the first float past i64::MAX
    const I64_END: f64 = 9_223_372_036_854_775_808.0;
    if b.is_nan() || b >= I64_END {
        return Ordering::Less;
    }
    if b < -I64_END {
        return Ordering::Greater;
    }
    let whole = b.trunc();
    match a.cmp(&(whole as i64)) {
        Ordering::Equal => whole.partial_cmp(&b).unwrap_or(Ordering::Equal),
        ord => ord,
    }
}

/// Compare two floats; NaN sorts after every other number
fn compare_floats(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(v: &Value) -> u64 {
        let mut h = DefaultHasher::new();
        v.hash(&mut h);
        h.finish()
    }

    #[test]
    fn test_constructors_and_types() {
        assert_eq!(Value::integer(7).data_type(), DataType::Integer);
        assert_eq!(Value::float(1.5).data_type(), DataType::Float);
        assert_eq!(Value::text("a").data_type(), DataType::Text);
        assert_eq!(Value::boolean(true).data_type(), DataType::Boolean);
        assert_eq!(Value::null(DataType::Text).data_type(), DataType::Text);
        assert!(Value::null_unknown().is_null());
        assert_eq!(Value::from(Some(3i64)), Value::integer(3));
        assert!(Value::from(None::<i64>).is_null());
    }

    #[test]
    fn test_compare_predicate_semantics() {
        assert_eq!(
            Value::integer(1).compare(&Value::integer(2)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::integer(2).compare(&Value::float(1.5)).unwrap(),
            Ordering::Greater
        );
        assert_eq!(
            Value::null_unknown().compare(&Value::integer(1)),
            Err(Error::NullComparison)
        );
        assert_eq!(
            Value::text("1").compare(&Value::integer(1)),
            Err(Error::IncomparableTypes)
        );
    }

    #[test]
    fn test_total_order_nulls_first() {
        let mut values = vec![
            Value::text("b"),
            Value::integer(3),
            Value::null(DataType::Integer),
            Value::float(2.5),
            Value::boolean(false),
            Value::text("a"),
        ];
        values.sort();
        assert!(values[0].is_null());
        assert_eq!(values[1], Value::boolean(false));
        assert_eq!(values[2], Value::float(2.5));
        assert_eq!(values[3], Value::integer(3));
        assert_eq!(values[4], Value::text("a"));
        assert_eq!(values[5], Value::text("b"));
    }

    #[test]
    fn test_numeric_equality_and_hash() {
        assert_eq!(Value::integer(5), Value::float(5.0));
        assert_eq!(hash_of(&Value::integer(5)), hash_of(&Value::float(5.0)));
        assert_eq!(Value::null(DataType::Text), Value::null(DataType::Integer));
        assert_ne!(Value::integer(1), Value::text("1"));
    }

    #[test]
    fn test_equal_floats_hash_alike() {
        assert_eq!(Value::float(0.0), Value::float(-0.0));
        assert_eq!(hash_of(&Value::float(0.0)), hash_of(&Value::float(-0.0)));
        assert_eq!(hash_of(&Value::integer(0)), hash_of(&Value::float(-0.0)));

        let other_nan = f64::from_bits(f64::NAN.to_bits() ^ 1);
        assert!(other_nan.is_nan());
        assert_eq!(Value::float(f64::NAN), Value::float(other_nan));
        assert_eq!(
            hash_of(&Value::float(f64::NAN)),
            hash_of(&Value::float(other_nan))
        );
    }

    #[test]
    fn test_integer_float_order_is_exact() {
        let big = 1i64 << 53;
        let at = Value::float(big as f64);
        assert_eq!(Value::integer(big), at);
        assert!(Value::integer(big + 1) > at);
        assert!(at < Value::integer(big + 1));
        assert_ne!(Value::integer(big + 1), at);
        assert_eq!(
            Value::integer(big + 1).compare(&at).unwrap(),
            Ordering::Greater
        );

        assert!(Value::integer(2) < Value::float(2.5));
        assert!(Value::integer(-2) > Value::float(-2.5));
        assert!(Value::integer(i64::MAX) < Value::float(9.3e18));
        assert!(Value::integer(i64::MIN) > Value::float(f64::NEG_INFINITY));
        assert!(Value::integer(i64::MAX) < Value::float(f64::NAN));
        assert_eq!(Value::integer(i64::MIN), Value::float(i64::MIN as f64));
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(
            Value::integer(2).checked_add(&Value::integer(3)).unwrap(),
            Value::integer(5)
        );
        assert!(matches!(
            Value::integer(i64::MAX).checked_add(&Value::integer(1)),
            Err(Error::Overflow(_))
        ));
        assert_eq!(
            Value::integer(1).checked_add(&Value::float(0.5)).unwrap(),
            Value::float(1.5)
        );
        assert!(Value::null_unknown()
            .checked_mul(&Value::integer(2))
            .unwrap()
            .is_null());
        assert_eq!(
            Value::integer(1).checked_div(&Value::integer(0)),
            Err(Error::DivisionByZero)
        );
        assert!(Value::text("x").checked_sub(&Value::integer(1)).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::integer(42).to_string(), "42");
        assert_eq!(Value::float(3.0).to_string(), "3");
        assert_eq!(Value::float(2.25).to_string(), "2.25");
        assert_eq!(Value::null_unknown().to_string(), "NULL");
        assert_eq!(Value::boolean(true).to_string(), "true");
    }
}
