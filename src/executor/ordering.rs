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

//! Sort orderings and collation

use std::cmp::Ordering;
use std::fmt;

use crate::core::{Result, Row, Value};

use super::bindings::QueryBindings;
use super::expression::Expression;

/// String collation applied to text keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Collator {
    /// Byte-wise comparison
    #[default]
    Binary,
    /// Unicode lowercase folding before comparison
    CaseInsensitive,
}

impl Collator {
    /// Map a value to the form this collation compares and hashes
    pub fn normalize(&self, value: Value) -> Value {
        match (self, &value) {
            (Collator::CaseInsensitive, Value::Text(s)) => Value::text(s.to_lowercase()),
            _ => value,
        }
    }

    /// Total order of two values under this collation
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        match (self, a, b) {
            (Collator::CaseInsensitive, Value::Text(x), Value::Text(y)) => {
                x.to_lowercase().cmp(&y.to_lowercase())
            }
            _ => a.cmp(b),
        }
    }
}

/// One sort key
#[derive(Debug, Clone, PartialEq)]
pub struct OrderingItem {
    pub expression: Expression,
    pub ascending: bool,
    pub collator: Option<Collator>,
}

/// Ordered list of (expression, direction, collator) sort keys
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortOrdering {
    items: Vec<OrderingItem>,
}

impl SortOrdering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key compared in storage order
    pub fn append(mut self, expression: Expression, ascending: bool) -> Self {
        self.items.push(OrderingItem {
            expression,
            ascending,
            collator: None,
        });
        self
    }

    pub fn append_collated(
        mut self,
        expression: Expression,
        ascending: bool,
        collator: Collator,
    ) -> Self {
        self.items.push(OrderingItem {
            expression,
            ascending,
            collator: Some(collator),
        });
        self
    }

    pub fn items(&self) -> &[OrderingItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Evaluate every key expression against `row`
    pub fn evaluate(&self, row: &Row, bindings: &QueryBindings) -> Result<Vec<Value>> {
        self.items
            .iter()
            .map(|item| item.expression.eval(Some(row), bindings))
            .collect()
    }

    /// Compare two evaluated key tuples; the first differing key decides
    pub fn compare_keys(&self, a: &[Value], b: &[Value]) -> Ordering {
        for (i, item) in self.items.iter().enumerate() {
            let (x, y) = match (a.get(i), b.get(i)) {
                (Some(x), Some(y)) => (x, y),
                _ => break,
            };
            let ord = item.collator.unwrap_or_default().compare(x, y);
            let ord = if item.ascending { ord } else { ord.reverse() };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl fmt::Display for SortOrdering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(
                f,
                "{} {}",
                item.expression,
                if item.ascending { "ASC" } else { "DESC" }
            )?;
            if item.collator == Some(Collator::CaseInsensitive) {
                write!(f, " NOCASE")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collators() {
        let a = Value::text("Apple");
        let b = Value::text("apple");
        assert_ne!(Collator::Binary.compare(&a, &b), Ordering::Equal);
        assert_eq!(Collator::CaseInsensitive.compare(&a, &b), Ordering::Equal);
        assert_eq!(Collator::CaseInsensitive.normalize(a), b);
        assert_eq!(Collator::CaseInsensitive.normalize(Value::integer(3)), Value::integer(3));
    }

    #[test]
    fn test_compare_keys_mixed_directions() {
        let ordering = SortOrdering::new()
            .append(Expression::field(0), true)
            .append_collated(Expression::field(1), false, Collator::CaseInsensitive);

        let k = |i: i64, s: &str| vec![Value::integer(i), Value::text(s)];
        assert_eq!(ordering.compare_keys(&k(1, "b"), &k(2, "a")), Ordering::Less);
        assert_eq!(ordering.compare_keys(&k(1, "b"), &k(1, "a")), Ordering::Less);
        assert_eq!(ordering.compare_keys(&k(1, "A"), &k(1, "a")), Ordering::Equal);
        assert_eq!(ordering.to_string(), "$0 ASC, $1 DESC NOCASE");
    }
}
