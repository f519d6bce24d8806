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

//! Row expressions
//!
//! Expressions are evaluated against an optional current row and the
//! execution's [`QueryBindings`]. Comparisons follow three-valued logic:
//! a NULL operand yields a NULL boolean, which predicates treat as false.

use std::fmt;

use crate::core::{ComparisonOp, DataType, Error, Result, Row, RowType, Value};

use super::bindings::QueryBindings;

/// Arithmetic operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            ArithOp::Add => "+",
            ArithOp::Sub => "-",
            ArithOp::Mul => "*",
            ArithOp::Div => "/",
        };
        f.write_str(symbol)
    }
}

/// An expression tree
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Field of the current row
    Field(usize),
    Literal(Value),
    /// Field of the row bound at a binding position
    BoundField { position: usize, field: usize },
    /// Value bound at a binding position
    BoundValue(usize),
    Compare {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Arith {
        op: ArithOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    Not(Box<Expression>),
    IsNull(Box<Expression>),
}

impl Expression {
    pub fn field(index: usize) -> Self {
        Expression::Field(index)
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Expression::Literal(value.into())
    }

    pub fn bound_field(position: usize, field: usize) -> Self {
        Expression::BoundField { position, field }
    }

    pub fn bound_value(position: usize) -> Self {
        Expression::BoundValue(position)
    }

    pub fn compare(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Compare {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn equals(left: Expression, right: Expression) -> Self {
        Self::compare(ComparisonOp::Eq, left, right)
    }

    pub fn arith(op: ArithOp, left: Expression, right: Expression) -> Self {
        Expression::Arith {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn and(left: Expression, right: Expression) -> Self {
        Expression::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Expression, right: Expression) -> Self {
        Expression::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Expression) -> Self {
        Expression::Not(Box::new(inner))
    }

    pub fn is_null(inner: Expression) -> Self {
        Expression::IsNull(Box::new(inner))
    }

    /// Evaluate against an optional current row
    pub fn eval(&self, row: Option<&Row>, bindings: &QueryBindings) -> Result<Value> {
        match self {
            Expression::Field(index) => match row {
                Some(row) => row.value(*index).cloned(),
                None => Err(Error::internal(format!(
                    "field {} referenced without a current row",
                    index
                ))),
            },
            Expression::Literal(value) => Ok(value.clone()),
            Expression::BoundField { position, field } => {
                bindings.get_row(*position)?.value(*field).cloned()
            }
            Expression::BoundValue(position) => bindings.get_value(*position),
            Expression::Compare { op, left, right } => {
                let l = left.eval(row, bindings)?;
                let r = right.eval(row, bindings)?;
                if l.is_null() || r.is_null() {
                    return Ok(Value::null(DataType::Boolean));
                }
                Ok(Value::boolean(op.matches(l.compare(&r)?)))
            }
            Expression::Arith { op, left, right } => {
                let l = left.eval(row, bindings)?;
                let r = right.eval(row, bindings)?;
                match op {
                    ArithOp::Add => l.checked_add(&r),
                    ArithOp::Sub => l.checked_sub(&r),
                    ArithOp::Mul => l.checked_mul(&r),
                    ArithOp::Div => l.checked_div(&r),
                }
            }
            Expression::And(left, right) => {
                let l = truth(&left.eval(row, bindings)?)?;
                if l == Some(false) {
                    return Ok(Value::boolean(false));
                }
                let r = truth(&right.eval(row, bindings)?)?;
                Ok(match (l, r) {
                    (_, Some(false)) => Value::boolean(false),
                    (Some(true), Some(true)) => Value::boolean(true),
                    _ => Value::null(DataType::Boolean),
                })
            }
            Expression::Or(left, right) => {
                let l = truth(&left.eval(row, bindings)?)?;
                if l == Some(true) {
                    return Ok(Value::boolean(true));
                }
                let r = truth(&right.eval(row, bindings)?)?;
                Ok(match (l, r) {
                    (_, Some(true)) => Value::boolean(true),
                    (Some(false), Some(false)) => Value::boolean(false),
                    _ => Value::null(DataType::Boolean),
                })
            }
            Expression::Not(inner) => Ok(match truth(&inner.eval(row, bindings)?)? {
                Some(b) => Value::boolean(!b),
                None => Value::null(DataType::Boolean),
            }),
            Expression::IsNull(inner) => Ok(Value::boolean(inner.eval(row, bindings)?.is_null())),
        }
    }

    /// Evaluate as a filter: NULL counts as false
    pub fn eval_predicate(&self, row: Option<&Row>, bindings: &QueryBindings) -> Result<bool> {
        Ok(truth(&self.eval(row, bindings)?)?.unwrap_or(false))
    }

    /// Static result type over rows of `input`
    ///
    /// Values read from bindings have no static type and report
    /// `DataType::Null`.
    pub fn result_type(&self, input: Option<&RowType>) -> Result<DataType> {
        match self {
            Expression::Field(index) => match input {
                Some(rt) => rt.field_type(*index),
                None => Err(Error::invalid_plan(format!(
                    "field {} referenced without an input row type",
                    index
                ))),
            },
            Expression::Literal(value) => Ok(value.data_type()),
            Expression::BoundField { .. } | Expression::BoundValue(_) => Ok(DataType::Null),
            Expression::Compare { left, right, .. }
            | Expression::And(left, right)
            | Expression::Or(left, right) => {
                left.result_type(input)?;
                right.result_type(input)?;
                Ok(DataType::Boolean)
            }
            Expression::Not(inner) | Expression::IsNull(inner) => {
                inner.result_type(input)?;
                Ok(DataType::Boolean)
            }
            Expression::Arith { left, right, .. } => {
                match (left.result_type(input)?, right.result_type(input)?) {
                    (DataType::Integer, DataType::Integer) => Ok(DataType::Integer),
                    (DataType::Null, other) | (other, DataType::Null) => Ok(other),
                    (a, b) if a.is_numeric() && b.is_numeric() => Ok(DataType::Float),
                    (a, b) => Err(Error::invalid_plan(format!(
                        "arithmetic on {} and {}",
                        a, b
                    ))),
                }
            }
        }
    }
}

/// Boolean reading of a value; NULL is unknown
fn truth(value: &Value) -> Result<Option<bool>> {
    if value.is_null() {
        return Ok(None);
    }
    value
        .as_boolean()
        .map(Some)
        .ok_or_else(|| Error::Type(format!("{} is not a boolean", value)))
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Field(index) => write!(f, "${}", index),
            Expression::Literal(Value::Text(s)) => write!(f, "'{}'", s),
            Expression::Literal(value) => write!(f, "{}", value),
            Expression::BoundField { position, field } => write!(f, "bound[{}].${}", position, field),
            Expression::BoundValue(position) => write!(f, "bound[{}]", position),
            Expression::Compare { op, left, right } => write!(f, "{} {} {}", left, op, right),
            Expression::Arith { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expression::And(left, right) => write!(f, "({} AND {})", left, right),
            Expression::Or(left, right) => write!(f, "({} OR {})", left, right),
            Expression::Not(inner) => write!(f, "NOT {}", inner),
            Expression::IsNull(inner) => write!(f, "{} IS NULL", inner),
        }
    }
}
